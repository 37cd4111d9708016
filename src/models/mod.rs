pub mod bookings;
pub mod reviews;
pub mod subscription_payments;
pub mod subscriptions;
pub mod technician_profiles;
pub mod users;

use serde::Deserialize;

/// Highest page a listing will serve.
pub const MAX_PAGE: u64 = 10_000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PaginationQuery {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }
}
