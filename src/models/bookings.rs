use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::technician_profiles::ServiceCategory;

/// Booking lifecycle status stored as a lowercase string in the database.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "declined")]
    Declined,
    #[sea_orm(string_value = "on_the_way")]
    OnTheWay,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "awaiting_payment")]
    AwaitingPayment,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "cash")]
    Cash,
    #[sea_orm(string_value = "card")]
    Card,
    #[sea_orm(string_value = "mobile_money")]
    MobileMoney,
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
}

/// SeaORM entity for the `bookings` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub client_id: Uuid,
    /// The technician's user id (not the profile id).
    pub technician_id: Uuid,
    pub category: ServiceCategory,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub address: String,
    pub city: String,
    #[sea_orm(column_type = "Double", nullable)]
    pub latitude: Option<f64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub longitude: Option<f64>,
    pub scheduled_at: DateTimeUtc,
    pub duration_minutes: i32,
    pub status: BookingStatus,
    #[sea_orm(column_type = "Double", nullable)]
    pub estimated_price: Option<f64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub final_price: Option<f64>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    #[sea_orm(column_type = "Double", nullable)]
    pub amount_paid: Option<f64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub receipt_url: Option<String>,
    pub paid_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Text", nullable)]
    pub status_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

impl Model {
    /// Amount the client owes once the work is done.
    pub fn amount_due(&self) -> Option<f64> {
        self.final_price.or(self.estimated_price)
    }

    pub fn ends_at(&self) -> DateTimeUtc {
        self.scheduled_at + chrono::Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.client_id == user_id || self.technician_id == user_id
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::ClientId",
        to = "super::users::Column::Id"
    )]
    Client,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::TechnicianId",
        to = "super::users::Column::Id"
    )]
    Technician,
    #[sea_orm(has_one = "super::reviews::Entity")]
    Review,
}

impl Related<super::reviews::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// ── DTOs ──

/// Request body for `POST /api/bookings`. The client comes from the token.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBooking {
    pub technician_id: Uuid,
    pub category: ServiceCategory,
    #[validate(length(min = 10, max = 2000))]
    pub description: String,
    #[validate(length(min = 5, max = 255))]
    pub address: String,
    #[validate(length(min = 2, max = 120))]
    pub city: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    pub scheduled_at: chrono::DateTime<chrono::Utc>,
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 0.0))]
    pub estimated_price: Option<f64>,
}

/// Request body for the decline and cancel endpoints.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StatusReason {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

/// Request body for `PUT /api/bookings/{id}/status` (technician progress updates).
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateBookingStatus {
    pub status: BookingStatus,
    #[validate(range(min = 0.0))]
    pub final_price: Option<f64>,
}

/// Request body for `POST /api/bookings/{id}/payment`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordPayment {
    pub method: PaymentMethod,
    #[validate(length(min = 1, max = 120))]
    pub reference: Option<String>,
    #[validate(range(min = 0.0))]
    pub amount: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<BookingStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}
