use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Trade a technician works in. Shared by profiles and bookings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    #[sea_orm(string_value = "plumbing")]
    Plumbing,
    #[sea_orm(string_value = "electrical")]
    Electrical,
    #[sea_orm(string_value = "carpentry")]
    Carpentry,
    #[sea_orm(string_value = "painting")]
    Painting,
    #[sea_orm(string_value = "cleaning")]
    Cleaning,
    #[sea_orm(string_value = "appliance_repair")]
    ApplianceRepair,
    #[sea_orm(string_value = "hvac")]
    Hvac,
    #[sea_orm(string_value = "gardening")]
    Gardening,
    #[sea_orm(string_value = "other")]
    Other,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "verified")]
    Verified,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// SeaORM entity for the `technician_profiles` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "technician_profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub user_id: Uuid,
    pub category: ServiceCategory,
    #[sea_orm(column_type = "Text", nullable)]
    pub skills: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub bio: Option<String>,
    #[sea_orm(column_type = "Double")]
    pub hourly_rate: f64,
    pub city: String,
    pub address: Option<String>,
    #[sea_orm(column_type = "Double", nullable)]
    pub latitude: Option<f64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub longitude: Option<f64>,
    pub years_experience: i32,
    pub verification_status: VerificationStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub verification_note: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub id_document_url: Option<String>,
    pub is_online: bool,
    #[sea_orm(column_type = "Double")]
    pub average_rating: f64,
    pub review_count: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// ── DTOs ──

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTechnicianProfile {
    pub category: ServiceCategory,
    #[validate(length(max = 500))]
    pub skills: Option<String>,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[validate(range(min = 0.0, max = 1_000_000.0))]
    pub hourly_rate: f64,
    #[validate(length(min = 2, max = 120))]
    pub city: String,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[validate(range(min = 0, max = 70))]
    pub years_experience: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateTechnicianProfile {
    pub category: Option<ServiceCategory>,
    #[validate(length(max = 500))]
    pub skills: Option<String>,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[validate(range(min = 0.0, max = 1_000_000.0))]
    pub hourly_rate: Option<f64>,
    #[validate(length(min = 2, max = 120))]
    pub city: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[validate(range(min = 0, max = 70))]
    pub years_experience: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOnlineStatus {
    pub is_online: bool,
}

/// Admin decision on a technician's verification request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyTechnician {
    pub status: VerificationStatus,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

/// Query parameters for `GET /api/technicians`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TechnicianSearchQuery {
    pub category: Option<ServiceCategory>,
    pub city: Option<String>,
    pub min_rating: Option<f64>,
    pub online: Option<bool>,
    pub verified: Option<bool>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl TechnicianSearchQuery {
    /// Stable string form used as part of the search cache key.
    pub fn cache_fragment(&self) -> String {
        format!(
            "c={:?}&city={}&r={}&o={:?}&v={:?}&p={}&l={}",
            self.category,
            self.city.as_deref().unwrap_or("").to_lowercase(),
            self.min_rating.unwrap_or(0.0),
            self.online,
            self.verified,
            self.page.unwrap_or(1),
            self.limit.unwrap_or(20),
        )
    }
}

/// Query parameters for `GET /api/technicians/available`.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub category: ServiceCategory,
    pub scheduled_at: chrono::DateTime<chrono::Utc>,
    pub duration_minutes: Option<i32>,
    pub city: Option<String>,
}

/// Public technician card: profile joined with the owner's display fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicianResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub category: ServiceCategory,
    pub skills: Option<String>,
    pub bio: Option<String>,
    pub hourly_rate: f64,
    pub city: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub years_experience: i32,
    pub verification_status: VerificationStatus,
    pub is_online: bool,
    pub average_rating: f64,
    pub review_count: i32,
}

impl TechnicianResponse {
    pub fn from_parts(profile: Model, user: Option<&super::users::Model>) -> Self {
        Self {
            id: profile.id,
            user_id: profile.user_id,
            full_name: user.and_then(|u| u.full_name.clone()),
            avatar_url: user.and_then(|u| u.avatar_url.clone()),
            phone: user.and_then(|u| u.phone.clone()),
            category: profile.category,
            skills: profile.skills,
            bio: profile.bio,
            hourly_rate: profile.hourly_rate,
            city: profile.city,
            address: profile.address,
            latitude: profile.latitude,
            longitude: profile.longitude,
            years_experience: profile.years_experience,
            verification_status: profile.verification_status,
            is_online: profile.is_online,
            average_rating: profile.average_rating,
            review_count: profile.review_count,
        }
    }
}
