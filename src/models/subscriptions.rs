use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::bookings::PaymentMethod;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    #[sea_orm(string_value = "trial")]
    Trial,
    #[sea_orm(string_value = "monthly")]
    Monthly,
    #[sea_orm(string_value = "quarterly")]
    Quarterly,
    #[sea_orm(string_value = "yearly")]
    Yearly,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "expired")]
    Expired,
}

/// SeaORM entity for the `subscriptions` table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub technician_id: Uuid,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub starts_at: DateTimeUtc,
    pub ends_at: DateTimeUtc,
    /// Only set for trials.
    pub booking_quota: Option<i32>,
    pub bookings_used: i32,
    pub auto_renew: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::TechnicianId",
        to = "super::users::Column::Id"
    )]
    Technician,
    #[sea_orm(has_many = "super::subscription_payments::Entity")]
    Payments,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Technician.def()
    }
}

impl Related<super::subscription_payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// ── DTOs ──

/// Request body for `POST /api/subscriptions/create`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSubscription {
    pub plan: Plan,
    pub payment_method: PaymentMethod,
    #[validate(length(min = 1, max = 120))]
    pub payment_reference: Option<String>,
    pub auto_renew: Option<bool>,
}

/// Response for `GET /api/subscriptions/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionStatusResponse {
    pub state: crate::domain::subscription_gate::SubscriptionState,
    pub can_accept_bookings: bool,
    pub subscription: Option<Model>,
    pub days_remaining: Option<i64>,
    pub bookings_remaining: Option<i32>,
    /// Error code the client can show when bookings can't be accepted.
    pub reason: Option<String>,
}
