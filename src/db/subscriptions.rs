use chrono::{DateTime, Utc};
use sea_orm::*;
use uuid::Uuid;

use crate::domain::plans::PlanCatalogue;
use crate::domain::subscription_gate::live_paid;
use crate::models::bookings::PaymentMethod;
use crate::models::subscription_payments;
use crate::models::subscriptions::{self, Plan, SubscriptionStatus};

/// Payment details captured when a paid plan is bought.
#[derive(Debug, Clone)]
pub struct PlanPurchase {
    pub plan: Plan,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub auto_renew: bool,
}

/// All subscriptions a technician ever had, newest first.
pub async fn list_for_technician(
    db: &DatabaseConnection,
    technician_id: Uuid,
) -> Result<Vec<subscriptions::Model>, DbErr> {
    subscriptions::Entity::find()
        .filter(subscriptions::Column::TechnicianId.eq(technician_id))
        .order_by_desc(subscriptions::Column::CreatedAt)
        .all(db)
        .await
}

/// Whether a trial was ever started, whatever its state today.
async fn has_had_trial<C: ConnectionTrait>(db: &C, technician_id: Uuid) -> Result<bool, DbErr> {
    let count = subscriptions::Entity::find()
        .filter(subscriptions::Column::TechnicianId.eq(technician_id))
        .filter(subscriptions::Column::Plan.eq(Plan::Trial))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Start the one free trial. Returns `None` when the technician already had it.
pub async fn start_trial(
    db: &DatabaseConnection,
    technician_id: Uuid,
    catalogue: &PlanCatalogue,
) -> Result<Option<subscriptions::Model>, DbErr> {
    let now = Utc::now();
    let terms = catalogue.terms(Plan::Trial);
    let txn = db.begin().await?;
    super::users::lock_for_update(&txn, technician_id).await?;

    if has_had_trial(&txn, technician_id).await? {
        txn.rollback().await?;
        return Ok(None);
    }

    let trial = subscriptions::ActiveModel {
        id: Set(Uuid::new_v4()),
        technician_id: Set(technician_id),
        plan: Set(Plan::Trial),
        status: Set(SubscriptionStatus::Active),
        starts_at: Set(now),
        ends_at: Set(catalogue.period_end(Plan::Trial, now)),
        booking_quota: Set(terms.booking_quota),
        bookings_used: Set(0),
        auto_renew: Set(false),
        created_at: Set(now),
        updated_at: Set(None),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(Some(trial))
}

/// Record a paid plan and its payment. Any trial still running is closed so
/// the technician only ever holds one live entitlement.
///
/// Returns `None`, writing nothing, while a paid period is still live.
pub async fn create_paid(
    db: &DatabaseConnection,
    technician_id: Uuid,
    purchase: PlanPurchase,
    catalogue: &PlanCatalogue,
) -> Result<Option<(subscriptions::Model, subscription_payments::Model)>, DbErr> {
    let now = Utc::now();
    let terms = catalogue.terms(purchase.plan);
    let txn = db.begin().await?;
    super::users::lock_for_update(&txn, technician_id).await?;

    let existing = subscriptions::Entity::find()
        .filter(subscriptions::Column::TechnicianId.eq(technician_id))
        .all(&txn)
        .await?;
    if live_paid(&existing, now).is_some() {
        txn.rollback().await?;
        return Ok(None);
    }

    subscriptions::Entity::update_many()
        .set(subscriptions::ActiveModel {
            status: Set(SubscriptionStatus::Expired),
            updated_at: Set(Some(now)),
            ..Default::default()
        })
        .filter(subscriptions::Column::TechnicianId.eq(technician_id))
        .filter(subscriptions::Column::Plan.eq(Plan::Trial))
        .filter(subscriptions::Column::Status.eq(SubscriptionStatus::Active))
        .exec(&txn)
        .await?;

    let subscription = subscriptions::ActiveModel {
        id: Set(Uuid::new_v4()),
        technician_id: Set(technician_id),
        plan: Set(purchase.plan),
        status: Set(SubscriptionStatus::Active),
        starts_at: Set(now),
        ends_at: Set(catalogue.period_end(purchase.plan, now)),
        booking_quota: Set(None),
        bookings_used: Set(0),
        auto_renew: Set(purchase.auto_renew),
        created_at: Set(now),
        updated_at: Set(None),
    }
    .insert(&txn)
    .await?;

    let payment = subscription_payments::ActiveModel {
        id: Set(Uuid::new_v4()),
        subscription_id: Set(subscription.id),
        technician_id: Set(technician_id),
        amount: Set(terms.price),
        currency: Set(terms.currency),
        payment_method: Set(purchase.payment_method),
        payment_reference: Set(purchase.payment_reference),
        paid_at: Set(now),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(Some((subscription, payment)))
}

/// Stop renewal. Access continues until `ends_at`.
pub async fn cancel(
    db: &DatabaseConnection,
    subscription: subscriptions::Model,
) -> Result<subscriptions::Model, DbErr> {
    let mut active: subscriptions::ActiveModel = subscription.into();
    active.status = Set(SubscriptionStatus::Cancelled);
    active.auto_renew = Set(false);
    active.updated_at = Set(Some(Utc::now()));
    active.update(db).await
}

/// Use one booking from a trial's quota.
///
/// The write only lands if the counter still holds the value we read, so
/// two accepts racing for the last slot cannot both succeed. Returns false
/// when the quota is spent or the trial is no longer active.
pub async fn consume_trial_booking<C: ConnectionTrait>(
    db: &C,
    subscription_id: Uuid,
) -> Result<bool, DbErr> {
    let Some(trial) = subscriptions::Entity::find_by_id(subscription_id).one(db).await? else {
        return Ok(false);
    };
    let quota = trial.booking_quota.unwrap_or(0);
    if trial.status != SubscriptionStatus::Active || trial.bookings_used >= quota {
        return Ok(false);
    }

    let result = subscriptions::Entity::update_many()
        .set(subscriptions::ActiveModel {
            bookings_used: Set(trial.bookings_used + 1),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        })
        .filter(subscriptions::Column::Id.eq(subscription_id))
        .filter(subscriptions::Column::BookingsUsed.eq(trial.bookings_used))
        .exec(db)
        .await?;

    Ok(result.rows_affected == 1)
}

pub async fn payments_for_technician(
    db: &DatabaseConnection,
    technician_id: Uuid,
) -> Result<Vec<subscription_payments::Model>, DbErr> {
    subscription_payments::Entity::find()
        .filter(subscription_payments::Column::TechnicianId.eq(technician_id))
        .order_by_desc(subscription_payments::Column::PaidAt)
        .all(db)
        .await
}

/// Mark every subscription whose period is over as expired.
pub async fn expire_lapsed(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<u64, DbErr> {
    let result = subscriptions::Entity::update_many()
        .set(subscriptions::ActiveModel {
            status: Set(SubscriptionStatus::Expired),
            updated_at: Set(Some(now)),
            ..Default::default()
        })
        .filter(subscriptions::Column::Status.ne(SubscriptionStatus::Expired))
        .filter(subscriptions::Column::EndsAt.lte(now))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Subscriptions currently granting access, trials included.
pub async fn count_live(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<u64, DbErr> {
    subscriptions::Entity::find()
        .filter(subscriptions::Column::Status.ne(SubscriptionStatus::Expired))
        .filter(subscriptions::Column::StartsAt.lte(now))
        .filter(subscriptions::Column::EndsAt.gt(now))
        .count(db)
        .await
}
