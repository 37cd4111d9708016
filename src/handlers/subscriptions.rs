use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use validator::Validate;

use crate::auth::authorization::require_technician;
use crate::auth::middleware::AuthenticatedUser;
use crate::db::subscriptions::{self as subscription_db, PlanPurchase};
use crate::domain::plans::PlanCatalogue;
use crate::domain::subscription_gate::{current_status, live_paid};
use crate::errors::{AppError, AppResult};
use crate::models::subscriptions::{
    CreateSubscription, Plan, SubscriptionStatus, SubscriptionStatusResponse,
};

/// GET /api/subscriptions/plans (public)
pub async fn get_plans(plans: web::Data<PlanCatalogue>) -> HttpResponse {
    HttpResponse::Ok().json(plans.all())
}

/// GET /api/subscriptions/status
pub async fn get_status(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> AppResult<HttpResponse> {
    require_technician(&user)?;

    let subscriptions = subscription_db::list_for_technician(db.get_ref(), user.id()).await?;
    let summary = current_status(&subscriptions, chrono::Utc::now());

    Ok(HttpResponse::Ok().json(SubscriptionStatusResponse {
        state: summary.state,
        can_accept_bookings: summary.gate.is_ok(),
        subscription: summary.subscription,
        days_remaining: summary.days_remaining,
        bookings_remaining: summary.bookings_remaining,
        reason: summary.gate.err().map(|e| e.code().to_string()),
    }))
}

/// POST /api/subscriptions/trial
///
/// Starts the free trial. Each technician gets exactly one.
pub async fn start_trial(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    plans: web::Data<PlanCatalogue>,
) -> AppResult<HttpResponse> {
    require_technician(&user)?;

    let trial = subscription_db::start_trial(db.get_ref(), user.id(), plans.get_ref())
        .await?
        .ok_or_else(|| AppError::Conflict("The free trial has already been used".to_string()))?;
    tracing::info!(technician_id = %user.id(), ends_at = %trial.ends_at, "Trial started");

    Ok(HttpResponse::Created().json(trial))
}

/// POST /api/subscriptions/create
///
/// Buys a paid plan and records its payment. Refused while a paid period is
/// still running; a running trial is closed.
pub async fn create_subscription(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    plans: web::Data<PlanCatalogue>,
    body: web::Json<CreateSubscription>,
) -> AppResult<HttpResponse> {
    require_technician(&user)?;

    let input = body.into_inner();
    input.validate()?;
    if input.plan == Plan::Trial {
        return Err(AppError::validation(
            "plan",
            "Use /subscriptions/trial to start the free trial",
        ));
    }

    let (subscription, payment) = subscription_db::create_paid(
        db.get_ref(),
        user.id(),
        PlanPurchase {
            plan: input.plan,
            payment_method: input.payment_method,
            payment_reference: input.payment_reference,
            auto_renew: input.auto_renew.unwrap_or(false),
        },
        plans.get_ref(),
    )
    .await?
    .ok_or_else(|| AppError::Conflict("You already have an active subscription".to_string()))?;
    tracing::info!(technician_id = %user.id(), plan = ?subscription.plan, amount = payment.amount, "Subscription purchased");

    Ok(HttpResponse::Created().json(serde_json::json!({
        "subscription": subscription,
        "payment": payment,
    })))
}

/// POST /api/subscriptions/cancel
///
/// Stops renewal; access lasts until the period ends.
pub async fn cancel_subscription(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> AppResult<HttpResponse> {
    require_technician(&user)?;

    let existing = subscription_db::list_for_technician(db.get_ref(), user.id()).await?;
    let current = live_paid(&existing, chrono::Utc::now())
        .filter(|s| s.status == SubscriptionStatus::Active)
        .cloned()
        .ok_or_else(|| AppError::NotFound("No active paid subscription to cancel".to_string()))?;

    let cancelled = subscription_db::cancel(db.get_ref(), current).await?;
    tracing::info!(technician_id = %user.id(), ends_at = %cancelled.ends_at, "Subscription cancelled");

    Ok(HttpResponse::Ok().json(cancelled))
}

/// GET /api/subscriptions/payments
pub async fn get_payments(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> AppResult<HttpResponse> {
    require_technician(&user)?;

    let payments = subscription_db::payments_for_technician(db.get_ref(), user.id()).await?;
    Ok(HttpResponse::Ok().json(payments))
}
