use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::authorization::require_admin;
use crate::auth::middleware::AuthenticatedUser;
use crate::cache::AppCache;
use crate::db::bookings::{self as booking_db, StatusChange};
use crate::db::technicians as technician_db;
use crate::db::{subscriptions as subscription_db, users as user_db};
use crate::domain::booking_status::Actor;
use crate::errors::{AppError, AppResult};
use crate::handlers::bookings::apply_transition;
use crate::models::PaginationQuery;
use crate::models::bookings::{BookingListQuery, BookingStatus, StatusReason};
use crate::models::technician_profiles::{TechnicianResponse, VerificationStatus, VerifyTechnician};

#[derive(Debug, Default, Deserialize)]
pub struct TechnicianListQuery {
    pub status: Option<VerificationStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// GET /api/admin/technicians
pub async fn list_technicians(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    query: web::Query<TechnicianListQuery>,
) -> AppResult<HttpResponse> {
    require_admin(&user)?;

    let query = query.into_inner();
    let paging = PaginationQuery {
        page: query.page,
        limit: query.limit,
    };

    let rows = technician_db::list_by_verification(
        db.get_ref(),
        query.status,
        paging.page(),
        paging.limit(),
    )
    .await?;

    let technicians: Vec<TechnicianResponse> = rows
        .into_iter()
        .map(|(profile, owner)| TechnicianResponse::from_parts(profile, owner.as_ref()))
        .collect();

    Ok(HttpResponse::Ok().json(technicians))
}

/// PUT /api/admin/technicians/{id}/verify
pub async fn verify_technician(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<AppCache>,
    path: web::Path<Uuid>,
    body: web::Json<VerifyTechnician>,
) -> AppResult<HttpResponse> {
    require_admin(&user)?;

    let input = body.into_inner();
    input.validate()?;
    if input.status == VerificationStatus::Pending {
        return Err(AppError::validation(
            "status",
            "Status must be verified or rejected",
        ));
    }

    let id = path.into_inner();
    let profile = technician_db::set_verification(db.get_ref(), id, input.status, input.note).await?;
    cache.invalidate_technician(&profile.id.to_string()).await;
    tracing::info!(profile_id = %profile.id, status = ?profile.verification_status, admin_id = %user.id(), "Technician verification decided");

    let owner = user_db::get_user_by_id(db.get_ref(), profile.user_id).await?;
    Ok(HttpResponse::Ok().json(TechnicianResponse::from_parts(profile, owner.as_ref())))
}

/// GET /api/admin/bookings
pub async fn list_bookings(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    query: web::Query<BookingListQuery>,
) -> AppResult<HttpResponse> {
    require_admin(&user)?;

    let query = query.into_inner();
    let paging = PaginationQuery {
        page: query.page,
        limit: query.limit,
    };

    let bookings =
        booking_db::list_all(db.get_ref(), query.status, paging.page(), paging.limit()).await?;
    Ok(HttpResponse::Ok().json(bookings))
}

/// POST /api/admin/bookings/{id}/cancel
///
/// Override: cancels any booking that hasn't finished yet.
pub async fn cancel_booking(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
    body: Option<web::Json<StatusReason>>,
) -> AppResult<HttpResponse> {
    require_admin(&user)?;

    let reason = body.map(|b| b.into_inner()).unwrap_or_default();
    reason.validate()?;

    let id = path.into_inner();
    let booking = booking_db::get_booking_by_id(db.get_ref(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Booking {id} not found")))?;

    let updated = apply_transition(
        db.get_ref(),
        &booking,
        Actor::Admin,
        BookingStatus::Cancelled,
        StatusChange {
            reason: reason.reason,
            cancelled_by: Some(user.id()),
            ..Default::default()
        },
    )
    .await?;

    Ok(HttpResponse::Ok().json(updated))
}

/// GET /api/admin/stats
pub async fn stats(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> AppResult<HttpResponse> {
    require_admin(&user)?;

    let users = user_db::count_by_role(db.get_ref()).await?;
    let bookings = booking_db::count_by_status(db.get_ref()).await?;
    let live_subscriptions = subscription_db::count_live(db.get_ref(), chrono::Utc::now()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "users": users,
        "bookings": bookings,
        "live_subscriptions": live_subscriptions,
    })))
}
