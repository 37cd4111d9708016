use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use uuid::Uuid;
use validator::Validate;

use crate::auth::authorization::{
    verify_booking_client, verify_booking_technician, verify_booking_viewer,
};
use crate::auth::middleware::AuthenticatedUser;
use crate::cache::AppCache;
use crate::db::bookings::{self as booking_db, AcceptOutcome, PaymentRecord, StatusChange};
use crate::db::{reviews as review_db, subscriptions as subscription_db};
use crate::db::technicians as technician_db;
use crate::domain::availability::{Slot, first_conflict, normalize_duration};
use crate::domain::booking_status::{Actor, TransitionError, authorize_transition};
use crate::domain::ratings::is_valid_rating;
use crate::domain::subscription_gate::{GateError, check_can_accept};
use crate::errors::{AppError, AppResult};
use crate::handlers::technicians::invalidate_owner_card;
use crate::models::PaginationQuery;
use crate::models::bookings::{
    self, BookingListQuery, BookingStatus, CreateBooking, RecordPayment, StatusReason,
    UpdateBookingStatus,
};
use crate::models::reviews::CreateReview;
use crate::models::technician_profiles::VerificationStatus;
use crate::models::users::Roles;
use crate::uploads::UploadStore;

/// Tolerance when comparing a payment with the amount due.
const AMOUNT_EPSILON: f64 = 0.005;

async fn load_booking(db: &DatabaseConnection, id: Uuid) -> AppResult<bookings::Model> {
    booking_db::get_booking_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Booking {id} not found")))
}

/// Check `actor` may move `booking` to `to`, then apply it with the guarded
/// update. Losing a race to another request surfaces as a transition error
/// against the status now stored.
pub(crate) async fn apply_transition(
    db: &DatabaseConnection,
    booking: &bookings::Model,
    actor: Actor,
    to: BookingStatus,
    change: StatusChange,
) -> AppResult<bookings::Model> {
    authorize_transition(actor, booking.status, to)?;

    match booking_db::transition_status(db, booking.id, booking.status, to, change).await? {
        Some(updated) => {
            tracing::info!(
                booking_id = %updated.id,
                from = ?booking.status,
                to = ?updated.status,
                actor = ?actor,
                "Booking status changed"
            );
            Ok(updated)
        }
        None => Err(stale_status(db, booking.id, to).await),
    }
}

async fn stale_status(db: &DatabaseConnection, id: Uuid, to: BookingStatus) -> AppError {
    match booking_db::get_booking_by_id(db, id).await {
        Ok(Some(current)) => {
            tracing::warn!(booking_id = %id, current = ?current.status, wanted = ?to, "Lost a status race");
            TransitionError::InvalidTransition {
                from: current.status,
                to,
            }
            .into()
        }
        Ok(None) => AppError::NotFound(format!("Booking {id} not found")),
        Err(e) => e.into(),
    }
}

fn party_actor(user: &AuthenticatedUser, booking: &bookings::Model) -> AppResult<Actor> {
    Actor::for_booking(user.id(), user.role(), booking.client_id, booking.technician_id)
        .ok_or_else(|| {
            AppError::Forbidden("You can only act on bookings you are involved in".to_string())
        })
}

/// POST /api/bookings
///
/// A client requests a verified technician for a future time slot. The slot
/// must not overlap anything the technician already accepted.
pub async fn create_booking(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    body: web::Json<CreateBooking>,
) -> AppResult<HttpResponse> {
    if user.role() != Roles::Client {
        return Err(AppError::Forbidden(
            "Only clients can request bookings".to_string(),
        ));
    }

    let input = body.into_inner();
    input.validate()?;

    let duration = normalize_duration(input.duration_minutes)
        .map_err(|msg| AppError::validation("duration_minutes", msg))?;
    if input.scheduled_at <= chrono::Utc::now() {
        return Err(AppError::validation(
            "scheduled_at",
            "Bookings must be scheduled in the future",
        ));
    }
    if input.technician_id == user.id() {
        return Err(AppError::BadRequest("You cannot book yourself".to_string()));
    }

    let profile = technician_db::get_profile_by_user_id(db.get_ref(), input.technician_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Technician {} not found", input.technician_id)))?;
    if profile.verification_status != VerificationStatus::Verified {
        return Err(AppError::BadRequest(
            "This technician has not been verified yet".to_string(),
        ));
    }

    let slot = Slot::new(input.scheduled_at, duration);
    let schedule =
        booking_db::blocking_bookings_near(db.get_ref(), input.technician_id, slot.start, slot.end)
            .await?;
    if let Some(conflict) = first_conflict(&schedule, slot, None) {
        return Err(AppError::SlotUnavailable(format!(
            "The technician is already booked from {} to {}",
            conflict.scheduled_at,
            conflict.ends_at()
        )));
    }

    let booking = booking_db::insert_booking(db.get_ref(), user.id(), input, duration).await?;
    tracing::info!(booking_id = %booking.id, client_id = %booking.client_id, technician_id = %booking.technician_id, "Booking requested");

    Ok(HttpResponse::Created().json(booking))
}

/// GET /api/bookings
///
/// Bookings where the caller is the client or the technician.
pub async fn get_bookings(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    query: web::Query<BookingListQuery>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let paging = PaginationQuery {
        page: query.page,
        limit: query.limit,
    };

    let bookings = booking_db::list_for_user(
        db.get_ref(),
        user.id(),
        query.status,
        paging.page(),
        paging.limit(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(bookings))
}

/// GET /api/bookings/{id}
pub async fn get_booking(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let booking = load_booking(db.get_ref(), path.into_inner()).await?;
    verify_booking_viewer(&booking, &user)?;

    Ok(HttpResponse::Ok().json(booking))
}

/// POST /api/bookings/{id}/accept
///
/// Technician only. Requires a live subscription (or trial quota) and a slot
/// that is still free.
pub async fn accept_booking(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let booking = load_booking(db.get_ref(), path.into_inner()).await?;
    verify_booking_technician(&booking, user.id())?;
    authorize_transition(Actor::Technician, booking.status, BookingStatus::Accepted)?;

    let subscriptions = subscription_db::list_for_technician(db.get_ref(), user.id()).await?;
    let entitlement = check_can_accept(&subscriptions, chrono::Utc::now()).inspect_err(|e| {
        tracing::info!(booking_id = %booking.id, technician_id = %user.id(), reason = e.code(), "Accept refused by subscription gate");
    })?;

    match booking_db::accept_booking(db.get_ref(), &booking, entitlement).await? {
        AcceptOutcome::Accepted(updated) => {
            tracing::info!(booking_id = %updated.id, entitlement = ?entitlement, "Booking accepted");
            Ok(HttpResponse::Ok().json(updated))
        }
        AcceptOutcome::StatusChanged => {
            Err(stale_status(db.get_ref(), booking.id, BookingStatus::Accepted).await)
        }
        AcceptOutcome::SlotTaken => Err(AppError::SlotUnavailable(
            "You already accepted another booking in this time slot".to_string(),
        )),
        AcceptOutcome::TrialExhausted => Err(GateError::TrialQuotaExhausted.into()),
    }
}

/// POST /api/bookings/{id}/decline
pub async fn decline_booking(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
    body: Option<web::Json<StatusReason>>,
) -> AppResult<HttpResponse> {
    let reason = body.map(|b| b.into_inner()).unwrap_or_default();
    reason.validate()?;

    let booking = load_booking(db.get_ref(), path.into_inner()).await?;
    verify_booking_technician(&booking, user.id())?;

    let updated = apply_transition(
        db.get_ref(),
        &booking,
        Actor::Technician,
        BookingStatus::Declined,
        StatusChange {
            reason: reason.reason,
            ..Default::default()
        },
    )
    .await?;

    Ok(HttpResponse::Ok().json(updated))
}

/// POST /api/bookings/{id}/cancel
///
/// Client or technician, while the booking is still pending or accepted.
pub async fn cancel_booking(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
    body: Option<web::Json<StatusReason>>,
) -> AppResult<HttpResponse> {
    let reason = body.map(|b| b.into_inner()).unwrap_or_default();
    reason.validate()?;

    let booking = load_booking(db.get_ref(), path.into_inner()).await?;
    let actor = party_actor(&user, &booking)?;

    let updated = apply_transition(
        db.get_ref(),
        &booking,
        actor,
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

/// PUT /api/bookings/{id}/status
///
/// Technician progress updates: on_the_way, in_progress, awaiting_payment.
/// Asking for payment fixes the final price, falling back to the estimate.
pub async fn update_status(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateBookingStatus>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    input.validate()?;

    if !matches!(
        input.status,
        BookingStatus::OnTheWay | BookingStatus::InProgress | BookingStatus::AwaitingPayment
    ) {
        return Err(AppError::validation(
            "status",
            "Use the dedicated endpoint for this status",
        ));
    }

    let booking = load_booking(db.get_ref(), path.into_inner()).await?;
    verify_booking_technician(&booking, user.id())?;

    let mut change = StatusChange::default();
    if input.status == BookingStatus::AwaitingPayment {
        let price = input
            .final_price
            .or(booking.estimated_price)
            .ok_or_else(|| {
                AppError::validation("final_price", "A final price is required to request payment")
            })?;
        change.final_price = Some(price);
    }

    let updated =
        apply_transition(db.get_ref(), &booking, Actor::Technician, input.status, change).await?;

    Ok(HttpResponse::Ok().json(updated))
}

/// POST /api/bookings/{id}/payment
///
/// The client settles the amount due, which completes the booking.
pub async fn record_payment(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
    body: web::Json<RecordPayment>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    input.validate()?;

    let booking = load_booking(db.get_ref(), path.into_inner()).await?;
    verify_booking_client(&booking, user.id())?;
    authorize_transition(Actor::Client, booking.status, BookingStatus::Completed)?;

    let due = booking
        .amount_due()
        .ok_or_else(|| AppError::BadRequest("This booking has no price yet".to_string()))?;
    if (input.amount - due).abs() > AMOUNT_EPSILON {
        return Err(AppError::validation(
            "amount",
            format!("Amount must equal the amount due ({due:.2})"),
        ));
    }

    let updated = apply_transition(
        db.get_ref(),
        &booking,
        Actor::Client,
        BookingStatus::Completed,
        StatusChange {
            payment: Some(PaymentRecord {
                method: input.method,
                reference: input.reference,
                amount: input.amount,
            }),
            ..Default::default()
        },
    )
    .await?;

    tracing::info!(booking_id = %updated.id, amount = input.amount, method = ?input.method, "Booking paid");
    Ok(HttpResponse::Ok().json(updated))
}

/// POST /api/bookings/{id}/receipt (multipart, field `file`)
pub async fn upload_receipt(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    store: web::Data<UploadStore>,
    path: web::Path<Uuid>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let booking = load_booking(db.get_ref(), path.into_inner()).await?;
    verify_booking_client(&booking, user.id())?;

    if !matches!(
        booking.status,
        BookingStatus::AwaitingPayment | BookingStatus::Completed
    ) {
        return Err(AppError::Conflict(
            "Receipts can only be attached once payment is due".to_string(),
        ));
    }

    let file = store.read_file(payload).await?;
    let url = store.save("receipts", file).await?;
    let updated = booking_db::set_receipt_url(db.get_ref(), booking.id, url).await?;

    Ok(HttpResponse::Ok().json(updated))
}

/// POST /api/bookings/{id}/review
///
/// One review per completed, paid booking. Refreshes the technician's
/// average rating.
pub async fn create_review(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<AppCache>,
    path: web::Path<Uuid>,
    body: web::Json<CreateReview>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    input.validate()?;
    if !is_valid_rating(input.rating) {
        return Err(AppError::validation(
            "rating",
            "Rating must be a whole number from 1 to 5",
        ));
    }

    let booking = load_booking(db.get_ref(), path.into_inner()).await?;
    verify_booking_client(&booking, user.id())?;

    if booking.status != BookingStatus::Completed || booking.paid_at.is_none() {
        return Err(AppError::Conflict(
            "Only completed, paid bookings can be reviewed".to_string(),
        ));
    }
    if review_db::get_review_by_booking(db.get_ref(), booking.id)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "This booking has already been reviewed".to_string(),
        ));
    }

    let (review, average) = review_db::insert_review(db.get_ref(), &booking, input).await?;
    tracing::info!(booking_id = %booking.id, technician_id = %booking.technician_id, average, "Review recorded");

    invalidate_owner_card(db.get_ref(), cache.get_ref(), booking.technician_id).await?;

    Ok(HttpResponse::Created().json(review))
}
