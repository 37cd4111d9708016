use chrono::{DateTime, Utc};
use sea_orm::*;
use std::collections::HashMap;
use uuid::Uuid;

use super::{normalize_city, page_offset};
use crate::domain::availability::{MAX_DURATION_MINUTES, Slot, first_conflict};
use crate::domain::subscription_gate::Entitlement;
use crate::models::bookings::{self, BookingStatus, CreateBooking, PaymentMethod};

/// Extra columns written together with a status change.
#[derive(Debug, Clone, Default)]
pub struct StatusChange {
    pub reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub final_price: Option<f64>,
    pub payment: Option<PaymentRecord>,
}

#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub amount: f64,
}

/// Result of trying to accept a pending booking.
#[derive(Debug)]
pub enum AcceptOutcome {
    Accepted(bookings::Model),
    /// Someone else moved the booking first.
    StatusChanged,
    /// The technician already holds an overlapping booking.
    SlotTaken,
    /// The trial ran out between the gate check and the write.
    TrialExhausted,
}

/// Insert a new pending booking for `client_id`.
pub async fn insert_booking(
    db: &DatabaseConnection,
    client_id: Uuid,
    input: CreateBooking,
    duration_minutes: i32,
) -> Result<bookings::Model, DbErr> {
    let booking = bookings::ActiveModel {
        id: Set(Uuid::new_v4()),
        client_id: Set(client_id),
        technician_id: Set(input.technician_id),
        category: Set(input.category),
        description: Set(input.description),
        address: Set(input.address),
        city: Set(normalize_city(&input.city)),
        latitude: Set(input.latitude),
        longitude: Set(input.longitude),
        scheduled_at: Set(input.scheduled_at),
        duration_minutes: Set(duration_minutes),
        status: Set(BookingStatus::Pending),
        estimated_price: Set(input.estimated_price),
        final_price: Set(None),
        payment_method: Set(None),
        payment_reference: Set(None),
        amount_paid: Set(None),
        receipt_url: Set(None),
        paid_at: Set(None),
        status_reason: Set(None),
        cancelled_by: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    };

    booking.insert(db).await
}

pub async fn get_booking_by_id<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<Option<bookings::Model>, DbErr> {
    bookings::Entity::find_by_id(id).one(db).await
}

/// Bookings where the user is either the client or the technician, newest first.
pub async fn list_for_user(
    db: &DatabaseConnection,
    user_id: Uuid,
    status: Option<BookingStatus>,
    page: u64,
    limit: u64,
) -> Result<Vec<bookings::Model>, DbErr> {
    let mut select = bookings::Entity::find().filter(
        Condition::any()
            .add(bookings::Column::ClientId.eq(user_id))
            .add(bookings::Column::TechnicianId.eq(user_id)),
    );
    if let Some(status) = status {
        select = select.filter(bookings::Column::Status.eq(status));
    }

    select
        .order_by_desc(bookings::Column::ScheduledAt)
        .offset(page_offset(page, limit))
        .limit(limit)
        .all(db)
        .await
}

/// Every booking on the platform, for admins.
pub async fn list_all(
    db: &DatabaseConnection,
    status: Option<BookingStatus>,
    page: u64,
    limit: u64,
) -> Result<Vec<bookings::Model>, DbErr> {
    let mut select = bookings::Entity::find();
    if let Some(status) = status {
        select = select.filter(bookings::Column::Status.eq(status));
    }

    select
        .order_by_desc(bookings::Column::CreatedAt)
        .offset(page_offset(page, limit))
        .limit(limit)
        .all(db)
        .await
}

/// Slot-holding bookings of one technician that could overlap `[start, end)`.
///
/// A booking can only reach into the window if it starts less than the
/// longest allowed duration before `start`, which bounds the scan.
pub async fn blocking_bookings_near<C: ConnectionTrait>(
    db: &C,
    technician_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<bookings::Model>, DbErr> {
    let earliest = start - chrono::Duration::minutes(i64::from(MAX_DURATION_MINUTES));

    bookings::Entity::find()
        .filter(bookings::Column::TechnicianId.eq(technician_id))
        .filter(bookings::Column::Status.is_in([
            BookingStatus::Accepted,
            BookingStatus::OnTheWay,
            BookingStatus::InProgress,
        ]))
        .filter(bookings::Column::ScheduledAt.gt(earliest))
        .filter(bookings::Column::ScheduledAt.lt(end))
        .all(db)
        .await
}

/// Same as [`blocking_bookings_near`] for several technicians at once.
pub async fn blocking_bookings_for_many(
    db: &DatabaseConnection,
    technician_ids: Vec<Uuid>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<HashMap<Uuid, Vec<bookings::Model>>, DbErr> {
    if technician_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let earliest = start - chrono::Duration::minutes(i64::from(MAX_DURATION_MINUTES));

    let rows = bookings::Entity::find()
        .filter(bookings::Column::TechnicianId.is_in(technician_ids))
        .filter(bookings::Column::Status.is_in([
            BookingStatus::Accepted,
            BookingStatus::OnTheWay,
            BookingStatus::InProgress,
        ]))
        .filter(bookings::Column::ScheduledAt.gt(earliest))
        .filter(bookings::Column::ScheduledAt.lt(end))
        .all(db)
        .await?;

    let mut grouped: HashMap<Uuid, Vec<bookings::Model>> = HashMap::new();
    for booking in rows {
        grouped.entry(booking.technician_id).or_default().push(booking);
    }
    Ok(grouped)
}

/// Move a booking from `from` to `to`, but only if it is still in `from`.
///
/// Returns `None` when the row was not in the expected status, which means a
/// concurrent request got there first.
pub async fn transition_status<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    from: BookingStatus,
    to: BookingStatus,
    change: StatusChange,
) -> Result<Option<bookings::Model>, DbErr> {
    let now = Utc::now();
    let mut update = bookings::ActiveModel {
        status: Set(to),
        updated_at: Set(Some(now)),
        ..Default::default()
    };

    if let Some(reason) = change.reason {
        update.status_reason = Set(Some(reason));
    }
    if let Some(cancelled_by) = change.cancelled_by {
        update.cancelled_by = Set(Some(cancelled_by));
    }
    if let Some(final_price) = change.final_price {
        update.final_price = Set(Some(final_price));
    }
    if let Some(payment) = change.payment {
        update.payment_method = Set(Some(payment.method));
        update.payment_reference = Set(payment.reference);
        update.amount_paid = Set(Some(payment.amount));
        update.paid_at = Set(Some(now));
    }

    let result = bookings::Entity::update_many()
        .set(update)
        .filter(bookings::Column::Id.eq(id))
        .filter(bookings::Column::Status.eq(from))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Ok(None);
    }

    get_booking_by_id(db, id).await
}

/// Accept a pending booking, consuming a trial booking when that is what
/// entitles the technician. Both writes commit or neither does.
///
/// The technician's row is locked first, so the slot check and the status
/// change can't interleave with another accept for the same technician.
pub async fn accept_booking(
    db: &DatabaseConnection,
    booking: &bookings::Model,
    entitlement: Entitlement,
) -> Result<AcceptOutcome, DbErr> {
    let txn = db.begin().await?;
    super::users::lock_for_update(&txn, booking.technician_id).await?;

    let slot = Slot::new(booking.scheduled_at, booking.duration_minutes);
    let schedule =
        blocking_bookings_near(&txn, booking.technician_id, slot.start, slot.end).await?;
    if first_conflict(&schedule, slot, Some(booking.id)).is_some() {
        txn.rollback().await?;
        return Ok(AcceptOutcome::SlotTaken);
    }

    let accepted = transition_status(
        &txn,
        booking.id,
        BookingStatus::Pending,
        BookingStatus::Accepted,
        StatusChange::default(),
    )
    .await?;

    let Some(accepted) = accepted else {
        txn.rollback().await?;
        return Ok(AcceptOutcome::StatusChanged);
    };

    if let Entitlement::Trial(subscription_id) = entitlement {
        if !super::subscriptions::consume_trial_booking(&txn, subscription_id).await? {
            txn.rollback().await?;
            return Ok(AcceptOutcome::TrialExhausted);
        }
    }

    txn.commit().await?;
    Ok(AcceptOutcome::Accepted(accepted))
}

pub async fn set_receipt_url(
    db: &DatabaseConnection,
    id: Uuid,
    url: String,
) -> Result<bookings::Model, DbErr> {
    let booking = bookings::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DbErr::RecordNotFound("Booking not found".to_string()))?;

    let mut active: bookings::ActiveModel = booking.into();
    active.receipt_url = Set(Some(url));
    active.updated_at = Set(Some(Utc::now()));
    active.update(db).await
}

/// Number of bookings per status, for the admin dashboard.
pub async fn count_by_status(
    db: &DatabaseConnection,
) -> Result<HashMap<BookingStatus, u64>, DbErr> {
    let mut counts = HashMap::new();
    for status in BookingStatus::iter() {
        let count = bookings::Entity::find()
            .filter(bookings::Column::Status.eq(status))
            .count(db)
            .await?;
        counts.insert(status, count);
    }
    Ok(counts)
}
