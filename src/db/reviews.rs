use sea_orm::*;
use uuid::Uuid;

use crate::domain::ratings::average_rating;
use crate::models::bookings;
use crate::models::reviews::{self, CreateReview};

/// Insert the review for a completed booking and refresh the technician's
/// average in the same transaction.
pub async fn insert_review(
    db: &DatabaseConnection,
    booking: &bookings::Model,
    input: CreateReview,
) -> Result<(reviews::Model, f64), DbErr> {
    let txn = db.begin().await?;

    let review = reviews::ActiveModel {
        id: Set(Uuid::new_v4()),
        booking_id: Set(booking.id),
        client_id: Set(booking.client_id),
        technician_id: Set(booking.technician_id),
        rating: Set(input.rating),
        comment: Set(input.comment),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(&txn)
    .await?;

    let ratings = ratings_for_technician(&txn, booking.technician_id).await?;
    let average = average_rating(&ratings);
    super::technicians::update_rating(&txn, booking.technician_id, average, ratings.len() as i32)
        .await?;

    txn.commit().await?;
    Ok((review, average))
}

pub async fn get_review_by_booking(
    db: &DatabaseConnection,
    booking_id: Uuid,
) -> Result<Option<reviews::Model>, DbErr> {
    reviews::Entity::find()
        .filter(reviews::Column::BookingId.eq(booking_id))
        .one(db)
        .await
}

/// Reviews received by a technician (by user id), newest first.
pub async fn get_reviews_for_technician(
    db: &DatabaseConnection,
    technician_user_id: Uuid,
    page: u64,
    limit: u64,
) -> Result<Vec<reviews::Model>, DbErr> {
    reviews::Entity::find()
        .filter(reviews::Column::TechnicianId.eq(technician_user_id))
        .order_by_desc(reviews::Column::CreatedAt)
        .offset(super::page_offset(page, limit))
        .limit(limit)
        .all(db)
        .await
}

async fn ratings_for_technician<C: ConnectionTrait>(
    db: &C,
    technician_user_id: Uuid,
) -> Result<Vec<i32>, DbErr> {
    let rows = reviews::Entity::find()
        .filter(reviews::Column::TechnicianId.eq(technician_user_id))
        .all(db)
        .await?;

    Ok(rows.into_iter().map(|r| r.rating).collect())
}
