use sea_orm::*;
use uuid::Uuid;

use super::{normalize_city, page_offset};
use crate::models::technician_profiles::{
    self, CreateTechnicianProfile, ServiceCategory, TechnicianSearchQuery,
    UpdateTechnicianProfile, VerificationStatus,
};
use crate::models::users::{self, Roles};

/// Create a technician profile and promote its owner to the technician role.
pub async fn insert_profile(
    db: &DatabaseConnection,
    user_id: Uuid,
    input: CreateTechnicianProfile,
) -> Result<technician_profiles::Model, DbErr> {
    let txn = db.begin().await?;

    let profile = technician_profiles::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        category: Set(input.category),
        skills: Set(input.skills),
        bio: Set(input.bio),
        hourly_rate: Set(input.hourly_rate),
        city: Set(normalize_city(&input.city)),
        address: Set(input.address),
        latitude: Set(input.latitude),
        longitude: Set(input.longitude),
        years_experience: Set(input.years_experience.unwrap_or(0)),
        verification_status: Set(VerificationStatus::Pending),
        verification_note: Set(None),
        id_document_url: Set(None),
        is_online: Set(false),
        average_rating: Set(0.0),
        review_count: Set(0),
        created_at: Set(chrono::Utc::now()),
        updated_at: Set(None),
    }
    .insert(&txn)
    .await?;

    super::users::set_role(&txn, user_id, Roles::Technician).await?;

    txn.commit().await?;
    Ok(profile)
}

pub async fn get_profile_by_id(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<Option<technician_profiles::Model>, DbErr> {
    technician_profiles::Entity::find_by_id(id).one(db).await
}

pub async fn get_profile_by_user_id(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> Result<Option<technician_profiles::Model>, DbErr> {
    technician_profiles::Entity::find()
        .filter(technician_profiles::Column::UserId.eq(user_id))
        .one(db)
        .await
}

/// Fetch a profile together with its owner.
pub async fn get_profile_with_user(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<Option<(technician_profiles::Model, Option<users::Model>)>, DbErr> {
    technician_profiles::Entity::find_by_id(id)
        .find_also_related(users::Entity)
        .one(db)
        .await
}

async fn require_profile_for_user(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> Result<technician_profiles::Model, DbErr> {
    get_profile_by_user_id(db, user_id)
        .await?
        .ok_or(DbErr::RecordNotFound("Technician profile not found".to_string()))
}

/// Partial update of the caller's own profile.
pub async fn update_profile(
    db: &DatabaseConnection,
    user_id: Uuid,
    input: UpdateTechnicianProfile,
) -> Result<technician_profiles::Model, DbErr> {
    let profile = require_profile_for_user(db, user_id).await?;
    let mut active: technician_profiles::ActiveModel = profile.into();

    if let Some(category) = input.category {
        active.category = Set(category);
    }
    if let Some(skills) = input.skills {
        active.skills = Set(Some(skills));
    }
    if let Some(bio) = input.bio {
        active.bio = Set(Some(bio));
    }
    if let Some(hourly_rate) = input.hourly_rate {
        active.hourly_rate = Set(hourly_rate);
    }
    if let Some(city) = input.city {
        active.city = Set(normalize_city(&city));
    }
    if let Some(address) = input.address {
        active.address = Set(Some(address));
    }
    if let Some(latitude) = input.latitude {
        active.latitude = Set(Some(latitude));
    }
    if let Some(longitude) = input.longitude {
        active.longitude = Set(Some(longitude));
    }
    if let Some(years) = input.years_experience {
        active.years_experience = Set(years);
    }
    active.updated_at = Set(Some(chrono::Utc::now()));

    active.update(db).await
}

pub async fn set_online(
    db: &DatabaseConnection,
    user_id: Uuid,
    is_online: bool,
) -> Result<technician_profiles::Model, DbErr> {
    let profile = require_profile_for_user(db, user_id).await?;
    let mut active: technician_profiles::ActiveModel = profile.into();
    active.is_online = Set(is_online);
    active.updated_at = Set(Some(chrono::Utc::now()));
    active.update(db).await
}

/// Store a newly uploaded identity document. A rejected technician who
/// re-uploads goes back into the review queue.
pub async fn set_document_url(
    db: &DatabaseConnection,
    user_id: Uuid,
    url: String,
) -> Result<technician_profiles::Model, DbErr> {
    let profile = require_profile_for_user(db, user_id).await?;
    let was_rejected = profile.verification_status == VerificationStatus::Rejected;

    let mut active: technician_profiles::ActiveModel = profile.into();
    active.id_document_url = Set(Some(url));
    if was_rejected {
        active.verification_status = Set(VerificationStatus::Pending);
        active.verification_note = Set(None);
    }
    active.updated_at = Set(Some(chrono::Utc::now()));
    active.update(db).await
}

pub async fn set_verification(
    db: &DatabaseConnection,
    id: Uuid,
    status: VerificationStatus,
    note: Option<String>,
) -> Result<technician_profiles::Model, DbErr> {
    let profile = get_profile_by_id(db, id)
        .await?
        .ok_or(DbErr::RecordNotFound("Technician profile not found".to_string()))?;

    let mut active: technician_profiles::ActiveModel = profile.into();
    active.verification_status = Set(status);
    active.verification_note = Set(note);
    active.updated_at = Set(Some(chrono::Utc::now()));
    active.update(db).await
}

/// Public directory search, best rated first.
pub async fn search(
    db: &DatabaseConnection,
    query: &TechnicianSearchQuery,
    page: u64,
    limit: u64,
) -> Result<Vec<(technician_profiles::Model, Option<users::Model>)>, DbErr> {
    let mut select = technician_profiles::Entity::find();

    if let Some(category) = query.category {
        select = select.filter(technician_profiles::Column::Category.eq(category));
    }
    if let Some(city) = query.city.as_deref().filter(|c| !c.trim().is_empty()) {
        select = select.filter(technician_profiles::Column::City.eq(normalize_city(city)));
    }
    if let Some(min_rating) = query.min_rating {
        select = select.filter(technician_profiles::Column::AverageRating.gte(min_rating));
    }
    if let Some(online) = query.online {
        select = select.filter(technician_profiles::Column::IsOnline.eq(online));
    }
    if query.verified.unwrap_or(true) {
        select = select.filter(
            technician_profiles::Column::VerificationStatus.eq(VerificationStatus::Verified),
        );
    }

    select
        .order_by_desc(technician_profiles::Column::AverageRating)
        .order_by_desc(technician_profiles::Column::ReviewCount)
        .order_by_asc(technician_profiles::Column::CreatedAt)
        .offset(page_offset(page, limit))
        .limit(limit)
        .find_also_related(users::Entity)
        .all(db)
        .await
}

/// Verified, online technicians of a category: the candidate pool for an
/// availability check before schedules are considered.
pub async fn find_candidates(
    db: &DatabaseConnection,
    category: ServiceCategory,
    city: Option<&str>,
) -> Result<Vec<(technician_profiles::Model, Option<users::Model>)>, DbErr> {
    let mut select = technician_profiles::Entity::find()
        .filter(technician_profiles::Column::Category.eq(category))
        .filter(technician_profiles::Column::VerificationStatus.eq(VerificationStatus::Verified))
        .filter(technician_profiles::Column::IsOnline.eq(true));

    if let Some(city) = city.filter(|c| !c.trim().is_empty()) {
        select = select.filter(technician_profiles::Column::City.eq(normalize_city(city)));
    }

    select
        .order_by_desc(technician_profiles::Column::AverageRating)
        .find_also_related(users::Entity)
        .all(db)
        .await
}

/// Admin listing, oldest first so the verification queue is worked in order.
pub async fn list_by_verification(
    db: &DatabaseConnection,
    status: Option<VerificationStatus>,
    page: u64,
    limit: u64,
) -> Result<Vec<(technician_profiles::Model, Option<users::Model>)>, DbErr> {
    let mut select = technician_profiles::Entity::find();
    if let Some(status) = status {
        select = select.filter(technician_profiles::Column::VerificationStatus.eq(status));
    }

    select
        .order_by_asc(technician_profiles::Column::CreatedAt)
        .offset(page_offset(page, limit))
        .limit(limit)
        .find_also_related(users::Entity)
        .all(db)
        .await
}

/// Overwrite the denormalised rating figures on a technician's profile.
pub async fn update_rating<C: ConnectionTrait>(
    db: &C,
    technician_user_id: Uuid,
    average_rating: f64,
    review_count: i32,
) -> Result<(), DbErr> {
    technician_profiles::Entity::update_many()
        .set(technician_profiles::ActiveModel {
            average_rating: Set(average_rating),
            review_count: Set(review_count),
            updated_at: Set(Some(chrono::Utc::now())),
            ..Default::default()
        })
        .filter(technician_profiles::Column::UserId.eq(technician_user_id))
        .exec(db)
        .await?;

    Ok(())
}
