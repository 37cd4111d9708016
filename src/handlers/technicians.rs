use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthenticatedUser;
use crate::cache::{AppCache, keys};
use crate::db::{bookings as booking_db, reviews as review_db, subscriptions as subscription_db};
use crate::db::technicians as technician_db;
use crate::domain::availability::{Slot, normalize_duration, slot_is_free};
use crate::domain::subscription_gate::check_can_accept;
use crate::errors::{AppError, AppResult};
use crate::models::PaginationQuery;
use crate::models::technician_profiles::{
    AvailabilityQuery, CreateTechnicianProfile, TechnicianResponse, TechnicianSearchQuery,
    UpdateOnlineStatus, UpdateTechnicianProfile,
};
use crate::uploads::UploadStore;

/// Drop the cached card of `user_id`'s technician profile, if they have one.
/// Cards embed the owner's name, phone and avatar.
pub(crate) async fn invalidate_owner_card(
    db: &DatabaseConnection,
    cache: &AppCache,
    user_id: Uuid,
) -> AppResult<()> {
    if !cache.is_enabled() {
        return Ok(());
    }
    if let Some(profile) = technician_db::get_profile_by_user_id(db, user_id).await? {
        cache.invalidate_technician(&profile.id.to_string()).await;
    }
    Ok(())
}

/// POST /api/technicians/profile
///
/// Creates the caller's technician profile and switches their role to
/// technician. The profile starts unverified.
pub async fn create_profile(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    body: web::Json<CreateTechnicianProfile>,
) -> AppResult<HttpResponse> {
    if user.is_admin() {
        return Err(AppError::Forbidden(
            "Admins cannot register as technicians".to_string(),
        ));
    }

    let input = body.into_inner();
    input.validate()?;

    if technician_db::get_profile_by_user_id(db.get_ref(), user.id())
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "You already have a technician profile".to_string(),
        ));
    }

    let profile = technician_db::insert_profile(db.get_ref(), user.id(), input).await?;
    tracing::info!(user_id = %user.id(), profile_id = %profile.id, "Technician profile created");

    Ok(HttpResponse::Created().json(TechnicianResponse::from_parts(profile, Some(&user.0))))
}

/// GET /api/technicians/profile
pub async fn get_own_profile(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> AppResult<HttpResponse> {
    let profile = technician_db::get_profile_by_user_id(db.get_ref(), user.id())
        .await?
        .ok_or_else(|| AppError::NotFound("You don't have a technician profile".to_string()))?;

    Ok(HttpResponse::Ok().json(TechnicianResponse::from_parts(profile, Some(&user.0))))
}

/// PUT /api/technicians/profile
pub async fn update_own_profile(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<AppCache>,
    body: web::Json<UpdateTechnicianProfile>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    input.validate()?;

    let profile = technician_db::update_profile(db.get_ref(), user.id(), input).await?;
    cache.invalidate_technician(&profile.id.to_string()).await;

    Ok(HttpResponse::Ok().json(TechnicianResponse::from_parts(profile, Some(&user.0))))
}

/// PUT /api/technicians/profile/online
pub async fn set_online(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<AppCache>,
    body: web::Json<UpdateOnlineStatus>,
) -> AppResult<HttpResponse> {
    let profile = technician_db::set_online(db.get_ref(), user.id(), body.is_online).await?;
    cache.invalidate_technician(&profile.id.to_string()).await;
    tracing::info!(profile_id = %profile.id, is_online = profile.is_online, "Technician availability toggled");

    Ok(HttpResponse::Ok().json(TechnicianResponse::from_parts(profile, Some(&user.0))))
}

/// POST /api/technicians/profile/document (multipart, field `file`)
pub async fn upload_document(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<AppCache>,
    store: web::Data<UploadStore>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    if technician_db::get_profile_by_user_id(db.get_ref(), user.id())
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(
            "Create a technician profile before uploading documents".to_string(),
        ));
    }

    let file = store.read_file(payload).await?;
    let url = store.save("documents", file).await?;

    let profile = technician_db::set_document_url(db.get_ref(), user.id(), url).await?;
    cache.invalidate_technician(&profile.id.to_string()).await;

    Ok(HttpResponse::Ok().json(TechnicianResponse::from_parts(profile, Some(&user.0))))
}

/// GET /api/technicians
///
/// Public directory. Only verified technicians unless `verified=false`.
pub async fn search_technicians(
    _user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<AppCache>,
    query: web::Query<TechnicianSearchQuery>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let paging = PaginationQuery {
        page: query.page,
        limit: query.limit,
    };
    let cache_key = keys::technician_search(&query.cache_fragment());

    if let Some(cached) = cache.get::<Vec<TechnicianResponse>>(&cache_key).await {
        return Ok(HttpResponse::Ok().json(cached));
    }

    let rows = technician_db::search(db.get_ref(), &query, paging.page(), paging.limit()).await?;
    let technicians: Vec<TechnicianResponse> = rows
        .into_iter()
        .map(|(profile, owner)| TechnicianResponse::from_parts(profile, owner.as_ref()))
        .collect();

    cache
        .set(&cache_key, &technicians, cache.config.technician_search_ttl)
        .await;

    Ok(HttpResponse::Ok().json(technicians))
}

/// GET /api/technicians/available
///
/// Verified, online technicians of a category who could take a job at
/// `scheduled_at`: their subscription lets them accept and the slot is free.
pub async fn available_technicians(
    _user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    query: web::Query<AvailabilityQuery>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let duration = normalize_duration(query.duration_minutes)
        .map_err(|msg| AppError::validation("duration_minutes", msg))?;
    let slot = Slot::new(query.scheduled_at, duration);
    let now = chrono::Utc::now();

    let candidates =
        technician_db::find_candidates(db.get_ref(), query.category, query.city.as_deref())
            .await?;

    let ids: Vec<Uuid> = candidates.iter().map(|(p, _)| p.user_id).collect();
    let schedules =
        booking_db::blocking_bookings_for_many(db.get_ref(), ids, slot.start, slot.end).await?;

    let mut available = Vec::new();
    for (profile, owner) in candidates {
        let subscriptions = subscription_db::list_for_technician(db.get_ref(), profile.user_id).await?;
        if check_can_accept(&subscriptions, now).is_err() {
            continue;
        }

        let booked = schedules
            .get(&profile.user_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if !slot_is_free(booked, slot, None) {
            continue;
        }

        available.push(TechnicianResponse::from_parts(profile, owner.as_ref()));
    }

    Ok(HttpResponse::Ok().json(available))
}

/// GET /api/technicians/{id}
pub async fn get_technician(
    _user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<AppCache>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let cache_key = keys::technician(&id.to_string());

    if let Some(cached) = cache.get::<TechnicianResponse>(&cache_key).await {
        return Ok(HttpResponse::Ok().json(cached));
    }

    let (profile, owner) = technician_db::get_profile_with_user(db.get_ref(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Technician {id} not found")))?;

    let response = TechnicianResponse::from_parts(profile, owner.as_ref());
    cache
        .set(&cache_key, &response, cache.config.technician_ttl)
        .await;

    Ok(HttpResponse::Ok().json(response))
}

/// GET /api/technicians/{id}/reviews
pub async fn get_technician_reviews(
    _user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
    query: web::Query<PaginationQuery>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let profile = technician_db::get_profile_by_id(db.get_ref(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Technician {id} not found")))?;

    let reviews = review_db::get_reviews_for_technician(
        db.get_ref(),
        profile.user_id,
        query.page(),
        query.limit(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(reviews))
}
