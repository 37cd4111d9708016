use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use uuid::Uuid;
use validator::Validate;

use crate::auth::authorization::verify_self_or_admin;
use crate::auth::middleware::AuthenticatedUser;
use crate::cache::AppCache;
use crate::db::users;
use crate::errors::{AppError, AppResult};
use crate::handlers::technicians::invalidate_owner_card;
use crate::models::users::{UpdateUser, UserResponse};

/// GET /api/users/{id}
pub async fn get_user(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    verify_self_or_admin(&user, id)?;

    let found = users::get_user_by_id(db.get_ref(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))?;

    Ok(HttpResponse::Ok().json(UserResponse::from(found)))
}

/// PUT /api/users/{id}
pub async fn update_user(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<AppCache>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateUser>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    verify_self_or_admin(&user, id)?;

    let input = body.into_inner();
    input.validate()?;

    let updated = users::update_user(db.get_ref(), id, input).await?;
    invalidate_owner_card(db.get_ref(), cache.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(updated)))
}
