use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use validator::Validate;

use crate::auth::middleware::AuthenticatedUser;
use crate::cache::AppCache;
use crate::db::{technicians as technician_db, users};
use crate::errors::{AppError, AppResult};
use crate::handlers::technicians::invalidate_owner_card;
use crate::models::users::{CompleteProfile, Roles, UserResponse};

/// GET /api/auth/me
pub async fn me(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(UserResponse::from(user.0))
}

/// POST /api/auth/complete-profile
///
/// Sets name, phone and avatar after first login, and lets the user pick
/// between the client and technician roles. Admin can't be self-assigned,
/// and a user with a technician profile keeps the technician role.
pub async fn complete_profile(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<AppCache>,
    body: web::Json<CompleteProfile>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    input.validate()?;

    if input.role == Some(Roles::Admin) && !user.is_admin() {
        return Err(AppError::Forbidden(
            "The admin role cannot be self-assigned".to_string(),
        ));
    }

    if let Some(role) = input.role.filter(|r| *r != user.role()) {
        if technician_db::get_profile_by_user_id(db.get_ref(), user.id())
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Accounts with a technician profile cannot switch to the {role:?} role"
            )));
        }
    }

    let updated = users::complete_profile(db.get_ref(), user.id(), input).await?;
    invalidate_owner_card(db.get_ref(), cache.get_ref(), user.id()).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(updated)))
}
