use actix_web::FromRequest;
use actix_web::http::header::Header;
use actix_web::{Error, HttpRequest, dev::Payload, web};
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};
use sea_orm::DatabaseConnection;
use std::future::Future;
use std::pin::Pin;

use crate::auth::jwt::TokenValidator;
use crate::db::users::find_or_create_from_auth;
use crate::errors::AppError;
use crate::models::users::{self, CreateUserFromAuth, Roles};

/// The caller, resolved from the bearer token to a `users` row.
///
/// First-time callers are provisioned as clients.
pub struct AuthenticatedUser(pub users::Model);

impl AuthenticatedUser {
    pub fn id(&self) -> uuid::Uuid {
        self.0.id
    }

    pub fn role(&self) -> Roles {
        self.0.role
    }

    pub fn is_admin(&self) -> bool {
        self.0.role == Roles::Admin
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            // 1. Extract the Bearer token from the Authorization header.
            let token = Authorization::<Bearer>::parse(&req)
                .map_err(|_| {
                    AppError::Unauthorized(
                        "Authorization header must be: Bearer <token>".to_string(),
                    )
                })?
                .into_scheme()
                .token()
                .to_string();

            // 2. Validate the token.
            let validator = req.app_data::<web::Data<TokenValidator>>().ok_or_else(|| {
                AppError::Internal("Token validator not configured".to_string())
            })?;

            let claims = validator
                .validate(&token)
                .await
                .map_err(|e| AppError::Unauthorized(format!("Invalid token: {e}")))?;

            // 3. Extract user info from claims.
            let user_id = claims.user_id().map_err(AppError::Unauthorized)?;

            let email = claims
                .user_email()
                .ok_or_else(|| AppError::Unauthorized("No email in token claims".to_string()))?;

            // 4. Find or create the user.
            let db = req
                .app_data::<web::Data<DatabaseConnection>>()
                .ok_or_else(|| AppError::Internal("Database not configured".to_string()))?;

            let user = find_or_create_from_auth(
                db.get_ref(),
                CreateUserFromAuth {
                    id: user_id,
                    email,
                    full_name: claims.display_name(),
                    avatar_url: claims.avatar_url(),
                    auth_provider: claims.auth_provider(),
                    role: Roles::Client,
                },
            )
            .await
            .map_err(AppError::from)?;

            if !user.is_active {
                return Err(AppError::Forbidden("This account has been deactivated".to_string()).into());
            }

            Ok(AuthenticatedUser(user))
        })
    }
}
