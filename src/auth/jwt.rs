use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwks::JwksCache;

/// JWT claims issued by the identity provider (or minted with the shared secret).
///
/// `sub` is the user's UUID; it becomes the primary key of the `users` row.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The user UUID.
    pub sub: String,
    /// Token expiration (Unix timestamp).
    pub exp: usize,
    /// Token issued-at (Unix timestamp).
    pub iat: Option<usize>,
    pub iss: Option<String>,
    pub email: Option<String>,
    /// Provider role (e.g. "authenticated"); marketplace roles live in the database.
    pub role: Option<String>,
    /// Metadata from the OAuth provider.
    pub user_metadata: Option<UserMetadata>,
}

/// Profile fields some providers nest under `user_metadata`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserMetadata {
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub picture: Option<String>,
    pub email: Option<String>,
    pub provider: Option<String>,
}

impl Claims {
    /// Extract the user UUID from the `sub` claim.
    pub fn user_id(&self) -> Result<Uuid, String> {
        Uuid::parse_str(&self.sub).map_err(|e| format!("Invalid UUID in sub claim: {e}"))
    }

    /// Best-effort display name from metadata.
    pub fn display_name(&self) -> Option<String> {
        self.user_metadata
            .as_ref()
            .and_then(|m| m.full_name.clone().or_else(|| m.name.clone()))
    }

    /// Best-effort avatar URL from metadata.
    pub fn avatar_url(&self) -> Option<String> {
        self.user_metadata
            .as_ref()
            .and_then(|m| m.avatar_url.clone().or_else(|| m.picture.clone()))
    }

    /// Best-effort email: prefer top-level, fall back to metadata.
    pub fn user_email(&self) -> Option<String> {
        self.email
            .clone()
            .or_else(|| self.user_metadata.as_ref().and_then(|m| m.email.clone()))
    }

    pub fn auth_provider(&self) -> String {
        self.user_metadata
            .as_ref()
            .and_then(|m| m.provider.clone())
            .unwrap_or_else(|| "password".to_string())
    }
}

/// Validate an HS256 token signed with the shared secret.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|td| td.claims)
    .map_err(|e| format!("Token validation failed: {:?}", e.kind()))
}

/// Picks the verification path per token: tokens carrying a `kid` header are
/// checked against the provider's JWKS, the rest against the shared secret.
#[derive(Clone)]
pub struct TokenValidator {
    secret: Option<String>,
    jwks: Option<Arc<JwksCache>>,
}

impl TokenValidator {
    pub fn new(secret: Option<String>, jwks: Option<JwksCache>) -> Self {
        Self {
            secret,
            jwks: jwks.map(Arc::new),
        }
    }

    pub fn with_secret(secret: &str) -> Self {
        Self::new(Some(secret.to_string()), None)
    }

    pub async fn validate(&self, token: &str) -> Result<Claims, String> {
        let header = decode_header(token).map_err(|e| format!("Failed to decode header: {e}"))?;

        match (&header.kid, &self.jwks, &self.secret) {
            (Some(_), Some(jwks), _) => jwks.validate_token(token).await.map(|td| td.claims),
            (_, _, Some(secret)) if header.alg == Algorithm::HS256 => {
                validate_token(token, secret)
            }
            _ => Err(format!(
                "No verifier configured for {:?} tokens",
                header.alg
            )),
        }
    }
}
