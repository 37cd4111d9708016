use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::cache::CacheConfig;
use crate::domain::plans::PlanCatalogue;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("either JWT_SECRET or AUTH_JWKS_URL must be set")]
    NoTokenVerifier,
}

/// Runtime configuration, read once at startup from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub redis_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub jwks_url: Option<String>,
    pub auth_api_key: Option<String>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub run_migrations: bool,
    pub plans: PlanCatalogue,
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = required("DATABASE_URL")?;
        let jwt_secret = optional("JWT_SECRET");
        let jwks_url = optional("AUTH_JWKS_URL");
        if jwt_secret.is_none() && jwks_url.is_none() {
            return Err(ConfigError::NoTokenVerifier);
        }

        Ok(Self {
            database_url,
            port: parsed("PORT", 8080)?,
            redis_url: optional("REDIS_URL"),
            jwt_secret,
            jwks_url,
            auth_api_key: optional("AUTH_API_KEY"),
            upload_dir: optional("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./uploads")),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
            run_migrations: parsed("RUN_MIGRATIONS", true)?,
            plans: PlanCatalogue {
                trial_days: parsed("TRIAL_DAYS", 14)?,
                trial_booking_quota: parsed("TRIAL_BOOKING_QUOTA", 3)?,
                currency: optional("SUBSCRIPTION_CURRENCY").unwrap_or_else(|| "XOF".to_string()),
            },
            cache: CacheConfig::from_env(),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

/// Unset and empty variables are both treated as absent.
fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
