use redis::{aio::ConnectionManager, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    pub async fn new(redis_url: &str) -> Result<Self, RedisError> {
        let client = Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }

    /// Get a value from cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> redis::RedisResult<Option<T>> {
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.connection.clone())
            .await?;

        match value {
            Some(v) => {
                let deserialized = serde_json::from_str(&v).map_err(|e| {
                    redis::RedisError::from((
                        redis::ErrorKind::TypeError,
                        "Deserialization error",
                        e.to_string(),
                    ))
                })?;
                Ok(Some(deserialized))
            }
            None => Ok(None),
        }
    }

    /// Set a value in cache with a TTL
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> redis::RedisResult<()> {
        let serialized = serde_json::to_string(value).map_err(|e| {
            redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "Serialization error",
                e.to_string(),
            ))
        })?;

        redis::cmd("SET")
            .arg(key)
            .arg(serialized)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut self.connection.clone())
            .await
    }

    /// Delete a key from cache
    pub async fn delete(&self, key: &str) -> redis::RedisResult<()> {
        redis::cmd("DEL")
            .arg(key)
            .query_async(&mut self.connection.clone())
            .await
    }

    /// Delete multiple keys matching a pattern
    pub async fn delete_pattern(&self, pattern: &str) -> redis::RedisResult<()> {
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(pattern)
            .query_async(&mut self.connection.clone())
            .await?;

        if !keys.is_empty() {
            let _: () = redis::cmd("DEL")
                .arg(&keys)
                .query_async(&mut self.connection.clone())
                .await?;
        }

        Ok(())
    }
}

/// Optional cache handle shared through actix app data.
///
/// Every operation degrades to a no-op when Redis isn't configured, and
/// Redis failures are logged and treated as misses.
#[derive(Clone, Default)]
pub struct AppCache {
    inner: Option<Arc<RedisCache>>,
    pub config: CacheConfig,
}

impl AppCache {
    pub fn new(redis: Option<RedisCache>, config: CacheConfig) -> Self {
        Self {
            inner: redis.map(Arc::new),
            config,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let redis = self.inner.as_ref()?;
        match redis.get::<T>(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Cache error on GET {key}: {e}");
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        if let Some(redis) = &self.inner {
            if let Err(e) = redis.set(key, value, ttl).await {
                tracing::warn!("Cache error on SET {key}: {e}");
            }
        }
    }

    /// Drop everything cached about one technician, plus all search pages.
    pub async fn invalidate_technician(&self, profile_id: &str) {
        if let Some(redis) = &self.inner {
            if let Err(e) = redis.delete(&keys::technician(profile_id)).await {
                tracing::warn!("Cache error on DEL technician {profile_id}: {e}");
            }
            if let Err(e) = redis.delete_pattern(keys::TECHNICIAN_SEARCH_PATTERN).await {
                tracing::warn!("Cache error on technician search invalidation: {e}");
            }
        }
    }
}

/// Cache key generators
pub mod keys {
    pub const TECHNICIAN_SEARCH_PATTERN: &str = "technicians:search:*";

    /// Generate key for a technician search page
    pub fn technician_search(filters: &str) -> String {
        format!("technicians:search:{}", filters)
    }

    /// Generate key for a single technician profile
    pub fn technician(profile_id: &str) -> String {
        format!("technician:{}", profile_id)
    }
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub technician_search_ttl: Duration,
    pub technician_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            technician_search_ttl: Duration::from_secs(120), // 2 minutes
            technician_ttl: Duration::from_secs(600),        // 10 minutes
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            technician_search_ttl: parse_duration_secs("CACHE_TTL_TECHNICIANS", 120),
            technician_ttl: parse_duration_secs("CACHE_TTL_TECHNICIAN_DETAIL", 600),
        }
    }
}

fn parse_duration_secs(env_var: &str, default: u64) -> Duration {
    std::env::var(env_var)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default))
}
