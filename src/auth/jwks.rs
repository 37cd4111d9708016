use jsonwebtoken::{Algorithm, DecodingKey, TokenData, Validation, decode, decode_header};
use moka::future::Cache;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
enum KeyMaterial {
    Ec { x: String, y: String },
    Rsa { n: String, e: String },
}

/// Public key from the provider's JWKS document.
#[derive(Clone)]
struct JwkKey {
    material: KeyMaterial,
    algorithm: Algorithm,
}

#[derive(Clone)]
pub struct JwksCache {
    cache: Arc<Cache<String, JwkKey>>,
    jwks_url: String,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl JwksCache {
    /// `api_key` is sent as the `apikey` header when the provider requires one.
    pub fn new(jwks_url: &str, api_key: Option<&str>) -> Self {
        let client = reqwest::Client::new();
        let cache = Arc::new(
            Cache::builder()
                .time_to_live(std::time::Duration::from_secs(3600))
                .max_capacity(10)
                .build(),
        );

        Self {
            cache,
            jwks_url: jwks_url.to_string(),
            client,
            api_key: api_key.map(str::to_string),
        }
    }

    async fn fetch_jwks(&self) -> Result<serde_json::Value, String> {
        debug!("Fetching JWKS from {}", self.jwks_url);

        let mut request = self.client.get(&self.jwks_url);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let response: reqwest::Response = request
            .send()
            .await
            .map_err(|e| format!("Failed to fetch JWKS: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("Failed to fetch JWKS: HTTP {status}"));
        }

        let text = response
            .text()
            .await
            .map_err(|e| format!("Failed to get JWKS text: {e}"))?;

        serde_json::from_str(&text).map_err(|e| format!("Failed to parse JWKS JSON: {e}"))
    }

    async fn get_key(&self, kid: &str) -> Result<JwkKey, String> {
        if let Some(cached) = self.cache.get(kid).await {
            return Ok(cached);
        }

        let jwks = self.fetch_jwks().await?;
        let keys = jwks["keys"].as_array().ok_or("No keys in JWKS")?;

        let jwk = keys
            .iter()
            .find(|k| k["kid"].as_str() == Some(kid))
            .ok_or(format!("Key with kid={kid} not found in JWKS"))?;

        let key = JwkKey::from_jwk(jwk)?;

        self.cache.insert(kid.to_string(), key.clone()).await;
        Ok(key)
    }

    pub async fn validate_token(
        &self,
        token: &str,
    ) -> Result<TokenData<super::jwt::Claims>, String> {
        let header = decode_header(token).map_err(|e| format!("Failed to decode header: {e}"))?;
        let kid = header.kid.ok_or("No 'kid' in token header")?;

        let key = self.get_key(&kid).await?;
        let decoding_key = key.decoding_key()?;

        let mut validation = Validation::new(key.algorithm);
        validation.validate_aud = false;

        decode::<super::jwt::Claims>(token, &decoding_key, &validation)
            .map_err(|e| format!("Token validation failed: {e}"))
    }
}

impl JwkKey {
    fn from_jwk(jwk: &serde_json::Value) -> Result<Self, String> {
        let field = |name: &str| -> Result<String, String> {
            jwk[name]
                .as_str()
                .map(str::to_string)
                .ok_or(format!("Missing '{name}' in JWK"))
        };

        match jwk["kty"].as_str() {
            Some("EC") => {
                let algorithm = match jwk["alg"].as_str().unwrap_or("ES256") {
                    "ES384" => Algorithm::ES384,
                    _ => Algorithm::ES256,
                };
                Ok(Self {
                    material: KeyMaterial::Ec {
                        x: field("x")?,
                        y: field("y")?,
                    },
                    algorithm,
                })
            }
            Some("RSA") => {
                let algorithm = match jwk["alg"].as_str().unwrap_or("RS256") {
                    "RS384" => Algorithm::RS384,
                    "RS512" => Algorithm::RS512,
                    _ => Algorithm::RS256,
                };
                Ok(Self {
                    material: KeyMaterial::Rsa {
                        n: field("n")?,
                        e: field("e")?,
                    },
                    algorithm,
                })
            }
            other => Err(format!("Unsupported JWK key type: {other:?}")),
        }
    }

    fn decoding_key(&self) -> Result<DecodingKey, String> {
        match &self.material {
            KeyMaterial::Ec { x, y } => DecodingKey::from_ec_components(x, y),
            KeyMaterial::Rsa { n, e } => DecodingKey::from_rsa_components(n, e),
        }
        .map_err(|e| format!("Failed to create decoding key: {e}"))
    }
}
