//! Provider signing-key set
//!
//! The key set is fetched fresh for every validation: no cache, no stale
//! fallback. A fetch or parse failure propagates as an error and the
//! validator treats it as a failed validation, never as a crash.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sf_config::AuthConfig;
use sf_types::{AppError, AppResult};
use tracing::debug;

/// A single published signing key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key ID
    pub kid: String,

    /// Algorithm
    pub alg: String,

    /// Key type
    pub kty: String,

    /// RSA public exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// RSA modulus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// Public key use ((sig)nature or (enc)ryption)
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
}

/// The provider's current key set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    pub keys: Vec<Jwk>,
}

impl KeySet {
    /// Providers rotate among several key pairs, so membership is checked
    /// across all of them
    pub fn contains_kid(&self, kid: &str) -> bool {
        self.keys.iter().any(|key| key.kid == kid)
    }
}

/// Source of the provider's current key set
#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self) -> AppResult<KeySet>;
}

/// HTTP key-set client against the issuer's well-known location
pub struct JwksClient {
    http: reqwest::Client,
    url: String,
}

impl JwksClient {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.jwks_endpoint(),
        }
    }
}

#[async_trait]
impl KeySetSource for JwksClient {
    async fn fetch(&self) -> AppResult<KeySet> {
        debug!("Fetching key set from {}", self.url);

        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AppError::Jwks(format!("Failed to fetch key set: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Jwks(format!(
                "Key set fetch failed with status {}",
                response.status()
            )));
        }

        response
            .json::<KeySet>()
            .await
            .map_err(|e| AppError::Jwks(format!("Failed to parse key set: {}", e)))
    }
}
