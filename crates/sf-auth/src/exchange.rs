//! Token endpoint client
//!
//! Form-urlencoded POSTs against the provider's `/oauth2/token` and
//! `/oauth2/revoke` endpoints: authorization-code exchange, refresh-token
//! grant, and best-effort revocation on logout. Failures are terminal for the
//! enclosing operation; no retry loop lives here.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sf_config::AuthConfig;
use sf_types::{AppError, AppResult};
use std::collections::HashMap;
use tracing::{error, info};

/// Token response from the provider
///
/// The refresh token is only issued on the authorization-code grant; refresh
/// responses re-mint the access and identity tokens without one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token for API requests
    pub access_token: String,

    /// Identity token carrying the user's profile claims
    pub id_token: String,

    /// Refresh token (authorization-code grant only)
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Token type (usually "Bearer")
    #[serde(default)]
    pub token_type: String,

    /// Token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Operations against the provider's token endpoints
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange an authorization code (with its PKCE verifier) for tokens
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> AppResult<TokenResponse>;

    /// Trade a refresh token for a fresh credential pair
    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse>;

    /// Revoke a refresh token; the response body is empty on success
    async fn revoke(&self, token: &str) -> AppResult<()>;
}

/// HTTP implementation against the configured hosted UI domain
pub struct HttpTokenEndpoint {
    http: Client,
    config: AuthConfig,
}

impl HttpTokenEndpoint {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    async fn post_token_request(
        &self,
        params: HashMap<String, String>,
        operation: &str,
    ) -> AppResult<TokenResponse> {
        let response = self
            .http
            .post(self.config.token_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::OAuthFlow(format!("Failed to send {} request: {}", operation, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("{} failed with status {}: {}", operation, status, body);
            return Err(AppError::OAuthFlow(format!(
                "{} failed with status {}",
                operation, status
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AppError::OAuthFlow(format!("Failed to parse {} response: {}", operation, e)))
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> AppResult<TokenResponse> {
        info!("Exchanging authorization code for tokens");

        let mut params = HashMap::new();
        params.insert("grant_type".to_string(), "authorization_code".to_string());
        params.insert("client_id".to_string(), self.config.client_id.clone());
        params.insert("code".to_string(), code.to_string());
        params.insert("redirect_uri".to_string(), self.config.redirect_uri());
        params.insert("code_verifier".to_string(), code_verifier.to_string());

        let tokens = self.post_token_request(params, "Token exchange").await?;
        info!("Token exchange successful");
        Ok(tokens)
    }

    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        info!("Refreshing tokens");

        let mut params = HashMap::new();
        params.insert("grant_type".to_string(), "refresh_token".to_string());
        params.insert("client_id".to_string(), self.config.client_id.clone());
        params.insert("refresh_token".to_string(), refresh_token.to_string());

        let tokens = self.post_token_request(params, "Token refresh").await?;
        info!("Token refresh successful");
        Ok(tokens)
    }

    async fn revoke(&self, token: &str) -> AppResult<()> {
        info!("Revoking refresh token");

        let mut params = HashMap::new();
        params.insert("client_id".to_string(), self.config.client_id.clone());
        params.insert("token".to_string(), token.to_string());

        let response = self
            .http
            .post(self.config.revoke_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::OAuthFlow(format!("Failed to send revoke request: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::OAuthFlow(format!(
                "Revocation failed with status {}",
                response.status()
            )));
        }

        Ok(())
    }
}
