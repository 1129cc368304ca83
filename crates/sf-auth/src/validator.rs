//! Claims validation for stored tokens
//!
//! Before a stored token is trusted (e.g. ahead of a profile or
//! account-deletion action), it runs through a fixed sequence of checks. The
//! first failing check decides the outcome; there is no partial validity and
//! no best-effort acceptance. The result is a plain boolean; the reasons are
//! logged for operators but never surfaced structurally, so callers can only
//! react by refreshing or signing the user out.
//!
//! Check order follows the provider's verification guide: structure, key-set
//! membership, expiry, issuer, then the per-kind claims.

use crate::jwks::KeySetSource;
use crate::jwt::{self, TokenClaims};
use sf_config::AuthConfig;
use std::sync::Arc;
use tracing::{debug, warn};

/// Stateless token validator
///
/// Fetches the key set fresh on every call (failing closed when the fetch
/// fails) and compares claims against the configured issuer and client.
pub struct ClaimsValidator {
    client_id: String,
    issuer_url: String,
    keys: Arc<dyn KeySetSource>,
}

impl ClaimsValidator {
    pub fn new(config: &AuthConfig, keys: Arc<dyn KeySetSource>) -> Self {
        Self {
            client_id: config.client_id.clone(),
            issuer_url: config.issuer_url.clone(),
            keys,
        }
    }

    /// Validate a token against the current wall clock
    ///
    /// `expected_nonce` is the nonce on record for the active sign-in
    /// attempt, if any; identity tokens must echo it when one is on record.
    pub async fn validate(&self, token: &str, expected_nonce: Option<&str>) -> bool {
        self.validate_at(token, expected_nonce, chrono::Utc::now().timestamp())
            .await
    }

    /// Validate a token as of `now_secs` (seconds since the Unix epoch)
    pub async fn validate_at(
        &self,
        token: &str,
        expected_nonce: Option<&str>,
        now_secs: i64,
    ) -> bool {
        // 1. Structure
        let Some(decoded) = jwt::decode(token) else {
            warn!("Rejecting token: missing or malformed JWT");
            return false;
        };

        // 2. Key-set membership; an unreachable key set fails closed
        let key_set = match self.keys.fetch().await {
            Ok(key_set) => key_set,
            Err(e) => {
                warn!("Rejecting token: key set unavailable: {}", e);
                return false;
            }
        };

        let Some(kid) = decoded.header.kid.as_deref() else {
            warn!("Rejecting token: header carries no key ID");
            return false;
        };

        if !key_set.contains_kid(kid) {
            warn!(
                "Rejecting token: key ID {} is not in the provider's key set",
                kid
            );
            return false;
        }

        // 3. Expiry; claim values are in seconds
        let Some(exp) = decoded.claims.exp else {
            warn!("Rejecting token: no expiration claim");
            return false;
        };

        if now_secs >= exp {
            warn!("Rejecting token: expired at {} (now {})", exp, now_secs);
            return false;
        }

        // 4. Issuer
        if decoded.claims.iss.as_deref() != Some(self.issuer_url.as_str()) {
            warn!(
                "Rejecting token: issuer mismatch (expected {}, received {:?})",
                self.issuer_url, decoded.claims.iss
            );
            return false;
        }

        // 5.-7. Token kind and per-kind claims. The kind is discriminated on
        // `token_use` first; the presence of `client_id`/`aud` is only a
        // cross-check, since a token could in principle carry both fields.
        let valid = match decoded.claims.token_use.as_deref() {
            Some("access") => self.check_access_claims(&decoded.claims),
            Some("id") => self.check_id_claims(&decoded.claims, expected_nonce),
            other => {
                warn!(
                    "Rejecting token: token_use is neither access nor id (received {:?})",
                    other
                );
                false
            }
        };

        if valid {
            debug!("Token accepted (kid {})", kid);
        }
        valid
    }

    fn check_access_claims(&self, claims: &TokenClaims) -> bool {
        match claims.client_id.as_deref() {
            None => {
                warn!("Rejecting access token: no client_id claim");
                false
            }
            Some(client_id) if client_id != self.client_id => {
                warn!(
                    "Rejecting access token: client ID mismatch (expected {}, received {})",
                    self.client_id, client_id
                );
                false
            }
            Some(_) => true,
        }
    }

    fn check_id_claims(&self, claims: &TokenClaims, expected_nonce: Option<&str>) -> bool {
        match claims.aud.as_deref() {
            None => {
                warn!("Rejecting identity token: no aud claim");
                return false;
            }
            Some(aud) if aud != self.client_id => {
                warn!(
                    "Rejecting identity token: audience mismatch (expected {}, received {})",
                    self.client_id, aud
                );
                return false;
            }
            Some(_) => {}
        }

        // Only enforced while a sign-in attempt has a nonce on record; a
        // token validated in a later session has nothing to compare against
        if let Some(expected) = expected_nonce {
            if claims.nonce.as_deref() != Some(expected) {
                warn!(
                    "Rejecting identity token: nonce mismatch (received {:?})",
                    claims.nonce
                );
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwks::{Jwk, KeySet};
    use crate::jwt::{encode, TokenHeader};
    use async_trait::async_trait;
    use sf_types::{AppError, AppResult};

    const CLIENT_ID: &str = "7mqvhnrmc8kkg4ha572stgv14k";
    const ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_9VUkicRKi";
    const KID: &str = "j3LqjGP+MGBEFFq/oVthk8Di/WWTFwxVS+mVunBNwMI=";
    const NOW: i64 = 1_000_000_000;

    struct FixedKeys(KeySet);

    #[async_trait]
    impl KeySetSource for FixedKeys {
        async fn fetch(&self) -> AppResult<KeySet> {
            Ok(self.0.clone())
        }
    }

    struct UnreachableKeys;

    #[async_trait]
    impl KeySetSource for UnreachableKeys {
        async fn fetch(&self) -> AppResult<KeySet> {
            Err(AppError::Jwks("connection refused".to_string()))
        }
    }

    fn provider_keys() -> KeySet {
        KeySet {
            keys: vec![Jwk {
                kid: KID.to_string(),
                alg: "RS256".to_string(),
                kty: "RSA".to_string(),
                e: Some("AQAB".to_string()),
                n: Some("modulus".to_string()),
                key_use: Some("sig".to_string()),
            }],
        }
    }

    fn validator_with(keys: Arc<dyn KeySetSource>) -> ClaimsValidator {
        let config = AuthConfig {
            client_id: CLIENT_ID.to_string(),
            hosted_ui_url: "https://my-shop.auth.us-east-1.amazoncognito.com".to_string(),
            issuer_url: ISSUER.to_string(),
            ..AuthConfig::default()
        };
        ClaimsValidator::new(&config, keys)
    }

    fn validator() -> ClaimsValidator {
        validator_with(Arc::new(FixedKeys(provider_keys())))
    }

    fn header() -> TokenHeader {
        TokenHeader {
            kid: Some(KID.to_string()),
            alg: Some("RS256".to_string()),
        }
    }

    fn access_claims() -> TokenClaims {
        TokenClaims {
            sub: Some("username".to_string()),
            iss: Some(ISSUER.to_string()),
            exp: Some(NOW + 3600),
            token_use: Some("access".to_string()),
            client_id: Some(CLIENT_ID.to_string()),
            ..TokenClaims::default()
        }
    }

    fn id_claims() -> TokenClaims {
        TokenClaims {
            sub: Some("username".to_string()),
            iss: Some(ISSUER.to_string()),
            exp: Some(NOW + 3600),
            token_use: Some("id".to_string()),
            aud: Some(CLIENT_ID.to_string()),
            nonce: Some("nonce-on-record".to_string()),
            email: Some("user@mail.com".to_string()),
            ..TokenClaims::default()
        }
    }

    fn token(claims: &TokenClaims) -> String {
        encode(&header(), claims).unwrap()
    }

    #[tokio::test]
    async fn test_accepts_valid_access_token() {
        assert!(
            validator()
                .validate_at(&token(&access_claims()), None, NOW)
                .await
        );
    }

    #[tokio::test]
    async fn test_accepts_valid_id_token() {
        assert!(
            validator()
                .validate_at(&token(&id_claims()), Some("nonce-on-record"), NOW)
                .await
        );
    }

    #[tokio::test]
    async fn test_rejects_malformed_token() {
        assert!(!validator().validate_at("garbage", None, NOW).await);
        assert!(!validator().validate_at("", None, NOW).await);
    }

    #[tokio::test]
    async fn test_rejects_unknown_kid() {
        let bad_header = TokenHeader {
            kid: Some("some-other-key".to_string()),
            alg: Some("RS256".to_string()),
        };
        let token = encode(&bad_header, &access_claims()).unwrap();

        assert!(!validator().validate_at(&token, None, NOW).await);
    }

    #[tokio::test]
    async fn test_rejects_missing_kid() {
        let bad_header = TokenHeader {
            kid: None,
            alg: Some("RS256".to_string()),
        };
        let token = encode(&bad_header, &access_claims()).unwrap();

        assert!(!validator().validate_at(&token, None, NOW).await);
    }

    #[tokio::test]
    async fn test_fails_closed_when_key_set_unreachable() {
        let validator = validator_with(Arc::new(UnreachableKeys));
        assert!(
            !validator
                .validate_at(&token(&access_claims()), None, NOW)
                .await
        );
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let mut claims = access_claims();
        claims.exp = Some(NOW);

        let validator = validator();
        // Strictly-greater-than: valid one second before expiry, invalid at it
        assert!(validator.validate_at(&token(&claims), None, NOW - 1).await);
        assert!(!validator.validate_at(&token(&claims), None, NOW).await);
    }

    #[tokio::test]
    async fn test_rejects_missing_exp() {
        let mut claims = access_claims();
        claims.exp = None;

        assert!(!validator().validate_at(&token(&claims), None, NOW).await);
    }

    #[tokio::test]
    async fn test_rejects_wrong_issuer() {
        let mut claims = access_claims();
        claims.iss = Some("https://evil.example.com".to_string());

        assert!(!validator().validate_at(&token(&claims), None, NOW).await);
    }

    #[tokio::test]
    async fn test_rejects_access_token_with_wrong_client_id() {
        let mut claims = access_claims();
        claims.client_id = Some("someone-else".to_string());

        assert!(!validator().validate_at(&token(&claims), None, NOW).await);
    }

    #[tokio::test]
    async fn test_rejects_id_token_with_wrong_audience() {
        // Everything else valid; the audience alone sinks it
        let mut claims = id_claims();
        claims.aud = Some("someone-else".to_string());

        assert!(
            !validator()
                .validate_at(&token(&claims), Some("nonce-on-record"), NOW)
                .await
        );
    }

    #[tokio::test]
    async fn test_rejects_id_token_with_wrong_nonce() {
        let mut claims = id_claims();
        claims.nonce = Some("replayed-nonce".to_string());

        assert!(
            !validator()
                .validate_at(&token(&claims), Some("nonce-on-record"), NOW)
                .await
        );
    }

    #[tokio::test]
    async fn test_nonce_ignored_when_none_on_record() {
        let mut claims = id_claims();
        claims.nonce = Some("whatever-the-provider-echoed".to_string());

        assert!(validator().validate_at(&token(&claims), None, NOW).await);
    }

    #[tokio::test]
    async fn test_rejects_unknown_token_use() {
        let mut claims = access_claims();
        claims.token_use = Some("refresh".to_string());
        assert!(!validator().validate_at(&token(&claims), None, NOW).await);

        claims.token_use = None;
        assert!(!validator().validate_at(&token(&claims), None, NOW).await);
    }

    #[tokio::test]
    async fn test_token_use_overrules_field_presence() {
        // Carries both discriminating fields; token_use decides the branch,
        // so the aud check applies and fails
        let mut claims = id_claims();
        claims.client_id = Some(CLIENT_ID.to_string());
        claims.aud = Some("someone-else".to_string());

        assert!(!validator().validate_at(&token(&claims), None, NOW).await);
    }
}
