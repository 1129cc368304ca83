//! PKCE (Proof Key for Code Exchange) utilities for OAuth 2.0
//!
//! Implements PKCE as defined in RFC 7636 with the S256 (SHA-256) challenge
//! method. No other transform method is supported.

use crate::secrets::{generate_secret, DEFAULT_SECRET_LENGTH};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// PKCE challenge containing code verifier and challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkceChallenge {
    /// Code verifier (random string, kept until token exchange)
    pub code_verifier: String,

    /// Code challenge (BASE64URL(SHA256(code_verifier)))
    pub code_challenge: String,

    /// Challenge method (always "S256")
    pub code_challenge_method: String,
}

/// Generate a PKCE challenge for the authorization code flow
///
/// The verifier is a fresh 64-character URL-safe secret; the challenge is its
/// base64url-encoded SHA-256 digest, sent with the authorization request so
/// the provider can bind the issued code to this client.
pub fn generate_pkce_challenge() -> PkceChallenge {
    let code_verifier = generate_secret(DEFAULT_SECRET_LENGTH);
    let code_challenge = compute_code_challenge(&code_verifier);

    PkceChallenge {
        code_verifier,
        code_challenge,
        code_challenge_method: "S256".to_string(),
    }
}

/// Derive the S256 code challenge for a given verifier
pub fn compute_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
