//! Cryptographically secure flow secrets
//!
//! Every sign-in attempt consumes three independent secrets (state, code
//! verifier, nonce). Each is random bytes base64url-encoded and cut to the
//! requested length, so the output alphabet is exactly `[A-Za-z0-9\-_]` with
//! no padding.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;

/// Default secret length in characters
pub const DEFAULT_SECRET_LENGTH: usize = 64;

/// Generate a URL-safe random string of exactly `length` characters
///
/// Values must never be reused across sign-in attempts; callers generate a
/// fresh one per field per attempt.
pub fn generate_secret(length: usize) -> String {
    // base64 yields 4 characters per 3 input bytes, so `length` input bytes
    // always encode to at least `length` characters
    let mut bytes = vec![0u8; length.max(1)];
    rand::thread_rng().fill_bytes(&mut bytes);

    let mut encoded = URL_SAFE_NO_PAD.encode(&bytes);
    encoded.truncate(length);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_url_safe(s: &str) -> bool {
        s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    #[test]
    fn test_default_length() {
        let secret = generate_secret(DEFAULT_SECRET_LENGTH);
        assert_eq!(secret.len(), 64);
    }

    #[test]
    fn test_exact_length_for_various_sizes() {
        for length in [1, 2, 3, 22, 43, 64, 128] {
            let secret = generate_secret(length);
            assert_eq!(secret.len(), length, "wrong length for {}", length);
        }
    }

    #[test]
    fn test_url_safe_alphabet() {
        for _ in 0..20 {
            let secret = generate_secret(DEFAULT_SECRET_LENGTH);
            assert!(is_url_safe(&secret), "unexpected character in {}", secret);
            assert!(!secret.contains('='));
        }
    }

    #[test]
    fn test_secrets_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            let secret = generate_secret(DEFAULT_SECRET_LENGTH);
            assert!(seen.insert(secret), "generated duplicate secret");
        }
        assert_eq!(seen.len(), 100);
    }
}
