//! Structural JWT decoding
//!
//! `decode` is a total function over arbitrary strings: any malformation
//! (wrong segment count, invalid base64url, invalid JSON) yields `None`, and
//! nothing here panics or errors. Signature verification is deliberately out
//! of scope; no key material exists client-side. Authenticity comes from the
//! validator correlating the header `kid` with the provider's published key
//! set and from tokens arriving over the TLS-authenticated token endpoint.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sf_types::AppResult;

/// JWT header fields the client cares about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Key ID, matched against the provider's key set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Signing algorithm as asserted by the issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

/// Claims carried by the provider's access and identity tokens
///
/// Only the claims that validation inspects are typed; everything else the
/// issuer includes (`auth_time`, `jti`, `origin_jti`, ...) is preserved in
/// `extra` so a decoded token round-trips losslessly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Expiration time in seconds since the Unix epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// `"access"` or `"id"`; the primary token-kind discriminant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,

    /// Present on access tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Present on identity tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// Binds an identity token to one authentication request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A structurally decoded token; derived on demand, never stored
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    pub header: TokenHeader,
    pub claims: TokenClaims,
}

/// Decode the header and payload segments of a JWT
///
/// Accepts the signed three-segment form and the unsigned two-segment form;
/// anything else is `None`.
pub fn decode(token: &str) -> Option<DecodedToken> {
    let mut segments = token.split('.');
    let header_segment = segments.next()?;
    let payload_segment = segments.next()?;

    // A third (signature) segment is allowed but never inspected
    if segments.next().is_some() && segments.next().is_some() {
        return None;
    }

    let header = decode_segment(header_segment)?;
    let claims = decode_segment(payload_segment)?;

    Some(DecodedToken { header, claims })
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Encode a header and claims into unsigned token form
///
/// The trailing signature segment is left empty (the `alg=none` convention).
/// Used to mint fixture tokens; production tokens always come signed from the
/// provider.
pub fn encode(header: &TokenHeader, claims: &TokenClaims) -> AppResult<String> {
    let header_segment = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header)?);
    let payload_segment = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    Ok(format!("{}.{}.", header_segment, payload_segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> TokenHeader {
        TokenHeader {
            kid: Some("key-1".to_string()),
            alg: Some("RS256".to_string()),
        }
    }

    fn sample_claims() -> TokenClaims {
        let mut extra = serde_json::Map::new();
        extra.insert("auth_time".to_string(), serde_json::json!(1_000_000_000));
        extra.insert("jti".to_string(), serde_json::json!("4d7163da"));

        TokenClaims {
            sub: Some("username".to_string()),
            iss: Some("https://idp.example.com/pool".to_string()),
            exp: Some(1_000_000_000),
            token_use: Some("access".to_string()),
            client_id: Some("client-123".to_string()),
            extra,
            ..TokenClaims::default()
        }
    }

    #[test]
    fn test_round_trip() {
        let header = sample_header();
        let claims = sample_claims();

        let token = encode(&header, &claims).unwrap();
        let decoded = decode(&token).unwrap();

        assert_eq!(decoded.header, header);
        assert_eq!(decoded.claims, claims);
    }

    #[test]
    fn test_decode_is_total() {
        // None of these may panic; all must yield None
        let garbage = [
            "",
            ".",
            "..",
            "...",
            "not-a-jwt",
            "a.b.c.d",
            "ö.ü.ß",
            "!!!.???.###",
            "eyJhbGciOiJSUzI1NiJ9", // single segment
        ];

        for input in garbage {
            assert!(decode(input).is_none(), "decoded garbage: {:?}", input);
        }
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        let valid = encode(&sample_header(), &sample_claims()).unwrap();
        let tampered = format!("+{}", valid); // '+' is not in the url-safe alphabet
        assert!(decode(&tampered).is_none());
    }

    #[test]
    fn test_decode_rejects_non_json_segments() {
        let not_json = URL_SAFE_NO_PAD.encode(b"hello world");
        assert!(decode(&format!("{}.{}.", not_json, not_json)).is_none());
    }

    #[test]
    fn test_decode_tolerates_signature_segment() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"kid":"k","alg":"RS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"u"}"#);
        let token = format!("{}.{}.c2lnbmF0dXJl", header, payload);

        let decoded = decode(&token).unwrap();
        assert_eq!(decoded.header.kid.as_deref(), Some("k"));
        assert_eq!(decoded.claims.sub.as_deref(), Some("u"));
    }

    #[test]
    fn test_unknown_claims_are_preserved() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"u","custom:tier":"gold"}"#);
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);

        let decoded = decode(&format!("{}.{}.", header, payload)).unwrap();
        assert_eq!(
            decoded.claims.extra.get("custom:tier"),
            Some(&serde_json::json!("gold"))
        );
    }
}
