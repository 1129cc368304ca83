//! Browser-delegated sign-in for Shopfront
//!
//! Implements the OAuth 2.0 authorization code flow with PKCE (S256) against
//! a hosted identity provider, plus local validation of the resulting JSON
//! Web Tokens.
//!
//! # Architecture
//!
//! - `secrets`: cryptographically secure URL-safe random strings
//! - `pkce`: PKCE challenge derivation (RFC 7636, S256 only)
//! - `jwt`: total, non-panicking JWT structural decoding
//! - `jwks`: the provider's published signing-key set
//! - `validator`: ordered, fail-closed claims validation
//! - `exchange`: token endpoint client (exchange, refresh, revoke)
//! - `completion`: delivery of the authorization result back to the app,
//!   racing a loopback callback server against a storage hand-off slot
//! - `session`: explicitly owned sign-in state (flow secrets + credentials)
//! - `flow`: the state machine orchestrating all of the above
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use sf_auth::{AuthFlowManager, CompletionChannel};
//!
//! let manager = AuthFlowManager::new(config, endpoint, credentials, launcher, channel);
//! let start = manager.start().await?;
//! // The hosted UI is now open in the user's browser.
//! // Poll manager.poll_status() until Authenticated or Failed.
//! ```

pub mod completion;
pub mod exchange;
pub mod flow;
pub mod jwks;
pub mod jwt;
pub mod pkce;
pub mod secrets;
pub mod session;
pub mod validator;

// Re-export commonly used types
pub use completion::{CallbackServer, CompletionChannel, CompletionEvent, CompletionTransport, HandoffWatcher};
pub use exchange::{HttpTokenEndpoint, TokenEndpoint, TokenResponse};
pub use flow::{AuthFlowManager, BrowserLauncher, FlowStart, FlowStatus};
pub use jwks::{Jwk, JwksClient, KeySet, KeySetSource};
pub use jwt::{DecodedToken, TokenClaims, TokenHeader};
pub use pkce::{generate_pkce_challenge, PkceChallenge};
pub use secrets::{generate_secret, DEFAULT_SECRET_LENGTH};
pub use session::{AuthSession, CredentialPair, FlowContext};
pub use validator::ClaimsValidator;
