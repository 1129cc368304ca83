//! Durable storage module
//!
//! Provides keychain-backed storage for the refresh token (the only
//! credential that survives a restart) and the transient file slot used to
//! hand an authorization result from one app instance to another.

mod credentials;
mod handoff;
pub mod keychain;

pub use credentials::CredentialStore;
pub use handoff::{HandoffPayload, HandoffSlot};
pub use keychain::{CachedKeychain, KeychainStorage, MockKeychain};
