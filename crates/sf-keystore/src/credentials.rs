//! Refresh-token slot in the keychain
//!
//! The refresh token is the only credential persisted across restarts.
//! Access and identity tokens stay in volatile memory and are re-minted
//! through the token endpoint when needed.

use crate::keychain::KeychainStorage;
use sf_types::AppResult;
use std::sync::Arc;
use tracing::debug;

const KEYCHAIN_SERVICE: &str = "Shopfront-Credentials";
const REFRESH_TOKEN_ACCOUNT: &str = "refresh_token";

/// Handle to the durable refresh-token slot
#[derive(Clone)]
pub struct CredentialStore {
    keychain: Arc<dyn KeychainStorage>,
}

impl CredentialStore {
    pub fn new(keychain: Arc<dyn KeychainStorage>) -> Self {
        Self { keychain }
    }

    /// Persist the refresh token, replacing any previous one
    pub fn store_refresh_token(&self, token: &str) -> AppResult<()> {
        self.keychain
            .store(KEYCHAIN_SERVICE, REFRESH_TOKEN_ACCOUNT, token)?;
        debug!("Stored refresh token");
        Ok(())
    }

    /// Retrieve the persisted refresh token, if any
    pub fn refresh_token(&self) -> AppResult<Option<String>> {
        self.keychain.get(KEYCHAIN_SERVICE, REFRESH_TOKEN_ACCOUNT)
    }

    /// Remove the persisted refresh token
    pub fn clear_refresh_token(&self) -> AppResult<()> {
        self.keychain
            .delete(KEYCHAIN_SERVICE, REFRESH_TOKEN_ACCOUNT)?;
        debug!("Cleared refresh token");
        Ok(())
    }
}
