//! Keychain trait abstraction for testability
//!
//! Provides a trait-based interface for keychain operations, allowing for
//! real (system keyring) and mock (in-memory) implementations.
//!
//! The CachedKeychain wrapper adds in-memory caching to prevent repeated
//! password prompts for the same service:account combination.

use parking_lot::{Mutex, RwLock};
use sf_types::{AppError, AppResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Trait for keychain operations
pub trait KeychainStorage: Send + Sync {
    /// Store a key-value pair
    fn store(&self, service: &str, account: &str, secret: &str) -> AppResult<()>;

    /// Retrieve a value by service and account
    fn get(&self, service: &str, account: &str) -> AppResult<Option<String>>;

    /// Delete a key-value pair
    fn delete(&self, service: &str, account: &str) -> AppResult<()>;
}

/// Real keychain implementation using the system keyring
///
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service / keyutils
pub struct SystemKeychain;

impl SystemKeychain {
    fn entry(service: &str, account: &str) -> AppResult<keyring::Entry> {
        keyring::Entry::new(service, account)
            .map_err(|e| AppError::Keystore(format!("Failed to access keyring: {}", e)))
    }
}

impl KeychainStorage for SystemKeychain {
    fn store(&self, service: &str, account: &str, secret: &str) -> AppResult<()> {
        Self::entry(service, account)?
            .set_password(secret)
            .map_err(|e| AppError::Keystore(format!("Failed to store secret: {}", e)))?;
        debug!("SystemKeychain: stored {}:{}", service, account);
        Ok(())
    }

    fn get(&self, service: &str, account: &str) -> AppResult<Option<String>> {
        match Self::entry(service, account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => {
                trace!("SystemKeychain: no entry for {}:{}", service, account);
                Ok(None)
            }
            Err(e) => Err(AppError::Keystore(format!(
                "Failed to retrieve secret: {}",
                e
            ))),
        }
    }

    fn delete(&self, service: &str, account: &str) -> AppResult<()> {
        match Self::entry(service, account)?.delete_credential() {
            Ok(()) => {
                debug!("SystemKeychain: deleted {}:{}", service, account);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::Keystore(format!("Failed to delete secret: {}", e))),
        }
    }
}

/// File-based keychain implementation for development
///
/// Stores secrets as JSON in the config directory. NOT secure; exists only to
/// avoid keychain permission prompts during development.
///
/// Key format: "service:account"
#[derive(Clone)]
pub struct FileKeychain {
    file_path: Arc<PathBuf>,
    storage: Arc<Mutex<HashMap<String, String>>>,
}

impl FileKeychain {
    pub fn new(file_path: PathBuf) -> AppResult<Self> {
        let storage = if file_path.exists() {
            let contents = std::fs::read_to_string(&file_path)
                .map_err(|e| AppError::Keystore(format!("Failed to read secrets file: {}", e)))?;
            if contents.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&contents)
                    .map_err(|e| AppError::Keystore(format!("Failed to parse secrets file: {}", e)))?
            }
        } else {
            warn!(
                "FileKeychain: secrets file does not exist, will create on first write: {}",
                file_path.display()
            );
            HashMap::new()
        };

        Ok(Self {
            file_path: Arc::new(file_path),
            storage: Arc::new(Mutex::new(storage)),
        })
    }

    fn make_key(service: &str, account: &str) -> String {
        format!("{}:{}", service, account)
    }

    fn save_to_file(&self) -> AppResult<()> {
        let storage = self.storage.lock();

        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Keystore(format!("Failed to create secrets directory: {}", e))
            })?;
        }

        let contents = serde_json::to_string_pretty(&*storage)?;
        std::fs::write(self.file_path.as_ref(), contents)
            .map_err(|e| AppError::Keystore(format!("Failed to write secrets file: {}", e)))?;
        Ok(())
    }
}

impl KeychainStorage for FileKeychain {
    fn store(&self, service: &str, account: &str, secret: &str) -> AppResult<()> {
        self.storage
            .lock()
            .insert(Self::make_key(service, account), secret.to_string());
        self.save_to_file()?;
        trace!("FileKeychain: stored {}:{}", service, account);
        Ok(())
    }

    fn get(&self, service: &str, account: &str) -> AppResult<Option<String>> {
        Ok(self
            .storage
            .lock()
            .get(&Self::make_key(service, account))
            .cloned())
    }

    fn delete(&self, service: &str, account: &str) -> AppResult<()> {
        self.storage.lock().remove(&Self::make_key(service, account));
        self.save_to_file()?;
        trace!("FileKeychain: deleted {}:{}", service, account);
        Ok(())
    }
}

/// Cached keychain wrapper that adds in-memory caching to any
/// KeychainStorage implementation
///
/// Sits on top of the keyring calls and caches retrieved values for the
/// lifetime of the process so the user is prompted at most once per
/// service:account.
#[derive(Clone)]
pub struct CachedKeychain {
    inner: Arc<dyn KeychainStorage>,
    cache: Arc<RwLock<HashMap<String, String>>>,
}

impl CachedKeychain {
    pub fn new(inner: Arc<dyn KeychainStorage>) -> Self {
        Self {
            inner,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Cached wrapper over the system keyring
    pub fn system() -> Self {
        Self::new(Arc::new(SystemKeychain))
    }

    /// Cached wrapper over the file-based keychain
    pub fn file(file_path: PathBuf) -> AppResult<Self> {
        Ok(Self::new(Arc::new(FileKeychain::new(file_path)?)))
    }

    /// Create the appropriate keychain for the current build
    ///
    /// Debug builds use file-based storage; release builds use the system
    /// keyring. `SHOPFRONT_KEYSTORE=file|system` overrides the choice.
    pub fn auto() -> AppResult<Self> {
        match std::env::var("SHOPFRONT_KEYSTORE").as_deref() {
            Ok("file") => {
                warn!("Using file-based keystore (env var override)");
                return Self::file(sf_config::paths::secrets_file()?);
            }
            Ok("system") => {
                debug!("Using system keyring (env var override)");
                return Ok(Self::system());
            }
            _ => {}
        }

        #[cfg(debug_assertions)]
        {
            warn!("Using file-based keystore (DEVELOPMENT MODE)");
            Self::file(sf_config::paths::secrets_file()?)
        }

        #[cfg(not(debug_assertions))]
        {
            debug!("Using system keyring for secure storage");
            Ok(Self::system())
        }
    }

    fn make_cache_key(service: &str, account: &str) -> String {
        format!("{}:{}", service, account)
    }
}

impl KeychainStorage for CachedKeychain {
    fn store(&self, service: &str, account: &str, secret: &str) -> AppResult<()> {
        self.inner.store(service, account, secret)?;
        self.cache
            .write()
            .insert(Self::make_cache_key(service, account), secret.to_string());
        Ok(())
    }

    fn get(&self, service: &str, account: &str) -> AppResult<Option<String>> {
        let cache_key = Self::make_cache_key(service, account);

        if let Some(cached) = self.cache.read().get(&cache_key) {
            trace!("CachedKeychain: cache hit for {}:{}", service, account);
            return Ok(Some(cached.clone()));
        }

        let result = self.inner.get(service, account)?;
        if let Some(ref value) = result {
            self.cache.write().insert(cache_key, value.clone());
        }
        Ok(result)
    }

    fn delete(&self, service: &str, account: &str) -> AppResult<()> {
        self.inner.delete(service, account)?;
        self.cache
            .write()
            .remove(&Self::make_cache_key(service, account));
        Ok(())
    }
}

/// Mock keychain implementation using in-memory storage
///
/// Key format: "service:account"
#[derive(Clone, Default)]
pub struct MockKeychain {
    storage: Arc<Mutex<HashMap<String, String>>>,
}

impl MockKeychain {
    pub fn new() -> Self {
        Self::default()
    }

    fn make_key(service: &str, account: &str) -> String {
        format!("{}:{}", service, account)
    }
}

impl KeychainStorage for MockKeychain {
    fn store(&self, service: &str, account: &str, secret: &str) -> AppResult<()> {
        self.storage
            .lock()
            .insert(Self::make_key(service, account), secret.to_string());
        Ok(())
    }

    fn get(&self, service: &str, account: &str) -> AppResult<Option<String>> {
        Ok(self
            .storage
            .lock()
            .get(&Self::make_key(service, account))
            .cloned())
    }

    fn delete(&self, service: &str, account: &str) -> AppResult<()> {
        self.storage.lock().remove(&Self::make_key(service, account));
        Ok(())
    }
}
