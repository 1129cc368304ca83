//! Configuration persistence
//!
//! Reads and writes the JSON settings file. A missing file yields the
//! defaults rather than an error so a fresh install starts clean.

use crate::types::AppConfig;
use sf_types::{AppError, AppResult};
use std::path::Path;
use tracing::{debug, info};

/// Load configuration from the given path
///
/// Returns defaults if the file does not exist yet.
pub fn load_config(path: &Path) -> AppResult<AppConfig> {
    if !path.exists() {
        info!(
            "No configuration file at {}, using defaults",
            path.display()
        );
        return Ok(AppConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    let config: AppConfig = serde_json::from_str(&contents)
        .map_err(|e| AppError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Save configuration to the given path, creating parent directories
pub fn save_config(config: &AppConfig, path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::Config(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let contents = serde_json::to_string_pretty(config)?;
    std::fs::write(path, contents)
        .map_err(|e| AppError::Config(format!("Failed to write {}: {}", path.display(), e)))?;

    debug!("Saved configuration to {}", path.display());
    Ok(())
}
