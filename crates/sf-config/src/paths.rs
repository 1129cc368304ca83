//! OS-specific path resolution for configuration files

use sf_types::{AppError, AppResult};
use std::path::PathBuf;

/// Get the configuration directory
///
/// Priority:
/// 1. Runtime override via `SHOPFRONT_ENV` environment variable: `~/.shopfront-{env}/`
/// 2. Development mode (debug builds): `~/.shopfront-dev/`
/// 3. Production mode (release builds): `~/.shopfront/`
pub fn config_dir() -> AppResult<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AppError::Config("Could not determine home directory".to_string()))?;

    // Runtime override via environment variable (for testing)
    if let Ok(env_suffix) = std::env::var("SHOPFRONT_ENV") {
        return Ok(home.join(format!(".shopfront-{}", env_suffix)));
    }

    #[cfg(debug_assertions)]
    let dir = home.join(".shopfront-dev");

    #[cfg(not(debug_assertions))]
    let dir = home.join(".shopfront");

    Ok(dir)
}

/// Get the configuration file path
pub fn config_file() -> AppResult<PathBuf> {
    Ok(config_dir()?.join("settings.json"))
}

/// Get the secrets file path (for file-based keystore storage in development)
pub fn secrets_file() -> AppResult<PathBuf> {
    Ok(config_dir()?.join("secrets.json"))
}

/// Get the sign-in hand-off slot path
///
/// A second app instance that receives the authorization redirect writes the
/// `{code, state}` payload here for the initiating instance to pick up.
pub fn handoff_file() -> AppResult<PathBuf> {
    Ok(config_dir()?.join("login_handoff.json"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir_exists(path: &PathBuf) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| {
            AppError::Config(format!(
                "Failed to create directory {}: {}",
                path.display(),
                e
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_config_dir() {
        env::remove_var("SHOPFRONT_ENV");

        let dir = config_dir().unwrap();
        assert!(!dir.as_os_str().is_empty());

        #[cfg(debug_assertions)]
        assert!(dir.to_string_lossy().ends_with(".shopfront-dev"));

        #[cfg(not(debug_assertions))]
        assert!(dir.to_string_lossy().ends_with(".shopfront"));
    }

    #[test]
    #[serial]
    fn test_config_dir_with_env_override() {
        env::set_var("SHOPFRONT_ENV", "test");

        let dir = config_dir().unwrap();
        assert!(
            dir.to_string_lossy().ends_with(".shopfront-test"),
            "Expected path to end with .shopfront-test, got: {}",
            dir.display()
        );

        env::remove_var("SHOPFRONT_ENV");
    }

    #[test]
    #[serial]
    fn test_config_file() {
        env::remove_var("SHOPFRONT_ENV");
        let file = config_file().unwrap();
        assert!(file.to_string_lossy().ends_with("settings.json"));
    }

    #[test]
    #[serial]
    fn test_handoff_file() {
        env::remove_var("SHOPFRONT_ENV");
        let file = handoff_file().unwrap();
        assert!(file.to_string_lossy().ends_with("login_handoff.json"));
    }
}
