//! Transient hand-off slot for the authorization result
//!
//! When the browser redirect lands in a second app instance (or a helper)
//! instead of the loopback callback server, that process writes the
//! `{code, state}` payload here. The initiating instance observes the slot,
//! consumes the payload, and deletes the file immediately; durable storage
//! is the authoritative hand-off point between the two processes, not a
//! cache.

use serde::{Deserialize, Serialize};
use sf_types::{AppError, AppResult};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Authorization result written by the receiving process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffPayload {
    pub code: String,
    pub state: String,
}

/// File slot holding at most one pending hand-off payload
#[derive(Debug, Clone)]
pub struct HandoffSlot {
    path: PathBuf,
}

impl HandoffSlot {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Slot at the default platform location
    pub fn default_location() -> AppResult<Self> {
        Ok(Self::new(sf_config::paths::handoff_file()?))
    }

    /// Write a payload into the slot, replacing any unconsumed one
    pub fn publish(&self, payload: &HandoffPayload) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Keystore(format!("Failed to create hand-off directory: {}", e))
            })?;
        }

        let contents = serde_json::to_string(payload)?;
        std::fs::write(&self.path, contents)
            .map_err(|e| AppError::Keystore(format!("Failed to write hand-off slot: {}", e)))?;

        debug!("Published authorization result to hand-off slot");
        Ok(())
    }

    /// Consume the pending payload, deleting the slot file
    ///
    /// Returns `None` when the slot is empty. A corrupted slot is removed
    /// and reported as empty; the sign-in attempt then times out instead of
    /// crashing the observer loop.
    pub fn take(&self) -> AppResult<Option<HandoffPayload>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::Keystore(format!(
                    "Failed to read hand-off slot: {}",
                    e
                )))
            }
        };

        // Delete before parsing so a bad payload can't be redelivered forever
        std::fs::remove_file(&self.path)
            .map_err(|e| AppError::Keystore(format!("Failed to clear hand-off slot: {}", e)))?;

        match serde_json::from_str(&contents) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) => {
                warn!("Discarding malformed hand-off payload: {}", e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_in_tempdir() -> (tempfile::TempDir, HandoffSlot) {
        let dir = tempfile::tempdir().unwrap();
        let slot = HandoffSlot::new(dir.path().join("login_handoff.json"));
        (dir, slot)
    }

    #[test]
    fn test_empty_slot_yields_none() {
        let (_dir, slot) = slot_in_tempdir();
        assert_eq!(slot.take().unwrap(), None);
    }

    #[test]
    fn test_publish_then_take() {
        let (_dir, slot) = slot_in_tempdir();

        let payload = HandoffPayload {
            code: "auth-code".to_string(),
            state: "state-value".to_string(),
        };
        slot.publish(&payload).unwrap();

        assert_eq!(slot.take().unwrap(), Some(payload));
    }

    #[test]
    fn test_take_deletes_slot() {
        let (_dir, slot) = slot_in_tempdir();

        slot.publish(&HandoffPayload {
            code: "c".to_string(),
            state: "s".to_string(),
        })
        .unwrap();

        assert!(slot.take().unwrap().is_some());
        // Second read observes an empty slot
        assert_eq!(slot.take().unwrap(), None);
    }

    #[test]
    fn test_malformed_payload_is_discarded() {
        let (_dir, slot) = slot_in_tempdir();

        std::fs::create_dir_all(slot.path.parent().unwrap()).unwrap();
        std::fs::write(&slot.path, "not json").unwrap();

        assert_eq!(slot.take().unwrap(), None);
        // The bad file is gone
        assert_eq!(slot.take().unwrap(), None);
    }

    #[test]
    fn test_publish_replaces_unconsumed_payload() {
        let (_dir, slot) = slot_in_tempdir();

        slot.publish(&HandoffPayload {
            code: "first".to_string(),
            state: "s1".to_string(),
        })
        .unwrap();
        slot.publish(&HandoffPayload {
            code: "second".to_string(),
            state: "s2".to_string(),
        })
        .unwrap();

        let taken = slot.take().unwrap().unwrap();
        assert_eq!(taken.code, "second");
    }
}
