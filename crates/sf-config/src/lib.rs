//! Configuration management module
//!
//! Handles loading, saving, and resolving paths for application
//! configuration.

pub mod paths;
mod storage;
pub mod types;

pub use storage::{load_config, save_config};
pub use types::*;
