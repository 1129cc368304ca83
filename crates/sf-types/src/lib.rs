//! Shared types and error types for Shopfront

pub mod errors;

pub use errors::{AppError, AppResult};
