//! Error types for bracket-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Invalid price trigger: {0}")]
    InvalidTrigger(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
