//! Error types for gsp-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invalid quantity: {0}")]
    InvalidQuantity(i32),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
