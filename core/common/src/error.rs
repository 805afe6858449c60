//! Common error types for Driveloft.

use thiserror::Error;

/// Top-level error type for Driveloft operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration missing or rejecting the operation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication or token exchange failed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Transport or provider API error.
    #[error("Network error: {0}")]
    Network(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
