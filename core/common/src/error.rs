//! Common error types for Selladoc.

use thiserror::Error;

/// Top-level error type for Selladoc operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration (credentials, encryption secret).
    /// Raised at backend construction, before any I/O.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Authentication-tag verification failure or post-decrypt hash mismatch.
    /// Indicates tampering or corruption and is never silently ignored.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// Underlying disk or object-store operation failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Persisted storage record operation failed.
    #[error("Record store error: {0}")]
    Record(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
