//! Error types and handling for graphfs
//!
//! One taxonomy for the whole crate: the engine fails fast with `Validation`
//! before touching a backend, access-control failures surface as `KeyMismatch`,
//! and backend failures pass through as opaque `Storage`/`Network` messages
//! without retry or reclassification.

use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for graphfs
#[derive(Error, Debug)]
pub enum Error {
    /// Vertex or edge absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Supplied private key does not match the stored one
    #[error("wrong private key supplied for vertex {0}")]
    KeyMismatch(String),

    /// Bad input rejected before reaching a backend
    #[error("validation error: {0}")]
    Validation(String),

    /// Creation conflict. Reserved: conflicting creates are resolved by
    /// idempotent adoption and never surface to callers.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Opaque backend/storage failure, propagated verbatim
    #[error("storage error: {0}")]
    Storage(String),

    /// Network failure talking to a remote engine or cluster
    #[error("network error: {0}")]
    Network(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record encoding errors (at-rest format)
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Contract method the active backend cannot perform
    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),
}

impl Error {
    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this is a client error (4xx equivalent)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::KeyMismatch(_)
                | Error::Validation(_)
                | Error::Serialization(_)
        )
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
