//! Error types for collaborator boundaries.

use thiserror::Error;

/// Result type alias using medseal's collaborator Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by external collaborators (blob store, identity
/// registry, key-value store) and by configuration loading.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource not found (unknown content id, unregistered identity)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend could not be reached or refused the operation
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means "the thing does not exist" as opposed to
    /// "the backend failed".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
