//! Storage error types

use thiserror::Error;

/// Errors returned by [`Storage`](crate::Storage) implementations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage object not found: {0}")]
    NotFound(String),

    #[error("storage verification failed: {0}")]
    VerificationFailed(String),

    /// A failure reported by the backing store, passed through
    /// verbatim: backend messages are already self-describing.
    #[error("{0}")]
    Backend(String),

    #[error("invalid object name: {0}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether this error means the named object does not exist.
    ///
    /// Callers branch on this to tell a missing object apart from a
    /// backend that could not be reached at all.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
