//! Error types for ferrite.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Remote fetch errors
    #[error("Object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Fetch failed for {bucket}/{key}: {reason}")]
    FetchFailed {
        bucket: String,
        key: String,
        reason: String,
    },

    // Local cache errors
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the failure came from the remote store rather than the local
    /// disk. Fetch failures leave the cache untouched; storage failures are
    /// fatal to the current request only.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Error::ObjectNotFound { .. } | Error::FetchFailed { .. }
        )
    }
}
