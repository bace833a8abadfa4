//! Error types for the local store.

use crate::article::ArticleId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the local article store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying I/O failure.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to encode store contents.
    #[error("store encode error: {0}")]
    Encode(String),

    /// Failed to decode store contents.
    #[error("store decode error: {0}")]
    Decode(String),

    /// Another process holds the store lock.
    #[error("store at {0} is locked by another process")]
    Locked(PathBuf),

    /// The requested article does not exist.
    #[error("article {0} not found")]
    ArticleNotFound(ArticleId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let id = ArticleId::new();
        let err = StoreError::ArticleNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));

        let err = StoreError::Locked(PathBuf::from("/tmp/x"));
        assert!(err.to_string().contains("/tmp/x"));
    }
}
