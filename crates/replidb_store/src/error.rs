//! Error types for object-store operations.

use std::io;
use thiserror::Error;

/// Result type for object-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in an object-store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process holds the store lock.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// The store does not exist and creation was not requested.
    #[error("store does not exist: {path}")]
    DoesNotExist {
        /// Location that was requested.
        path: String,
    },

    /// A record key is not usable by this backend.
    #[error("invalid record key: {key}")]
    InvalidKey {
        /// The offending key.
        key: String,
    },

    /// A stored record is damaged or unreadable.
    #[error("store corrupted: {0}")]
    Corrupted(String),
}

impl StoreError {
    /// Creates a does-not-exist error.
    pub fn does_not_exist(path: impl Into<String>) -> Self {
        Self::DoesNotExist { path: path.into() }
    }

    /// Creates an invalid-key error.
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey { key: key.into() }
    }
}
