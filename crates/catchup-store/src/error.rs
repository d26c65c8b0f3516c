//! Error types for the store module.
//!
//! Every variant here is a local-integrity or local I/O failure. Callers
//! must not treat these as network problems or retry them blindly.

use std::path::PathBuf;

use catchup_core::{CoreError, TransactionId};
use thiserror::Error;

/// Errors that can occur reading or writing local store files.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file the store requires does not exist.
    #[error("missing store file: {}", .0.display())]
    MissingFile(PathBuf),

    /// A store file exists but its contents cannot be trusted.
    #[error("corrupt store file {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Log record serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A transaction arrived out of sequence.
    #[error("out of order transaction: expected {expected}, got {got}")]
    OutOfOrder {
        expected: TransactionId,
        got: TransactionId,
    },

    /// A received value failed validation.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(#[from] CoreError),

    /// Invalid input from a caller or peer.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// The writer was used after it was closed.
    #[error("catch-up writer is closed")]
    WriterClosed,
}

impl StoreError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
