//! Error types for the catch-up core.

use thiserror::Error;

use crate::types::TransactionId;

/// Errors raised while building or checking core values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("required alignment must be at least 1, got {0}")]
    InvalidAlignment(u32),

    #[error("file name must not be empty")]
    EmptyFileName,

    #[error("checksum mismatch for transaction {tx_id}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        tx_id: TransactionId,
        expected: String,
        actual: String,
    },
}
