//! Error types for the catch-up client.

use std::time::Duration;

use catchup_core::StoreId;
use catchup_store::StoreError;
use thiserror::Error;

use crate::address::PeerAddress;
use crate::messages::StoreCopyStatus;

/// Errors that can occur talking to a catch-up peer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No address could be resolved for the request.
    #[error("failed to resolve catch-up address: {0}")]
    AddressResolution(String),

    /// An address string could not be parsed.
    #[error("invalid peer address: {0:?}")]
    InvalidAddress(String),

    /// Nothing answers at the address.
    #[error("peer unreachable: {0}")]
    Unreachable(PeerAddress),

    /// The peer serves a different store.
    #[error("store id mismatch: expected {expected}")]
    StoreIdMismatch { expected: StoreId },

    /// The peer could not list its store files.
    #[error("peer failed to prepare store copy: {0}")]
    PrepareFailed(String),

    /// The peer answered a file request with an error status.
    #[error("request for {file_name} failed with {status}")]
    FileRequestFailed {
        file_name: String,
        status: StoreCopyStatus,
    },

    /// A file could not be copied within its retry budget.
    #[error("gave up on {file_name} after {budget:?}: {last_error}")]
    RetryBudgetExhausted {
        file_name: String,
        budget: Duration,
        last_error: String,
    },

    /// Writing received data locally failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ClientError {
    /// Whether repeating the request, possibly against another peer, may help.
    ///
    /// Store id mismatches and local write failures never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::AddressResolution(_)
                | ClientError::Unreachable(_)
                | ClientError::FileRequestFailed { .. }
                | ClientError::Transport(_)
        )
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
