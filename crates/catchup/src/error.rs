//! Error types for remote store catch-up.

use catchup_client::ClientError;
use catchup_core::CatchupResult;
use catchup_store::StoreError;
use thiserror::Error;

/// Why a store copy or catch-up could not complete.
#[derive(Debug, Error)]
pub enum StoreCopyFailure {
    /// The network side failed: resolution, connection or protocol.
    #[error("catch-up client failure: {0}")]
    Client(#[source] ClientError),

    /// Replay after a copy ended with something other than end of stream.
    #[error("failed to pull transactions: {0}")]
    PullIncomplete(CatchupResult),
}

/// Errors that can occur during remote store operations.
#[derive(Debug, Error)]
pub enum CatchupError {
    /// Local files are missing, corrupt or unwritable. Never retried.
    #[error("local store error: {0}")]
    Store(#[from] StoreError),

    /// The copy or pull failed and must be redone by the caller.
    #[error("store copy failed: {0}")]
    StoreCopyFailed(#[from] StoreCopyFailure),

    /// The peer's store id could not be fetched.
    #[error("failed to download store id: {0}")]
    StoreIdDownloadFailed(#[source] ClientError),

    /// Configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<ClientError> for CatchupError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Store(inner) => CatchupError::Store(inner),
            other => CatchupError::StoreCopyFailed(StoreCopyFailure::Client(other)),
        }
    }
}

/// Result type for remote store operations.
pub type Result<T> = std::result::Result<T, CatchupError>;
