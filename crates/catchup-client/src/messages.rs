//! Catch-up protocol responses.
//!
//! Requests are plain method arguments on [`CatchupChannel`](crate::CatchupChannel);
//! these are the structured answers a peer sends back.

use std::fmt;

use catchup_core::{CatchupResult, FileHeader, TransactionId};
use serde::{Deserialize, Serialize};

/// Outcome of asking a peer to prepare a store copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrepareStoreCopyStatus {
    Success,
    StoreIdMismatch,
    ListingFailed,
}

/// The peer's answer to a prepare request: what to copy and the
/// transaction the copied files are consistent with at least.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareStoreCopyResponse {
    pub status: PrepareStoreCopyStatus,
    pub files: Vec<FileHeader>,
    pub last_checkpointed_tx_id: TransactionId,
}

impl PrepareStoreCopyResponse {
    pub fn success(files: Vec<FileHeader>, last_checkpointed_tx_id: TransactionId) -> Self {
        Self {
            status: PrepareStoreCopyStatus::Success,
            files,
            last_checkpointed_tx_id,
        }
    }

    pub fn error(status: PrepareStoreCopyStatus) -> Self {
        Self {
            status,
            files: Vec::new(),
            last_checkpointed_tx_id: 0,
        }
    }
}

/// Outcome of one store file request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreCopyStatus {
    Success,
    StoreIdMismatch,
    /// The peer's checkpoint is behind what the copy needs.
    TooFarBehind,
    /// The peer does not know the requested file.
    UnknownFile,
    Unknown,
}

impl fmt::Display for StoreCopyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreCopyStatus::Success => "SUCCESS",
            StoreCopyStatus::StoreIdMismatch => "E_STORE_ID_MISMATCH",
            StoreCopyStatus::TooFarBehind => "E_TOO_FAR_BEHIND",
            StoreCopyStatus::UnknownFile => "E_UNKNOWN_FILE",
            StoreCopyStatus::Unknown => "E_UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Sent after a store file has been streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCopyFinishedResponse {
    pub status: StoreCopyStatus,
    pub last_checkpointed_tx_id: TransactionId,
}

/// Sent after a transaction stream ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStreamFinishedResponse {
    pub status: CatchupResult,
    /// Last transaction id the peer sent, or the request's previous id.
    pub latest_tx_id: TransactionId,
}
