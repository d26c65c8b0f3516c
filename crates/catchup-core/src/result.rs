//! Outcomes of a transaction pull.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::TransactionId;

/// Terminal outcome of one transaction pull attempt, as reported by the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatchupResult {
    /// The peer streamed everything it had and ended the stream cleanly.
    SuccessEndOfStream,
    /// The requested start lies in a range the peer has already pruned.
    TransactionPruned,
    /// The peer serves a different store.
    StoreIdMismatch,
    /// The peer's store is not available for serving.
    StoreUnavailable,
    /// Any other failure reported by the peer.
    GeneralError,
}

impl CatchupResult {
    /// Whether the pull completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, CatchupResult::SuccessEndOfStream)
    }
}

impl fmt::Display for CatchupResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CatchupResult::SuccessEndOfStream => "SUCCESS_END_OF_STREAM",
            CatchupResult::TransactionPruned => "E_TRANSACTION_PRUNED",
            CatchupResult::StoreIdMismatch => "E_STORE_ID_MISMATCH",
            CatchupResult::StoreUnavailable => "E_STORE_UNAVAILABLE",
            CatchupResult::GeneralError => "E_GENERAL_ERROR",
        };
        f.write_str(name)
    }
}

/// Result of a single pull request: the outcome and the last transaction id
/// the stream reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxPullRequestResult {
    pub catchup_result: CatchupResult,
    pub last_tx_id: TransactionId,
}

impl TxPullRequestResult {
    pub const fn new(catchup_result: CatchupResult, last_tx_id: TransactionId) -> Self {
        Self {
            catchup_result,
            last_tx_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_end_of_stream_is_success() {
        assert!(CatchupResult::SuccessEndOfStream.is_success());
        assert!(!CatchupResult::TransactionPruned.is_success());
        assert!(!CatchupResult::GeneralError.is_success());
    }

    #[test]
    fn test_display_uses_protocol_names() {
        assert_eq!(
            CatchupResult::TransactionPruned.to_string(),
            "E_TRANSACTION_PRUNED"
        );
        assert_eq!(
            CatchupResult::SuccessEndOfStream.to_string(),
            "SUCCESS_END_OF_STREAM"
        );
    }
}
