//! Commit state: where local durable state says replication should resume.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::TransactionId;

/// Snapshot of the local store's commit position.
///
/// Built fresh for every catch-up attempt and discarded once the resume
/// point has been chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitState {
    /// Last committed transaction id recorded in the store metadata.
    meta_data_store_index: TransactionId,

    /// Last transaction id in the local transaction log tail.
    ///
    /// Present only when at least one log segment exists. When present it
    /// takes precedence over the metadata index.
    transaction_log_index: Option<TransactionId>,
}

impl CommitState {
    /// Commit state of a store without transaction logs.
    pub const fn new(meta_data_store_index: TransactionId) -> Self {
        Self {
            meta_data_store_index,
            transaction_log_index: None,
        }
    }

    /// Commit state of a store whose log tail ends at `transaction_log_index`.
    pub const fn with_transaction_log(
        meta_data_store_index: TransactionId,
        transaction_log_index: TransactionId,
    ) -> Self {
        Self {
            meta_data_store_index,
            transaction_log_index: Some(transaction_log_index),
        }
    }

    /// Last committed transaction id according to the metadata store.
    pub const fn meta_data_store_index(&self) -> TransactionId {
        self.meta_data_store_index
    }

    /// Last transaction id in the log tail, if any logs exist.
    pub const fn transaction_log_index(&self) -> Option<TransactionId> {
        self.transaction_log_index
    }
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CommitState{{metaDataStoreIndex={}, transactionLogIndex=",
            self.meta_data_store_index
        )?;
        match self.transaction_log_index {
            Some(index) => write!(f, "{}}}", index),
            None => write!(f, "none}}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_state_without_logs() {
        let state = CommitState::new(17);
        assert_eq!(state.meta_data_store_index(), 17);
        assert_eq!(state.transaction_log_index(), None);
    }

    #[test]
    fn test_commit_state_display() {
        assert_eq!(
            CommitState::with_transaction_log(10, 42).to_string(),
            "CommitState{metaDataStoreIndex=10, transactionLogIndex=42}"
        );
        assert_eq!(
            CommitState::new(3).to_string(),
            "CommitState{metaDataStoreIndex=3, transactionLogIndex=none}"
        );
    }
}
