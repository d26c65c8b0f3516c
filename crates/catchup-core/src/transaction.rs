//! Committed transactions as streamed from a peer.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::types::TransactionId;

/// Blake3 digest over a transaction's id, timestamp and payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(pub [u8; 32]);

impl Checksum {
    /// Compute the checksum of a transaction's contents.
    pub fn compute(tx_id: TransactionId, timestamp: i64, payload: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"catchup-tx-v0:");
        hasher.update(&tx_id.to_be_bytes());
        hasher.update(&timestamp.to_be_bytes());
        hasher.update(payload);
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", &self.to_hex()[..16])
    }
}

/// A committed transaction: opaque command payload plus its commit id.
///
/// The catch-up code only orders and persists transactions; it never
/// interprets the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedTransaction {
    pub tx_id: TransactionId,
    /// Commit time on the originating member (Unix ms).
    pub timestamp: i64,
    pub payload: Bytes,
    pub checksum: Checksum,
}

impl CommittedTransaction {
    /// Build a transaction, computing its checksum.
    pub fn new(tx_id: TransactionId, timestamp: i64, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let checksum = Checksum::compute(tx_id, timestamp, &payload);
        Self {
            tx_id,
            timestamp,
            payload,
            checksum,
        }
    }

    /// Check that the stored checksum matches the contents.
    pub fn verify(&self) -> Result<(), CoreError> {
        let actual = Checksum::compute(self.tx_id, self.timestamp, &self.payload);
        if actual != self.checksum {
            return Err(CoreError::ChecksumMismatch {
                tx_id: self.tx_id,
                expected: self.checksum.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(())
    }
}
