//! Identifier types for the catch-up subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A transaction id as recorded in the transaction log and metadata store.
pub type TransactionId = u64;

/// Sentinel meaning "no transaction has ever been committed".
pub const BASE_TX_ID: TransactionId = 0;

/// Identity of a logical store instance.
///
/// Two stores share a `StoreId` only if one was copied from the other. The
/// catch-up code compares ids for equality and never looks inside them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreId {
    /// Creation time of the store (Unix ms).
    pub creation_time: i64,
    /// Random component chosen at creation.
    pub random_id: u64,
}

impl StoreId {
    /// Create a store id from its parts.
    pub const fn new(creation_time: i64, random_id: u64) -> Self {
        Self {
            creation_time,
            random_id,
        }
    }

    /// Generate a fresh store id for a store created at `creation_time`.
    pub fn generate(creation_time: i64) -> Self {
        use rand::Rng;
        Self::new(creation_time, rand::thread_rng().gen())
    }

    /// Encode as 16 big-endian bytes.
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.creation_time.to_be_bytes());
        out[8..].copy_from_slice(&self.random_id.to_be_bytes());
        out
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Debug for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreId({})", self.to_hex())
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreId{{creationTime={}, randomId={:016x}}}",
            self.creation_time, self.random_id
        )
    }
}
