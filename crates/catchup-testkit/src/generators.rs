//! Proptest generators for property-based testing.

use proptest::prelude::*;

use catchup_core::{CommitState, CommittedTransaction, FileHeader, StoreId, TransactionId};

/// Generate a random StoreId.
pub fn store_id() -> impl Strategy<Value = StoreId> {
    (any::<i64>(), any::<u64>()).prop_map(|(creation_time, random_id)| {
        StoreId::new(creation_time, random_id)
    })
}

/// Generate a transaction id that is not the base id.
pub fn tx_id() -> impl Strategy<Value = TransactionId> {
    1u64..=u64::MAX / 2
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a store file name, optionally nested one level.
pub fn file_name() -> impl Strategy<Value = String> {
    "([a-z]{1,8}/)?[a-z][a-z0-9_.]{0,23}".prop_map(String::from)
}

/// Generate a page alignment: 1 or a power of two up to 8 KiB.
pub fn alignment() -> impl Strategy<Value = u32> {
    prop_oneof![Just(1u32), (0u32..=13).prop_map(|shift| 1u32 << shift)]
}

/// Generate a valid file header.
pub fn file_header() -> impl Strategy<Value = FileHeader> {
    (file_name(), alignment()).prop_map(|(name, alignment)| {
        FileHeader::with_alignment(name, alignment).expect("generated header is valid")
    })
}

/// Generate `len` consecutive committed transactions starting at `first`.
pub fn transactions(
    first: TransactionId,
    max_len: usize,
) -> impl Strategy<Value = Vec<CommittedTransaction>> {
    prop::collection::vec((any::<i64>(), payload(64)), 0..=max_len).prop_map(move |parts| {
        parts
            .into_iter()
            .enumerate()
            .map(|(i, (timestamp, payload))| {
                CommittedTransaction::new(first + i as u64, timestamp, payload)
            })
            .collect()
    })
}

/// Generate a commit state, with or without a log tail.
pub fn commit_state() -> impl Strategy<Value = CommitState> {
    (0u64..1_000_000, prop::option::of(0u64..1_000)).prop_map(|(meta, ahead)| match ahead {
        Some(ahead) => CommitState::with_transaction_log(meta, meta + ahead),
        None => CommitState::new(meta),
    })
}
