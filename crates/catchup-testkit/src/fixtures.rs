//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: local stores on disk and
//! in-memory peers serving a store.

use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Arc;

use catchup_client::{MemoryNetwork, MemoryPeer, PeerAddress};
use catchup_core::{CommitState, CommittedTransaction, FileHeader, StoreId, TransactionId};
use catchup_store::{
    CommitStateHelper, DatabaseLayout, LogEntry, LogHeader, MetaDataStore, SegmentReader,
    SegmentWriter, TransactionLogFiles, METADATA_STORE_FILE_NAME,
};
use tempfile::TempDir;

/// A deterministic transaction with the given id.
pub fn transaction(tx_id: TransactionId) -> CommittedTransaction {
    CommittedTransaction::new(
        tx_id,
        1_700_000_000_000 + tx_id as i64,
        format!("tx-{}", tx_id).into_bytes(),
    )
}

/// Deterministic transactions for every id in `ids`.
pub fn transactions(ids: RangeInclusive<TransactionId>) -> Vec<CommittedTransaction> {
    ids.map(transaction).collect()
}

/// A local store in a temporary directory.
pub struct LocalStoreFixture {
    dir: TempDir,
    pub layout: DatabaseLayout,
    pub store_id: StoreId,
}

impl LocalStoreFixture {
    /// A store that has committed nothing, logs alongside the store files.
    pub fn new(store_id: StoreId) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let layout = DatabaseLayout::new(dir.path().join("graph.db"));
        MetaDataStore::create(layout.metadata_store(), store_id).expect("create metadata store");
        Self {
            dir,
            layout,
            store_id,
        }
    }

    /// An empty directory that a store copy can land in.
    pub fn empty() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let layout = DatabaseLayout::new(dir.path().join("graph.db"));
        Self {
            dir,
            layout,
            store_id: StoreId::new(0, 0),
        }
    }

    /// Keep transaction logs in a separate directory from now on.
    pub fn with_separate_logs(mut self) -> Self {
        self.layout = self
            .layout
            .with_transaction_logs_directory(self.dir.path().join("logs"));
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn set_last_committed(&self, tx_id: TransactionId) {
        MetaDataStore::open(self.layout.metadata_store())
            .and_then(|store| store.set_last_committed_tx_id(tx_id))
            .expect("update metadata store");
    }

    pub fn last_committed(&self) -> TransactionId {
        MetaDataStore::open(self.layout.metadata_store())
            .and_then(|store| store.last_committed_tx_id())
            .expect("read metadata store")
    }

    pub fn commit_state(&self) -> CommitState {
        CommitStateHelper::new()
            .get_store_state(&self.layout)
            .expect("read commit state")
    }

    /// Write a log segment holding `ids` into the transaction log directory.
    pub fn write_log(&self, ids: RangeInclusive<TransactionId>) {
        let directory = self.layout.transaction_logs_directory();
        std::fs::create_dir_all(directory).expect("create log directory");
        let files = TransactionLogFiles::new(directory);
        let version = files
            .highest_version()
            .expect("list log segments")
            .map_or(0, |v| v + 1);

        let previous = ids.start().saturating_sub(1);
        let mut writer =
            SegmentWriter::create(files.segment_path(version), LogHeader::new(version, previous))
                .expect("create log segment");
        for tx in transactions(ids) {
            writer
                .append(&LogEntry::Transaction(tx))
                .expect("append log entry");
        }
        writer.finish().expect("finish log segment");
    }

    /// Every log entry in `directory`, oldest segment first.
    pub fn log_entries(directory: &Path) -> Vec<LogEntry> {
        let files = TransactionLogFiles::new(directory);
        let mut entries = Vec::new();
        for version in files.versions().expect("list log segments") {
            let mut reader =
                SegmentReader::open(files.segment_path(version)).expect("open log segment");
            while let Some(entry) = reader.next_entry().expect("read log entry") {
                entries.push(entry);
            }
        }
        entries
    }

    /// Ids of every transaction in `directory`, oldest first.
    pub fn logged_tx_ids(directory: &Path) -> Vec<TransactionId> {
        Self::log_entries(directory)
            .into_iter()
            .filter_map(|entry| match entry {
                LogEntry::Transaction(tx) => Some(tx.tx_id),
                LogEntry::Checkpoint { .. } => None,
            })
            .collect()
    }
}

/// Contents of the aligned store file every peer fixture serves.
pub const NODE_STORE_CONTENTS: &[u8] = b"node records, not page aligned";

/// Name of the aligned store file every peer fixture serves.
pub const NODE_STORE_FILE_NAME: &str = "neostore.nodestore.db";

/// Page alignment of the node store file.
pub const NODE_STORE_ALIGNMENT: u32 = 16;

/// Build a peer serving `store_id` whose store files were flushed at
/// `last_checkpointed_tx_id` and whose log holds `retained`.
///
/// The peer serves a metadata store recording the checkpoint plus one
/// aligned data file.
pub async fn peer_fixture(
    store_id: StoreId,
    last_checkpointed_tx_id: TransactionId,
    retained: RangeInclusive<TransactionId>,
) -> Arc<MemoryPeer> {
    let scratch = TempDir::new().expect("create temp dir");
    let metadata_path = scratch.path().join(METADATA_STORE_FILE_NAME);
    {
        let metadata = MetaDataStore::create(&metadata_path, store_id).expect("create metadata");
        metadata
            .set_last_committed_tx_id(last_checkpointed_tx_id)
            .expect("set checkpoint");
    }
    let metadata_bytes = std::fs::read(&metadata_path).expect("read metadata store");

    let peer = Arc::new(MemoryPeer::new(store_id).with_chunk_size(7));
    peer.add_file(FileHeader::new(METADATA_STORE_FILE_NAME), metadata_bytes)
        .await;
    peer.add_file(
        FileHeader::with_alignment(NODE_STORE_FILE_NAME, NODE_STORE_ALIGNMENT)
            .expect("valid header"),
        NODE_STORE_CONTENTS,
    )
    .await;
    peer.set_last_checkpointed_tx_id(last_checkpointed_tx_id)
        .await;

    let first = *retained.start();
    for tx in transactions(retained) {
        peer.append_transaction(tx).await;
    }
    peer.prune_before(first).await;
    peer
}

/// Register `peer` on a fresh network at a fixed address.
pub async fn network_with(peer: Arc<MemoryPeer>) -> (Arc<MemoryNetwork>, PeerAddress) {
    let network = MemoryNetwork::new();
    let address = PeerAddress::new("core-1.cluster", 6000);
    network.register(address.clone(), peer).await;
    (network, address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catchup_core::BASE_TX_ID;

    #[test]
    fn test_local_store_starts_empty() {
        let fixture = LocalStoreFixture::new(StoreId::new(1, 2));
        assert_eq!(fixture.last_committed(), BASE_TX_ID);
        assert_eq!(fixture.commit_state(), CommitState::new(BASE_TX_ID));
    }

    #[test]
    fn test_written_log_is_visible() {
        let fixture = LocalStoreFixture::new(StoreId::new(1, 2));
        fixture.set_last_committed(40);
        fixture.write_log(38..=42);

        assert_eq!(fixture.commit_state().transaction_log_index(), Some(42));
        assert_eq!(
            LocalStoreFixture::logged_tx_ids(fixture.layout.transaction_logs_directory()),
            vec![38, 39, 40, 41, 42]
        );
    }

    #[tokio::test]
    async fn test_peer_fixture_serves_files_and_range() {
        let peer = peer_fixture(StoreId::new(3, 4), 20, 15..=25).await;
        assert_eq!(peer.store_id(), StoreId::new(3, 4));
        assert_eq!(peer.last_tx_id().await, Some(25));
    }
}
