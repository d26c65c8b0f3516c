//! Inspection of local durable state.
//!
//! Works out where replication should resume from, without touching the
//! network.

use std::path::Path;

use catchup_core::{CommitState, TransactionId, BASE_TX_ID};
use tracing::{debug, warn};

use crate::error::Result;
use crate::layout::DatabaseLayout;
use crate::log::{LogEntry, SegmentReader, TransactionLogFiles};
use crate::metadata::MetaDataStore;

/// Reads the metadata store and the log tail of a database.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommitStateHelper;

/// What a scan of the log directory found.
#[derive(Debug, Default)]
struct LogScan {
    /// Highest id known to the log, from records or segment headers.
    last_tx_id: Option<TransactionId>,
    covers: bool,
}

impl CommitStateHelper {
    pub fn new() -> Self {
        Self
    }

    /// Determine the local commit state.
    ///
    /// The log index is only reported when the log covers the metadata's
    /// last committed transaction: a segment starts right after it, a record
    /// carries it, or nothing was ever committed. Logs that exist but do not
    /// reach back that far are ignored.
    pub fn get_store_state(&self, layout: &DatabaseLayout) -> Result<CommitState> {
        let metadata = MetaDataStore::open_read_only(layout.metadata_store())?;
        let meta_index = metadata.last_committed_tx_id()?;
        drop(metadata);

        let mut files = TransactionLogFiles::new(layout.transaction_logs_directory());
        if !files.has_segments()? && layout.transaction_logs_directory() != layout.database_directory()
        {
            files = TransactionLogFiles::new(layout.database_directory());
        }

        let torn_head = files.torn_head()?;
        if let Some(version) = torn_head {
            warn!(
                segment = %files.segment_path(version).display(),
                "ignoring transaction log segment without a complete header"
            );
        }
        let versions: Vec<u64> = files
            .versions()?
            .into_iter()
            .filter(|v| Some(*v) != torn_head)
            .collect();
        if versions.is_empty() {
            debug!(meta_index, "no transaction logs present");
            return Ok(CommitState::new(meta_index));
        }

        let mut scan = LogScan {
            covers: meta_index == BASE_TX_ID,
            ..LogScan::default()
        };
        for version in versions {
            scan_segment(&files.segment_path(version), meta_index, &mut scan)?;
        }

        match scan.last_tx_id {
            Some(log_index) if scan.covers => {
                Ok(CommitState::with_transaction_log(meta_index, log_index))
            }
            _ => {
                debug!(
                    meta_index,
                    directory = %files.directory().display(),
                    "transaction logs do not cover the metadata store"
                );
                Ok(CommitState::new(meta_index))
            }
        }
    }
}

fn scan_segment(path: &Path, meta_index: TransactionId, scan: &mut LogScan) -> Result<()> {
    let mut reader = SegmentReader::open(path)?;
    let previous = reader.header().previous_tx_id;
    if previous == meta_index {
        scan.covers = true;
    }
    observe(scan, previous);

    while let Some(entry) = reader.next_entry()? {
        if let LogEntry::Transaction(tx) = entry {
            if tx.tx_id == meta_index {
                scan.covers = true;
            }
            observe(scan, tx.tx_id);
        }
    }

    if reader.torn_tail() {
        warn!(path = %path.display(), "ignoring torn record at end of transaction log");
    }
    Ok(())
}

fn observe(scan: &mut LogScan, tx_id: TransactionId) {
    scan.last_tx_id = Some(scan.last_tx_id.map_or(tx_id, |last| last.max(tx_id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::log::{LogHeader, SegmentWriter};
    use crate::traits::{CatchupWriter, TxPullResponseListener, WriterOptions};
    use crate::writer::{LogConfig, TransactionLogCatchupWriter};
    use catchup_core::{CommittedTransaction, StoreId};
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    fn setup(last_committed: TransactionId) -> (TempDir, DatabaseLayout) {
        let dir = TempDir::new().unwrap();
        let layout = DatabaseLayout::new(dir.path());
        let store = MetaDataStore::create(layout.metadata_store(), StoreId::new(1, 2)).unwrap();
        store.set_last_committed_tx_id(last_committed).unwrap();
        (dir, layout)
    }

    fn write_log(dir: &Path, version: u64, previous: TransactionId, ids: &[TransactionId]) {
        let files = TransactionLogFiles::new(dir);
        let mut writer =
            SegmentWriter::create(files.segment_path(version), LogHeader::new(version, previous))
                .unwrap();
        for id in ids {
            writer
                .append(&LogEntry::Transaction(CommittedTransaction::new(*id, 0, vec![1])))
                .unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_no_logs_uses_metadata() {
        let (_dir, layout) = setup(100);
        let state = CommitStateHelper::new().get_store_state(&layout).unwrap();

        assert_eq!(state.meta_data_store_index(), 100);
        assert_eq!(state.transaction_log_index(), None);
    }

    #[test]
    fn test_log_tail_reported_when_covering() {
        let (dir, layout) = setup(40);
        write_log(dir.path(), 0, 35, &[36, 37, 38, 39, 40, 41, 42]);

        let state = CommitStateHelper::new().get_store_state(&layout).unwrap();
        assert_eq!(state.meta_data_store_index(), 40);
        assert_eq!(state.transaction_log_index(), Some(42));
    }

    #[test]
    fn test_log_tail_spans_segments() {
        let (dir, layout) = setup(10);
        write_log(dir.path(), 0, 9, &[10, 11]);
        write_log(dir.path(), 1, 11, &[12, 13]);

        let state = CommitStateHelper::new().get_store_state(&layout).unwrap();
        assert_eq!(state.transaction_log_index(), Some(13));
    }

    #[test]
    fn test_segment_starting_after_metadata_covers() {
        let (dir, layout) = setup(500);
        write_log(dir.path(), 0, 500, &[]);

        let state = CommitStateHelper::new().get_store_state(&layout).unwrap();
        assert_eq!(state.transaction_log_index(), Some(500));
    }

    #[test]
    fn test_stale_logs_are_ignored() {
        let (dir, layout) = setup(100);
        write_log(dir.path(), 0, 0, &[1, 2, 3]);

        let state = CommitStateHelper::new().get_store_state(&layout).unwrap();
        assert_eq!(state.meta_data_store_index(), 100);
        assert_eq!(state.transaction_log_index(), None);
    }

    #[test]
    fn test_fresh_store_with_logs() {
        let (dir, layout) = setup(BASE_TX_ID);
        write_log(dir.path(), 0, 0, &[1, 2]);

        let state = CommitStateHelper::new().get_store_state(&layout).unwrap();
        assert_eq!(state.transaction_log_index(), Some(2));
    }

    #[test]
    fn test_separate_log_directory() {
        let (dir, layout) = setup(5);
        let logs = dir.path().join("logs");
        std::fs::create_dir_all(&logs).unwrap();
        write_log(&logs, 0, 4, &[5, 6, 7]);
        let layout = layout.with_transaction_logs_directory(&logs);

        let state = CommitStateHelper::new().get_store_state(&layout).unwrap();
        assert_eq!(state.transaction_log_index(), Some(7));
    }

    #[test]
    fn test_torn_tail_ends_log() {
        let (dir, layout) = setup(1);
        write_log(dir.path(), 0, 0, &[1, 2, 3]);

        let path = TransactionLogFiles::new(dir.path()).segment_path(0);
        let len = std::fs::metadata(&path).unwrap().len();
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(len - 2)
            .unwrap();

        let state = CommitStateHelper::new().get_store_state(&layout).unwrap();
        assert_eq!(state.transaction_log_index(), Some(2));
    }

    fn apply(
        layout: &DatabaseLayout,
        from: TransactionId,
        ids: &[TransactionId],
    ) -> TransactionLogCatchupWriter {
        let mut writer = TransactionLogCatchupWriter::open(
            layout,
            from,
            WriterOptions::catch_up(true, false),
            LogConfig::default(),
        )
        .unwrap();
        for id in ids {
            writer
                .on_tx_received(CommittedTransaction::new(*id, 0, vec![1]))
                .unwrap();
        }
        writer
    }

    #[test]
    fn test_writer_killed_mid_pull_can_be_redone() {
        let (_dir, layout) = setup(BASE_TX_ID);

        // Neither close nor drop runs, as if the process died.
        std::mem::forget(apply(&layout, 1, &[1, 2]));

        let state = CommitStateHelper::new().get_store_state(&layout).unwrap();
        assert_eq!(state, CommitState::with_transaction_log(BASE_TX_ID, BASE_TX_ID));

        apply(&layout, 1, &[1]).close().unwrap();
        let state = CommitStateHelper::new().get_store_state(&layout).unwrap();
        assert_eq!(state, CommitState::with_transaction_log(1, 1));
    }

    #[test]
    fn test_headerless_newest_segment_is_skipped_then_replaced() {
        let (dir, layout) = setup(5);
        write_log(dir.path(), 0, 4, &[5, 6]);
        let files = TransactionLogFiles::new(dir.path());
        std::fs::File::create(files.segment_path(1)).unwrap();

        let state = CommitStateHelper::new().get_store_state(&layout).unwrap();
        assert_eq!(state, CommitState::with_transaction_log(5, 6));

        apply(&layout, 7, &[7]).close().unwrap();
        assert_eq!(files.versions().unwrap(), vec![0, 1]);
        assert_eq!(
            SegmentReader::open(files.segment_path(1)).unwrap().header(),
            LogHeader::new(1, 6)
        );
        let state = CommitStateHelper::new().get_store_state(&layout).unwrap();
        assert_eq!(state, CommitState::with_transaction_log(7, 7));
    }

    #[test]
    fn test_short_older_segment_is_still_corrupt() {
        let (dir, layout) = setup(1);
        let files = TransactionLogFiles::new(dir.path());
        std::fs::File::create(files.segment_path(0)).unwrap();
        write_log(dir.path(), 1, 0, &[1]);

        assert!(matches!(
            CommitStateHelper::new().get_store_state(&layout),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_inspection_does_not_modify_metadata() {
        let (dir, layout) = setup(40);
        write_log(dir.path(), 0, 39, &[40, 41]);
        let before = std::fs::read(layout.metadata_store()).unwrap();

        CommitStateHelper::new().get_store_state(&layout).unwrap();

        assert_eq!(std::fs::read(layout.metadata_store()).unwrap(), before);
    }

    #[test]
    fn test_missing_metadata_is_fatal() {
        let dir = TempDir::new().unwrap();
        let layout = DatabaseLayout::new(dir.path());

        assert!(matches!(
            CommitStateHelper::new().get_store_state(&layout),
            Err(StoreError::MissingFile(_))
        ));
    }

    #[test]
    fn test_corrupt_segment_is_fatal() {
        let (dir, layout) = setup(1);
        std::fs::write(
            TransactionLogFiles::new(dir.path()).segment_path(0),
            b"not a log segment at all, definitely not",
        )
        .unwrap();

        assert!(matches!(
            CommitStateHelper::new().get_store_state(&layout),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
