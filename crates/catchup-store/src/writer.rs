//! The production catch-up writer.
//!
//! Persists streamed transactions into a fresh log segment and records the
//! result in the metadata store when closed. The database is not running
//! while a catch-up writes, so the writer is also responsible for rotating
//! segments and for the closing checkpoint after a store copy.

use std::fs;
use std::path::Path;

use catchup_core::{CommittedTransaction, TransactionId, BASE_TX_ID};
use tracing::{debug, error, info, warn};

use crate::error::{Result, StoreError};
use crate::layout::DatabaseLayout;
use crate::log::{LogEntry, LogHeader, SegmentWriter, TransactionLogFiles, LOG_HEADER_SIZE};
use crate::metadata::MetaDataStore;
use crate::traits::{
    CatchupWriter, TransactionLogCatchupFactory, TxPullResponseListener, WriterOptions,
};

/// Default segment size that triggers rotation (250 MiB).
pub const DEFAULT_ROTATION_THRESHOLD: u64 = 250 * 1024 * 1024;

/// Configuration for log writing.
#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    /// Segment size in bytes after which a rotating writer starts a new one.
    pub rotation_threshold: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            rotation_threshold: DEFAULT_ROTATION_THRESHOLD,
        }
    }
}

/// Creates [`TransactionLogCatchupWriter`]s.
#[derive(Debug, Clone, Default)]
pub struct LogCatchupWriterFactory {
    config: LogConfig,
}

impl LogCatchupWriterFactory {
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }
}

impl TransactionLogCatchupFactory for LogCatchupWriterFactory {
    type Writer = TransactionLogCatchupWriter;

    fn create(
        &self,
        layout: &DatabaseLayout,
        from_tx_id: TransactionId,
        options: WriterOptions,
    ) -> Result<Self::Writer> {
        TransactionLogCatchupWriter::open(layout, from_tx_id, options, self.config)
    }
}

/// Writes one pull's worth of transactions to the local log.
pub struct TransactionLogCatchupWriter {
    metadata: MetaDataStore,
    files: TransactionLogFiles,
    segment: Option<SegmentWriter>,
    options: WriterOptions,
    config: LogConfig,
    next_tx_id: TransactionId,
    last_tx_id: Option<TransactionId>,
    closed: bool,
}

impl TransactionLogCatchupWriter {
    /// Open a writer whose first transaction is `from_tx_id`.
    ///
    /// The metadata store must already exist.
    pub fn open(
        layout: &DatabaseLayout,
        from_tx_id: TransactionId,
        options: WriterOptions,
        config: LogConfig,
    ) -> Result<Self> {
        let metadata = MetaDataStore::open(layout.metadata_store())?;

        let directory = if options.keep_tx_logs_in_store_dir {
            layout.database_directory()
        } else {
            layout.transaction_logs_directory()
        };
        fs::create_dir_all(directory)?;
        let files = TransactionLogFiles::new(directory);

        let first_tx_id = from_tx_id.max(BASE_TX_ID + 1);
        let segment = open_segment(&files, first_tx_id - 1)?;
        debug!(
            first_tx_id,
            segment = %segment.path().display(),
            ?options,
            "opened catch-up writer"
        );

        Ok(Self {
            metadata,
            files,
            segment: Some(segment),
            options,
            config,
            next_tx_id: first_tx_id,
            last_tx_id: None,
            closed: false,
        })
    }

    /// Directory the writer puts segments in.
    pub fn directory(&self) -> &Path {
        self.files.directory()
    }

    fn rotate_if_needed(&mut self) -> Result<()> {
        if !self.options.force_rotation {
            return Ok(());
        }
        let Some(segment) = self.segment.as_ref() else {
            return Err(StoreError::WriterClosed);
        };
        if segment.size() <= LOG_HEADER_SIZE as u64 || segment.size() < self.config.rotation_threshold
        {
            return Ok(());
        }

        if let Some(full) = self.segment.take() {
            let path = full.finish()?;
            debug!(segment = %path.display(), "rotated transaction log");
        }
        self.segment = Some(open_segment(&self.files, self.next_tx_id - 1)?);
        Ok(())
    }

    fn close_inner(&mut self) -> Result<()> {
        self.closed = true;
        let Some(mut segment) = self.segment.take() else {
            return Ok(());
        };

        let empty = segment.size() == LOG_HEADER_SIZE as u64;
        if self.options.as_part_of_store_copy {
            let last_tx_id = self.last_tx_id.unwrap_or(self.next_tx_id - 1);
            segment.append(&LogEntry::Checkpoint { last_tx_id })?;
        }
        let path = segment.finish()?;

        if empty && !self.options.as_part_of_store_copy {
            fs::remove_file(&path)?;
        }

        if let Some(last_tx_id) = self.last_tx_id {
            self.metadata.set_last_committed_tx_id(last_tx_id)?;
        }

        info!(
            last_tx_id = ?self.last_tx_id,
            store_copy = self.options.as_part_of_store_copy,
            "closed catch-up writer"
        );
        Ok(())
    }
}

fn open_segment(files: &TransactionLogFiles, previous_tx_id: TransactionId) -> Result<SegmentWriter> {
    if let Some(version) = files.torn_head()? {
        let path = files.segment_path(version);
        warn!(segment = %path.display(), "replacing segment left without a header");
        fs::remove_file(&path)?;
    }
    let version = files.highest_version()?.map_or(0, |v| v + 1);
    SegmentWriter::create(
        files.segment_path(version),
        LogHeader::new(version, previous_tx_id),
    )
}

impl TxPullResponseListener for TransactionLogCatchupWriter {
    fn on_tx_received(&mut self, tx: CommittedTransaction) -> Result<()> {
        if self.closed {
            return Err(StoreError::WriterClosed);
        }
        if tx.tx_id != self.next_tx_id {
            return Err(StoreError::OutOfOrder {
                expected: self.next_tx_id,
                got: tx.tx_id,
            });
        }
        tx.verify()?;

        self.rotate_if_needed()?;
        let tx_id = tx.tx_id;
        let segment = self.segment.as_mut().ok_or(StoreError::WriterClosed)?;
        segment.append(&LogEntry::Transaction(tx))?;

        self.last_tx_id = Some(tx_id);
        self.next_tx_id = tx_id + 1;
        Ok(())
    }
}

impl CatchupWriter for TransactionLogCatchupWriter {
    fn last_tx_id(&self) -> Option<TransactionId> {
        self.last_tx_id
    }

    fn close(mut self) -> Result<()> {
        self.close_inner()
    }
}

impl Drop for TransactionLogCatchupWriter {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.close_inner() {
            error!(error = %e, "failed to close catch-up writer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::SegmentReader;
    use catchup_core::StoreId;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DatabaseLayout) {
        let dir = TempDir::new().unwrap();
        let layout = DatabaseLayout::new(dir.path().join("db"))
            .with_transaction_logs_directory(dir.path().join("logs"));
        MetaDataStore::create(layout.metadata_store(), StoreId::new(7, 7)).unwrap();
        (dir, layout)
    }

    fn tx(id: TransactionId) -> CommittedTransaction {
        CommittedTransaction::new(id, id as i64, vec![id as u8; 16])
    }

    fn entries(path: &Path) -> Vec<LogEntry> {
        let mut reader = SegmentReader::open(path).unwrap();
        let mut out = Vec::new();
        while let Some(entry) = reader.next_entry().unwrap() {
            out.push(entry);
        }
        out
    }

    fn last_committed(layout: &DatabaseLayout) -> TransactionId {
        MetaDataStore::open(layout.metadata_store())
            .unwrap()
            .last_committed_tx_id()
            .unwrap()
    }

    #[test]
    fn test_writes_in_order_and_records_last_committed() {
        let (_dir, layout) = setup();
        let factory = LogCatchupWriterFactory::default();

        let mut writer = factory
            .create(&layout, 43, WriterOptions::catch_up(false, false))
            .unwrap();
        writer.on_tx_received(tx(43)).unwrap();
        writer.on_tx_received(tx(44)).unwrap();
        assert_eq!(writer.last_tx_id(), Some(44));
        writer.close().unwrap();

        let files = TransactionLogFiles::new(layout.transaction_logs_directory());
        let path = files.segment_path(0);
        assert_eq!(SegmentReader::open(&path).unwrap().header().previous_tx_id, 42);
        assert_eq!(
            entries(&path),
            vec![LogEntry::Transaction(tx(43)), LogEntry::Transaction(tx(44))]
        );
        assert_eq!(last_committed(&layout), 44);
    }

    #[test]
    fn test_rejects_gap() {
        let (_dir, layout) = setup();
        let mut writer = LogCatchupWriterFactory::default()
            .create(&layout, 10, WriterOptions::default())
            .unwrap();

        assert!(matches!(
            writer.on_tx_received(tx(11)),
            Err(StoreError::OutOfOrder { expected: 10, got: 11 })
        ));
        assert_eq!(writer.last_tx_id(), None);
    }

    #[test]
    fn test_rejects_bad_checksum() {
        let (_dir, layout) = setup();
        let mut writer = LogCatchupWriterFactory::default()
            .create(&layout, 1, WriterOptions::default())
            .unwrap();
        let mut bad = tx(1);
        bad.payload = vec![0xFF; 3].into();

        assert!(matches!(
            writer.on_tx_received(bad),
            Err(StoreError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_base_start_expects_first_real_transaction() {
        let (_dir, layout) = setup();
        let mut writer = LogCatchupWriterFactory::default()
            .create(&layout, BASE_TX_ID, WriterOptions::default())
            .unwrap();

        writer.on_tx_received(tx(1)).unwrap();
        writer.close().unwrap();
        assert_eq!(last_committed(&layout), 1);
    }

    #[test]
    fn test_keep_logs_in_store_dir() {
        let (_dir, layout) = setup();
        let writer = LogCatchupWriterFactory::default()
            .create(&layout, 1, WriterOptions::catch_up(true, false))
            .unwrap();
        assert_eq!(writer.directory(), layout.database_directory());

        let writer = LogCatchupWriterFactory::default()
            .create(&layout, 1, WriterOptions::catch_up(false, false))
            .unwrap();
        assert_eq!(writer.directory(), layout.transaction_logs_directory());
    }

    #[test]
    fn test_empty_catch_up_segment_removed() {
        let (_dir, layout) = setup();
        let writer = LogCatchupWriterFactory::default()
            .create(&layout, 5, WriterOptions::catch_up(false, false))
            .unwrap();
        writer.close().unwrap();

        let files = TransactionLogFiles::new(layout.transaction_logs_directory());
        assert!(files.versions().unwrap().is_empty());
        assert_eq!(last_committed(&layout), BASE_TX_ID);
    }

    #[test]
    fn test_store_copy_writes_checkpoint() {
        let (_dir, layout) = setup();
        let mut writer = LogCatchupWriterFactory::default()
            .create(&layout, 500, WriterOptions::store_copy())
            .unwrap();
        writer.on_tx_received(tx(500)).unwrap();
        writer.on_tx_received(tx(501)).unwrap();
        writer.close().unwrap();

        let files = TransactionLogFiles::new(layout.database_directory());
        assert_eq!(
            entries(&files.segment_path(0)),
            vec![
                LogEntry::Transaction(tx(500)),
                LogEntry::Transaction(tx(501)),
                LogEntry::Checkpoint { last_tx_id: 501 },
            ]
        );
        assert_eq!(last_committed(&layout), 501);
    }

    #[test]
    fn test_store_copy_without_transactions_keeps_checkpoint() {
        let (_dir, layout) = setup();
        let writer = LogCatchupWriterFactory::default()
            .create(&layout, 500, WriterOptions::store_copy())
            .unwrap();
        writer.close().unwrap();

        let files = TransactionLogFiles::new(layout.database_directory());
        assert_eq!(
            entries(&files.segment_path(0)),
            vec![LogEntry::Checkpoint { last_tx_id: 499 }]
        );
    }

    #[test]
    fn test_forced_rotation() {
        let (_dir, layout) = setup();
        let factory = LogCatchupWriterFactory::new(LogConfig {
            rotation_threshold: 1,
        });
        let mut writer = factory
            .create(&layout, 1, WriterOptions::catch_up(false, true))
            .unwrap();
        for id in 1..=3 {
            writer.on_tx_received(tx(id)).unwrap();
        }
        writer.close().unwrap();

        let files = TransactionLogFiles::new(layout.transaction_logs_directory());
        assert_eq!(files.versions().unwrap(), vec![0, 1, 2]);
        for (version, id) in [(0, 1), (1, 2), (2, 3)] {
            let path = files.segment_path(version);
            assert_eq!(SegmentReader::open(&path).unwrap().header().previous_tx_id, id - 1);
            assert_eq!(entries(&path), vec![LogEntry::Transaction(tx(id))]);
        }
    }

    #[test]
    fn test_no_rotation_unless_forced() {
        let (_dir, layout) = setup();
        let factory = LogCatchupWriterFactory::new(LogConfig {
            rotation_threshold: 1,
        });
        let mut writer = factory
            .create(&layout, 1, WriterOptions::catch_up(false, false))
            .unwrap();
        for id in 1..=3 {
            writer.on_tx_received(tx(id)).unwrap();
        }
        writer.close().unwrap();

        let files = TransactionLogFiles::new(layout.transaction_logs_directory());
        assert_eq!(files.versions().unwrap(), vec![0]);
    }

    #[test]
    fn test_new_writer_starts_new_segment() {
        let (_dir, layout) = setup();
        let factory = LogCatchupWriterFactory::default();

        let mut first = factory.create(&layout, 1, WriterOptions::default()).unwrap();
        first.on_tx_received(tx(1)).unwrap();
        first.close().unwrap();

        let mut second = factory.create(&layout, 2, WriterOptions::default()).unwrap();
        second.on_tx_received(tx(2)).unwrap();
        second.close().unwrap();

        let files = TransactionLogFiles::new(layout.transaction_logs_directory());
        assert_eq!(files.versions().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_drop_closes_writer() {
        let (_dir, layout) = setup();
        {
            let mut writer = LogCatchupWriterFactory::default()
                .create(&layout, 1, WriterOptions::default())
                .unwrap();
            writer.on_tx_received(tx(1)).unwrap();
            writer.on_tx_received(tx(2)).unwrap();
        }

        assert_eq!(last_committed(&layout), 2);
        let files = TransactionLogFiles::new(layout.transaction_logs_directory());
        assert_eq!(entries(&files.segment_path(0)).len(), 2);
    }

    #[test]
    fn test_missing_metadata_store() {
        let dir = TempDir::new().unwrap();
        let layout = DatabaseLayout::new(dir.path());

        assert!(matches!(
            LogCatchupWriterFactory::default().create(&layout, 1, WriterOptions::default()),
            Err(StoreError::MissingFile(_))
        ));
    }
}
