//! Scripted test doubles for the catch-up capabilities.
//!
//! Every double records what it was asked to do into an [`EventLog`] so a
//! test can assert both the calls made and their relative order.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use catchup_client::{
    CatchupAddressProvider, ClientError, MaximumTotalTime, PeerAddress, StoreCopyClient,
    StoreCopyClientMonitor, TxPullClient,
};
use catchup_core::{CatchupResult, CommittedTransaction, StoreId, TransactionId, TxPullRequestResult};
use catchup_store::{
    CatchupWriter, DatabaseLayout, StoreError, StoreFileStreamProvider,
    TransactionLogCatchupFactory, TxPullResponseListener, WriterOptions,
};

/// Something a double observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StartReceivingStoreFiles,
    FinishReceivingStoreFiles,
    StartReceivingTransactions(TransactionId),
    FinishReceivingTransactions(TransactionId),
    WriterCreated {
        from_tx_id: TransactionId,
        options: WriterOptions,
    },
    TxApplied(TransactionId),
    WriterClosed {
        last_tx_id: Option<TransactionId>,
    },
    Pull {
        from: PeerAddress,
        previous_tx_id: TransactionId,
    },
    CopyStoreFiles {
        budget: Duration,
    },
}

/// Shared, ordered record of [`Event`]s.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.lock().push(event);
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// The `previous_tx_id` of every pull, in order.
    pub fn pulls(&self) -> Vec<TransactionId> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                Event::Pull { previous_tx_id, .. } => Some(*previous_tx_id),
                _ => None,
            })
            .collect()
    }

    pub fn writers_created(&self) -> Vec<(TransactionId, WriterOptions)> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                Event::WriterCreated { from_tx_id, options } => Some((*from_tx_id, *options)),
                _ => None,
            })
            .collect()
    }

    pub fn writers_closed(&self) -> usize {
        self.lock()
            .iter()
            .filter(|e| matches!(e, Event::WriterClosed { .. }))
            .count()
    }

    /// Position of the first event equal to `event`.
    pub fn position(&self, event: &Event) -> Option<usize> {
        self.lock().iter().position(|e| e == event)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Monitor that records progress events.
#[derive(Debug, Clone)]
pub struct RecordingMonitor {
    log: EventLog,
}

impl RecordingMonitor {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl StoreCopyClientMonitor for RecordingMonitor {
    fn start_receiving_store_files(&self) {
        self.log.push(Event::StartReceivingStoreFiles);
    }

    fn finish_receiving_store_files(&self) {
        self.log.push(Event::FinishReceivingStoreFiles);
    }

    fn start_receiving_transactions(&self, start_tx_id: TransactionId) {
        self.log.push(Event::StartReceivingTransactions(start_tx_id));
    }

    fn finish_receiving_transactions(&self, end_tx_id: TransactionId) {
        self.log.push(Event::FinishReceivingTransactions(end_tx_id));
    }
}

/// Writer factory that keeps nothing on disk.
#[derive(Debug, Clone)]
pub struct RecordingWriterFactory {
    log: EventLog,
    fail_create: bool,
}

impl RecordingWriterFactory {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail_create: false,
        }
    }

    /// Make every `create` fail with a missing metadata store.
    pub fn failing(log: EventLog) -> Self {
        Self {
            log,
            fail_create: true,
        }
    }
}

impl TransactionLogCatchupFactory for RecordingWriterFactory {
    type Writer = RecordingWriter;

    fn create(
        &self,
        layout: &DatabaseLayout,
        from_tx_id: TransactionId,
        options: WriterOptions,
    ) -> catchup_store::Result<RecordingWriter> {
        if self.fail_create {
            return Err(StoreError::MissingFile(layout.metadata_store()));
        }
        self.log.push(Event::WriterCreated {
            from_tx_id,
            options,
        });
        Ok(RecordingWriter {
            log: self.log.clone(),
            last_tx_id: None,
            closed: false,
        })
    }
}

/// Writer produced by [`RecordingWriterFactory`].
#[derive(Debug)]
pub struct RecordingWriter {
    log: EventLog,
    last_tx_id: Option<TransactionId>,
    closed: bool,
}

impl RecordingWriter {
    fn record_close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.log.push(Event::WriterClosed {
                last_tx_id: self.last_tx_id,
            });
        }
    }
}

impl TxPullResponseListener for RecordingWriter {
    fn on_tx_received(&mut self, tx: CommittedTransaction) -> catchup_store::Result<()> {
        self.log.push(Event::TxApplied(tx.tx_id));
        self.last_tx_id = Some(tx.tx_id);
        Ok(())
    }
}

impl CatchupWriter for RecordingWriter {
    fn last_tx_id(&self) -> Option<TransactionId> {
        self.last_tx_id
    }

    fn close(mut self) -> catchup_store::Result<()> {
        self.record_close();
        Ok(())
    }
}

impl Drop for RecordingWriter {
    fn drop(&mut self) {
        self.record_close();
    }
}

/// One scripted answer of a [`ScriptedTxPullClient`].
#[derive(Debug, Clone)]
pub enum PullScript {
    /// Deliver the transactions, then finish with `result`.
    Respond {
        result: CatchupResult,
        deliver: Vec<CommittedTransaction>,
    },
    /// Deliver the transactions, then fail with a transport error.
    Fail {
        deliver: Vec<CommittedTransaction>,
        message: String,
    },
}

impl PullScript {
    pub fn result(result: CatchupResult) -> Self {
        PullScript::Respond {
            result,
            deliver: Vec::new(),
        }
    }

    pub fn deliver(result: CatchupResult, deliver: Vec<CommittedTransaction>) -> Self {
        PullScript::Respond { result, deliver }
    }

    pub fn fail_after(deliver: Vec<CommittedTransaction>, message: impl Into<String>) -> Self {
        PullScript::Fail {
            deliver,
            message: message.into(),
        }
    }
}

/// Transaction pull client answering from a script.
///
/// Once the script runs out every pull succeeds without transactions.
#[derive(Debug, Clone)]
pub struct ScriptedTxPullClient {
    log: EventLog,
    script: Arc<Mutex<VecDeque<PullScript>>>,
}

impl ScriptedTxPullClient {
    pub fn new(log: EventLog, script: impl IntoIterator<Item = PullScript>) -> Self {
        Self {
            log,
            script: Arc::new(Mutex::new(script.into_iter().collect())),
        }
    }

    fn next_script(&self) -> Option<PullScript> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }
}

#[async_trait]
impl TxPullClient for ScriptedTxPullClient {
    async fn pull_transactions(
        &self,
        from: &PeerAddress,
        _expected_store_id: StoreId,
        previous_tx_id: TransactionId,
        listener: &mut dyn TxPullResponseListener,
    ) -> catchup_client::Result<TxPullRequestResult> {
        self.log.push(Event::Pull {
            from: from.clone(),
            previous_tx_id,
        });

        let script = self
            .next_script()
            .unwrap_or_else(|| PullScript::result(CatchupResult::SuccessEndOfStream));

        let (deliver, outcome) = match script {
            PullScript::Respond { result, deliver } => (deliver, Ok(result)),
            PullScript::Fail { deliver, message } => (deliver, Err(message)),
        };

        let mut last_tx_id = previous_tx_id;
        for tx in deliver {
            last_tx_id = tx.tx_id;
            listener.on_tx_received(tx)?;
        }

        match outcome {
            Ok(result) => Ok(TxPullRequestResult::new(result, last_tx_id)),
            Err(message) => Err(ClientError::Transport(message)),
        }
    }
}

/// Store copy client with canned answers.
#[derive(Debug, Clone)]
pub struct StubStoreCopyClient {
    log: EventLog,
    store_id: Option<StoreId>,
    last_flushed_tx_id: Option<TransactionId>,
}

impl StubStoreCopyClient {
    /// Serve `store_id`; copies report `last_flushed_tx_id`.
    pub fn new(log: EventLog, store_id: StoreId, last_flushed_tx_id: TransactionId) -> Self {
        Self {
            log,
            store_id: Some(store_id),
            last_flushed_tx_id: Some(last_flushed_tx_id),
        }
    }

    /// Every request fails as if the peer were down.
    pub fn unreachable(log: EventLog) -> Self {
        Self {
            log,
            store_id: None,
            last_flushed_tx_id: None,
        }
    }
}

#[async_trait]
impl StoreCopyClient for StubStoreCopyClient {
    async fn fetch_store_id(&self, from: &PeerAddress) -> catchup_client::Result<StoreId> {
        self.store_id
            .ok_or_else(|| ClientError::Unreachable(from.clone()))
    }

    async fn copy_store_files(
        &self,
        addresses: &dyn CatchupAddressProvider,
        _expected_store_id: StoreId,
        _sink: &dyn StoreFileStreamProvider,
        budget: &MaximumTotalTime,
        _destination: &Path,
    ) -> catchup_client::Result<TransactionId> {
        self.log.push(Event::CopyStoreFiles {
            budget: budget.budget(),
        });
        match self.last_flushed_tx_id {
            Some(tx_id) => Ok(tx_id),
            None => Err(ClientError::Unreachable(addresses.primary()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_records_close_once() {
        let log = EventLog::new();
        let factory = RecordingWriterFactory::new(log.clone());
        let writer = factory
            .create(&DatabaseLayout::new("/tmp/x"), 5, WriterOptions::store_copy())
            .unwrap();
        writer.close().unwrap();

        assert_eq!(log.writers_closed(), 1);
        assert_eq!(log.writers_created(), vec![(5, WriterOptions::store_copy())]);
    }

    #[test]
    fn test_dropped_writer_records_close() {
        let log = EventLog::new();
        let factory = RecordingWriterFactory::new(log.clone());
        drop(factory.create(&DatabaseLayout::new("/tmp/x"), 1, WriterOptions::default()));

        assert_eq!(log.writers_closed(), 1);
    }

    #[tokio::test]
    async fn test_scripted_pull_runs_in_order() {
        let log = EventLog::new();
        let client = ScriptedTxPullClient::new(
            log.clone(),
            [
                PullScript::result(CatchupResult::TransactionPruned),
                PullScript::deliver(
                    CatchupResult::SuccessEndOfStream,
                    vec![CommittedTransaction::new(8, 0, vec![])],
                ),
            ],
        );
        let mut writer = RecordingWriterFactory::new(log.clone())
            .create(&DatabaseLayout::new("/tmp/x"), 7, WriterOptions::default())
            .unwrap();
        let from = PeerAddress::new("a", 1);

        let first = client
            .pull_transactions(&from, StoreId::new(1, 1), 6, &mut writer)
            .await
            .unwrap();
        let second = client
            .pull_transactions(&from, StoreId::new(1, 1), 7, &mut writer)
            .await
            .unwrap();
        let third = client
            .pull_transactions(&from, StoreId::new(1, 1), 8, &mut writer)
            .await
            .unwrap();

        assert_eq!(first.catchup_result, CatchupResult::TransactionPruned);
        assert_eq!(second, TxPullRequestResult::new(CatchupResult::SuccessEndOfStream, 8));
        assert_eq!(third.catchup_result, CatchupResult::SuccessEndOfStream);
        assert_eq!(log.pulls(), vec![6, 7, 8]);
        assert_eq!(writer.last_tx_id(), Some(8));
    }
}
