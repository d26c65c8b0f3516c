//! The remote store: brings a local store up to date with a peer.
//!
//! Two entry points. [`RemoteStore::try_catching_up`] resumes transaction
//! replication from wherever the local files say it stopped.
//! [`RemoteStore::copy`] replaces the store with a fresh file-level copy and
//! then replays the transactions committed while the copy was running.

use std::sync::Arc;

use catchup_client::{
    CatchupAddressProvider, NoopMonitor, PeerAddress, StoreCopyClient, StoreCopyClientMonitor,
    TxPullClient,
};
use catchup_core::{CatchupResult, CommitState, StoreId, TransactionId, BASE_TX_ID};
use catchup_store::{
    CatchupWriter, CommitStateHelper, DatabaseLayout, StreamToDiskProvider,
    TransactionLogCatchupFactory, WriterOptions,
};
use tracing::{info, warn};

use crate::config::CatchupConfig;
use crate::error::{CatchupError, Result, StoreCopyFailure};

/// Entry point for catching a store up with a peer.
pub struct RemoteStore<S, P, F>
where
    S: StoreCopyClient,
    P: TxPullClient,
    F: TransactionLogCatchupFactory,
{
    store_copy_client: S,
    tx_pull_client: P,
    writer_factory: F,
    commit_state_helper: CommitStateHelper,
    monitor: Arc<dyn StoreCopyClientMonitor>,
    config: CatchupConfig,
}

impl<S, P, F> RemoteStore<S, P, F>
where
    S: StoreCopyClient,
    P: TxPullClient,
    F: TransactionLogCatchupFactory,
{
    pub fn new(store_copy_client: S, tx_pull_client: P, writer_factory: F, config: CatchupConfig) -> Self {
        Self {
            store_copy_client,
            tx_pull_client,
            writer_factory,
            commit_state_helper: CommitStateHelper::new(),
            monitor: Arc::new(NoopMonitor),
            config,
        }
    }

    /// Report pull progress to `monitor`.
    pub fn with_monitor(mut self, monitor: Arc<dyn StoreCopyClientMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn config(&self) -> &CatchupConfig {
        &self.config
    }

    /// Resume transaction replication into an existing local store.
    ///
    /// The log tail is authoritative when present. Without one, replication
    /// restarts at the metadata's last committed transaction; if the peer has
    /// pruned that far back, exactly one more attempt is made at the next id
    /// and its outcome is returned as is.
    pub async fn try_catching_up(
        &self,
        from: &PeerAddress,
        expected_store_id: StoreId,
        layout: &DatabaseLayout,
        keep_tx_logs_in_dir: bool,
        force_transaction_rotation: bool,
    ) -> Result<CatchupResult> {
        let commit_state = self.commit_state_helper.get_store_state(layout)?;
        info!(%commit_state, "store commit state");

        let options = WriterOptions::catch_up(keep_tx_logs_in_dir, force_transaction_rotation);
        let pull = move |start: TransactionId| {
            self.pull_transactions(from, expected_store_id, layout, start, options)
        };

        match resume_point(&commit_state) {
            ResumePoint::Exact(start) => pull(start).await,
            ResumePoint::Committed(meta) => {
                let result = pull(meta).await?;
                if result != CatchupResult::TransactionPruned {
                    return Ok(result);
                }
                info!(
                    pruned_tx_id = meta,
                    %from,
                    "last committed transaction is pruned on peer, retrying from the next one"
                );
                pull(meta + 1).await
            }
        }
    }

    /// Copy the store from a peer into `destination`, then replay.
    ///
    /// Returns the transaction the copied files were flushed up to. On
    /// failure the destination is left as it is and must be recopied.
    ///
    /// There is no rotation toggle: the replay always runs with
    /// [`WriterOptions::store_copy`], which keeps logs in the store
    /// directory and forces rotation, since no database is running to
    /// rotate them.
    pub async fn copy(
        &self,
        addresses: &dyn CatchupAddressProvider,
        expected_store_id: StoreId,
        destination: &DatabaseLayout,
    ) -> Result<TransactionId> {
        let sink = StreamToDiskProvider::new(destination.database_directory());
        let budget = self.config.store_copy_budget();

        let last_flushed_tx_id = self
            .store_copy_client
            .copy_store_files(
                addresses,
                expected_store_id,
                &sink,
                &budget,
                destination.database_directory(),
            )
            .await?;
        info!(last_flushed_tx_id, "store files need to be recovered");

        let primary = addresses.primary()?;
        let result = self
            .pull_transactions(
                &primary,
                expected_store_id,
                destination,
                last_flushed_tx_id,
                WriterOptions::store_copy(),
            )
            .await?;
        if result != CatchupResult::SuccessEndOfStream {
            return Err(StoreCopyFailure::PullIncomplete(result).into());
        }

        Ok(last_flushed_tx_id)
    }

    /// Ask a peer which store it serves.
    pub async fn get_store_id(&self, from: &PeerAddress) -> Result<StoreId> {
        self.store_copy_client
            .fetch_store_id(from)
            .await
            .map_err(CatchupError::StoreIdDownloadFailed)
    }

    async fn pull_transactions(
        &self,
        from: &PeerAddress,
        expected_store_id: StoreId,
        layout: &DatabaseLayout,
        from_tx_id: TransactionId,
        options: WriterOptions,
    ) -> Result<CatchupResult> {
        self.monitor.start_receiving_transactions(from_tx_id);
        let previous_tx_id = from_tx_id.saturating_sub(1);

        let mut writer = match self.writer_factory.create(layout, from_tx_id, options) {
            Ok(writer) => writer,
            Err(e) => {
                self.monitor.finish_receiving_transactions(previous_tx_id);
                return Err(e.into());
            }
        };

        info!(%from, from_tx_id, "pulling transactions");
        let pulled = self
            .tx_pull_client
            .pull_transactions(from, expected_store_id, previous_tx_id, &mut writer)
            .await;

        self.monitor
            .finish_receiving_transactions(writer.last_tx_id().unwrap_or(previous_tx_id));
        let closed = writer.close();

        match (pulled, closed) {
            (Ok(result), Ok(())) => Ok(result.catchup_result),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "failed to close catch-up writer after failed pull");
                }
                Err(e.into())
            }
        }
    }
}

/// Where replication resumes, derived from the local commit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResumePoint {
    /// Start exactly here.
    Exact(TransactionId),
    /// Start at the metadata's last committed id, falling back once to the
    /// next id if that one is pruned.
    Committed(TransactionId),
}

fn resume_point(state: &CommitState) -> ResumePoint {
    match state.transaction_log_index() {
        Some(log_index) => ResumePoint::Exact(log_index + 1),
        None if state.meta_data_store_index() == BASE_TX_ID => {
            ResumePoint::Exact(BASE_TX_ID + 1)
        }
        None => ResumePoint::Committed(state.meta_data_store_index()),
    }
}
