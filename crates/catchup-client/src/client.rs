//! Store copy and transaction pull clients.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use catchup_core::{FileHeader, StoreId, TransactionId, TxPullRequestResult};
use catchup_store::{StoreError, StoreFileStreamProvider, TxPullResponseListener};
use tracing::{debug, info, warn};

use crate::address::{CatchupAddressProvider, PeerAddress};
use crate::error::{ClientError, Result};
use crate::messages::{PrepareStoreCopyStatus, StoreCopyStatus};
use crate::monitor::{NoopMonitor, StoreCopyClientMonitor};
use crate::timeout::{ExponentialBackoff, MaximumTotalTime, TerminationCondition};
use crate::transport::CatchupChannel;

/// Copies store files from a peer.
#[async_trait]
pub trait StoreCopyClient: Send + Sync {
    /// Ask a peer for the id of the store it serves.
    async fn fetch_store_id(&self, from: &PeerAddress) -> Result<StoreId>;

    /// Copy every store file into `sink`, each under its own `budget`.
    ///
    /// Returns the transaction id the copied files are consistent with.
    async fn copy_store_files(
        &self,
        addresses: &dyn CatchupAddressProvider,
        expected_store_id: StoreId,
        sink: &dyn StoreFileStreamProvider,
        budget: &MaximumTotalTime,
        destination: &Path,
    ) -> Result<TransactionId>;
}

/// Streams transactions from a peer.
#[async_trait]
pub trait TxPullClient: Send + Sync {
    /// Pull every transaction after `previous_tx_id` into `listener`.
    async fn pull_transactions(
        &self,
        from: &PeerAddress,
        expected_store_id: StoreId,
        previous_tx_id: TransactionId,
        listener: &mut dyn TxPullResponseListener,
    ) -> Result<TxPullRequestResult>;
}

#[async_trait]
impl<T: StoreCopyClient + ?Sized> StoreCopyClient for Arc<T> {
    async fn fetch_store_id(&self, from: &PeerAddress) -> Result<StoreId> {
        (**self).fetch_store_id(from).await
    }

    async fn copy_store_files(
        &self,
        addresses: &dyn CatchupAddressProvider,
        expected_store_id: StoreId,
        sink: &dyn StoreFileStreamProvider,
        budget: &MaximumTotalTime,
        destination: &Path,
    ) -> Result<TransactionId> {
        (**self)
            .copy_store_files(addresses, expected_store_id, sink, budget, destination)
            .await
    }
}

#[async_trait]
impl<T: TxPullClient + ?Sized> TxPullClient for Arc<T> {
    async fn pull_transactions(
        &self,
        from: &PeerAddress,
        expected_store_id: StoreId,
        previous_tx_id: TransactionId,
        listener: &mut dyn TxPullResponseListener,
    ) -> Result<TxPullRequestResult> {
        (**self)
            .pull_transactions(from, expected_store_id, previous_tx_id, listener)
            .await
    }
}

/// Configuration for the catch-up client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Delay before the first retry of a failed file request.
    pub initial_backoff: Duration,
    /// Upper bound for the delay between retries.
    pub max_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Implements both client capabilities on top of a [`CatchupChannel`].
pub struct CatchupClient<C: CatchupChannel> {
    channel: C,
    config: ClientConfig,
    monitor: Arc<dyn StoreCopyClientMonitor>,
}

impl<C: CatchupChannel> CatchupClient<C> {
    pub fn new(channel: C, config: ClientConfig) -> Self {
        Self {
            channel,
            config,
            monitor: Arc::new(NoopMonitor),
        }
    }

    /// Report file progress to `monitor`.
    pub fn with_monitor(mut self, monitor: Arc<dyn StoreCopyClientMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Request one file, retrying retryable failures until the budget runs
    /// out. Retries go to the provider's secondary address.
    async fn copy_file(
        &self,
        addresses: &dyn CatchupAddressProvider,
        expected_store_id: StoreId,
        sink: &dyn StoreFileStreamProvider,
        header: &FileHeader,
        condition: TerminationCondition,
    ) -> Result<TransactionId> {
        let mut backoff = ExponentialBackoff::new(self.config.initial_backoff, self.config.max_backoff);
        let mut address = addresses.primary()?;

        loop {
            let error = match self.request_file(&address, expected_store_id, sink, header).await {
                Ok(tx_id) => return Ok(tx_id),
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            if !condition.can_continue() {
                return Err(ClientError::RetryBudgetExhausted {
                    file_name: header.file_name().to_string(),
                    budget: condition.budget(),
                    last_error: error.to_string(),
                });
            }

            let delay = backoff.next_delay().min(condition.remaining());
            warn!(
                file = header.file_name(),
                %address,
                error = %error,
                ?delay,
                elapsed = ?condition.elapsed(),
                "store file request failed, retrying"
            );
            tokio::time::sleep(delay).await;

            match addresses.secondary() {
                Ok(next) => address = next,
                Err(e) => warn!(error = %e, %address, "no secondary address, retrying same peer"),
            }
        }
    }

    async fn request_file(
        &self,
        address: &PeerAddress,
        expected_store_id: StoreId,
        sink: &dyn StoreFileStreamProvider,
        header: &FileHeader,
    ) -> Result<TransactionId> {
        let mut stream = sink.acquire(header)?;
        let response = self
            .channel
            .get_store_file(address, expected_store_id, header, stream.as_mut())
            .await?;

        match response.status {
            StoreCopyStatus::Success => {
                stream.finish()?;
                Ok(response.last_checkpointed_tx_id)
            }
            StoreCopyStatus::StoreIdMismatch => Err(ClientError::StoreIdMismatch {
                expected: expected_store_id,
            }),
            status => Err(ClientError::FileRequestFailed {
                file_name: header.file_name().to_string(),
                status,
            }),
        }
    }
}

#[async_trait]
impl<C: CatchupChannel> StoreCopyClient for CatchupClient<C> {
    async fn fetch_store_id(&self, from: &PeerAddress) -> Result<StoreId> {
        let store_id = self.channel.get_store_id(from).await?;
        debug!(%from, %store_id, "fetched store id");
        Ok(store_id)
    }

    async fn copy_store_files(
        &self,
        addresses: &dyn CatchupAddressProvider,
        expected_store_id: StoreId,
        sink: &dyn StoreFileStreamProvider,
        budget: &MaximumTotalTime,
        destination: &Path,
    ) -> Result<TransactionId> {
        std::fs::create_dir_all(destination).map_err(StoreError::from)?;

        let primary = addresses.primary()?;
        let prepare = self
            .channel
            .prepare_store_copy(&primary, expected_store_id)
            .await?;
        match prepare.status {
            PrepareStoreCopyStatus::Success => {}
            PrepareStoreCopyStatus::StoreIdMismatch => {
                return Err(ClientError::StoreIdMismatch {
                    expected: expected_store_id,
                });
            }
            PrepareStoreCopyStatus::ListingFailed => {
                return Err(ClientError::PrepareFailed(format!(
                    "{} could not list its store files",
                    primary
                )));
            }
        }
        info!(
            %primary,
            destination = %destination.display(),
            files = prepare.files.len(),
            last_checkpointed_tx_id = prepare.last_checkpointed_tx_id,
            "copying store files"
        );

        self.monitor.start_receiving_store_files();
        let mut last_tx_id = prepare.last_checkpointed_tx_id;
        for header in &prepare.files {
            self.monitor.start_receiving_store_file(header.file_name());
            let tx_id = self
                .copy_file(addresses, expected_store_id, sink, header, budget.start())
                .await?;
            last_tx_id = last_tx_id.max(tx_id);
            self.monitor.finish_receiving_store_file(header.file_name());
        }
        self.monitor.finish_receiving_store_files();

        Ok(last_tx_id)
    }
}

#[async_trait]
impl<C: CatchupChannel> TxPullClient for CatchupClient<C> {
    async fn pull_transactions(
        &self,
        from: &PeerAddress,
        expected_store_id: StoreId,
        previous_tx_id: TransactionId,
        listener: &mut dyn TxPullResponseListener,
    ) -> Result<TxPullRequestResult> {
        let response = self
            .channel
            .pull_transactions(from, expected_store_id, previous_tx_id, listener)
            .await?;
        debug!(
            %from,
            previous_tx_id,
            status = %response.status,
            latest_tx_id = response.latest_tx_id,
            "transaction pull finished"
        );
        Ok(TxPullRequestResult::new(response.status, response.latest_tx_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{PrioritisedAddressProvider, SingleAddressProvider};
    use crate::transport::memory::{MemoryChannel, MemoryNetwork, MemoryPeer};
    use catchup_core::CommittedTransaction;
    use catchup_store::StreamToDiskProvider;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const STORE: StoreId = StoreId::new(1_700_000_000_000, 42);

    #[derive(Default)]
    struct RecordingMonitor(Mutex<Vec<String>>);

    impl StoreCopyClientMonitor for RecordingMonitor {
        fn start_receiving_store_files(&self) {
            self.0.lock().unwrap().push("start".into());
        }
        fn finish_receiving_store_files(&self) {
            self.0.lock().unwrap().push("finish".into());
        }
        fn finish_receiving_store_file(&self, file_name: &str) {
            self.0.lock().unwrap().push(file_name.into());
        }
    }

    async fn setup() -> (Arc<MemoryNetwork>, Arc<MemoryPeer>, PeerAddress) {
        let network = MemoryNetwork::new();
        let peer = Arc::new(MemoryPeer::new(STORE));
        peer.add_file(FileHeader::new("nodes.store"), b"node data".to_vec())
            .await;
        peer.add_file(
            FileHeader::with_alignment("labels.store", 8).unwrap(),
            b"label".to_vec(),
        )
        .await;
        peer.set_last_checkpointed_tx_id(500).await;
        let address = PeerAddress::new("core-1", 6000);
        network.register(address.clone(), Arc::clone(&peer)).await;
        (network, peer, address)
    }

    fn client(network: &Arc<MemoryNetwork>) -> CatchupClient<MemoryChannel> {
        CatchupClient::new(network.channel(), ClientConfig::default())
    }

    #[tokio::test]
    async fn test_copy_store_files() {
        let (network, _peer, address) = setup().await;
        let dir = TempDir::new().unwrap();
        let monitor = Arc::new(RecordingMonitor::default());
        let client = client(&network).with_monitor(monitor.clone());

        let tx_id = client
            .copy_store_files(
                &SingleAddressProvider::new(address),
                STORE,
                &StreamToDiskProvider::new(dir.path()),
                &MaximumTotalTime::from_secs(10),
                dir.path(),
            )
            .await
            .unwrap();

        assert_eq!(tx_id, 500);
        assert_eq!(std::fs::read(dir.path().join("nodes.store")).unwrap(), b"node data");
        assert_eq!(
            std::fs::read(dir.path().join("labels.store")).unwrap(),
            b"label\0\0\0"
        );
        assert_eq!(
            *monitor.0.lock().unwrap(),
            vec!["start", "nodes.store", "labels.store", "finish"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_broken_transfer_retried_on_secondary() {
        let (network, peer, address) = setup().await;
        let secondary = PeerAddress::new("core-2", 6000);
        network.register(secondary.clone(), Arc::clone(&peer)).await;
        peer.fail_next_file_requests(2).await;
        let dir = TempDir::new().unwrap();

        let tx_id = client(&network)
            .copy_store_files(
                &PrioritisedAddressProvider::new(address, vec![secondary]),
                STORE,
                &StreamToDiskProvider::new(dir.path()),
                &MaximumTotalTime::from_secs(60),
                dir.path(),
            )
            .await
            .unwrap();

        assert_eq!(tx_id, 500);
        assert_eq!(std::fs::read(dir.path().join("nodes.store")).unwrap(), b"node data");
        assert_eq!(peer.file_requests().await, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausted() {
        let (network, peer, address) = setup().await;
        peer.fail_next_file_requests(u32::MAX).await;
        let dir = TempDir::new().unwrap();

        let result = client(&network)
            .copy_store_files(
                &SingleAddressProvider::new(address),
                STORE,
                &StreamToDiskProvider::new(dir.path()),
                &MaximumTotalTime::from_secs(5),
                dir.path(),
            )
            .await;

        match result {
            Err(ClientError::RetryBudgetExhausted { file_name, budget, .. }) => {
                assert_eq!(file_name, "nodes.store");
                assert_eq!(budget, Duration::from_secs(5));
            }
            other => panic!("expected exhausted budget, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_id_mismatch_not_retried() {
        let (network, peer, address) = setup().await;
        let dir = TempDir::new().unwrap();

        let result = client(&network)
            .copy_store_files(
                &SingleAddressProvider::new(address),
                StoreId::new(9, 9),
                &StreamToDiskProvider::new(dir.path()),
                &MaximumTotalTime::from_secs(5),
                dir.path(),
            )
            .await;

        assert!(matches!(result, Err(ClientError::StoreIdMismatch { .. })));
        assert_eq!(peer.file_requests().await, 0);
    }

    #[tokio::test]
    async fn test_local_sink_failure_not_retried() {
        let (network, peer, address) = setup().await;
        peer.add_file(FileHeader::new("../escape"), b"x".to_vec()).await;
        let dir = TempDir::new().unwrap();

        let result = client(&network)
            .copy_store_files(
                &SingleAddressProvider::new(address),
                STORE,
                &StreamToDiskProvider::new(dir.path()),
                &MaximumTotalTime::from_secs(5),
                dir.path(),
            )
            .await;

        assert!(matches!(result, Err(ClientError::Store(StoreError::InvalidData(_)))));
        assert_eq!(peer.file_requests().await, 2);
    }

    #[tokio::test]
    async fn test_unreachable_primary_fails_prepare() {
        let network = MemoryNetwork::new();
        let dir = TempDir::new().unwrap();

        let result = client(&network)
            .copy_store_files(
                &SingleAddressProvider::new(PeerAddress::new("gone", 1)),
                STORE,
                &StreamToDiskProvider::new(dir.path()),
                &MaximumTotalTime::from_secs(5),
                dir.path(),
            )
            .await;

        assert!(matches!(result, Err(ClientError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_fetch_store_id_and_pull() {
        let (network, peer, address) = setup().await;
        for id in 1..=3 {
            peer.append_transaction(CommittedTransaction::new(id, 0, vec![0])).await;
        }
        let client = client(&network);

        assert_eq!(client.fetch_store_id(&address).await.unwrap(), STORE);

        struct Count(usize);
        impl TxPullResponseListener for Count {
            fn on_tx_received(&mut self, _tx: CommittedTransaction) -> catchup_store::Result<()> {
                self.0 += 1;
                Ok(())
            }
        }
        let mut count = Count(0);
        let result = client
            .pull_transactions(&address, STORE, 1, &mut count)
            .await
            .unwrap();

        assert!(result.catchup_result.is_success());
        assert_eq!(result.last_tx_id, 3);
        assert_eq!(count.0, 2);
    }
}
