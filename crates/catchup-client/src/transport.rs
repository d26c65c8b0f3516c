//! Transport abstraction for the catch-up protocol.
//!
//! A [`CatchupChannel`] performs single requests against a peer and streams
//! the response payload into local sinks. Retries, budgets and address
//! selection live above it in [`CatchupClient`](crate::CatchupClient).

use async_trait::async_trait;
use catchup_core::{FileHeader, StoreId, TransactionId};
use catchup_store::{StoreFileStream, TxPullResponseListener};

use crate::address::PeerAddress;
use crate::error::Result;
use crate::messages::{PrepareStoreCopyResponse, StoreCopyFinishedResponse, TxStreamFinishedResponse};

/// Request-level access to catch-up peers.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CatchupChannel: Send + Sync {
    /// Ask a peer which store it serves.
    async fn get_store_id(&self, address: &PeerAddress) -> Result<StoreId>;

    /// Ask a peer to list the files of a store copy.
    async fn prepare_store_copy(
        &self,
        address: &PeerAddress,
        expected_store_id: StoreId,
    ) -> Result<PrepareStoreCopyResponse>;

    /// Stream one store file into `sink`.
    ///
    /// The sink is not finished by the channel.
    async fn get_store_file(
        &self,
        address: &PeerAddress,
        expected_store_id: StoreId,
        header: &FileHeader,
        sink: &mut dyn StoreFileStream,
    ) -> Result<StoreCopyFinishedResponse>;

    /// Stream every transaction after `previous_tx_id` into `listener`.
    async fn pull_transactions(
        &self,
        address: &PeerAddress,
        expected_store_id: StoreId,
        previous_tx_id: TransactionId,
        listener: &mut dyn TxPullResponseListener,
    ) -> Result<TxStreamFinishedResponse>;
}

/// An in-process catch-up network for tests and embedding.
///
/// Peers are registered under an address; a [`MemoryChannel`] routes
/// requests to them directly.
pub mod memory {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;

    use bytes::Bytes;
    use catchup_core::{CatchupResult, CommittedTransaction, BASE_TX_ID};
    use tokio::sync::RwLock;

    use crate::error::ClientError;
    use crate::messages::{PrepareStoreCopyStatus, StoreCopyStatus};

    /// Default size of the chunks a peer streams file contents in.
    pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

    /// Shared routing table of the memory network.
    pub struct MemoryNetwork {
        peers: RwLock<HashMap<PeerAddress, Arc<MemoryPeer>>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Serve `peer` at `address`, replacing whatever was there.
        pub async fn register(&self, address: PeerAddress, peer: Arc<MemoryPeer>) {
            self.peers.write().await.insert(address, peer);
        }

        /// Create a channel connected to this network.
        pub fn channel(self: &Arc<Self>) -> MemoryChannel {
            MemoryChannel {
                network: Arc::clone(self),
            }
        }

        async fn peer(&self, address: &PeerAddress) -> Result<Arc<MemoryPeer>> {
            let peer = self
                .peers
                .read()
                .await
                .get(address)
                .cloned()
                .ok_or_else(|| ClientError::Unreachable(address.clone()))?;
            if !peer.state.read().await.available {
                return Err(ClientError::Unreachable(address.clone()));
            }
            Ok(peer)
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                peers: RwLock::new(HashMap::new()),
            }
        }
    }

    struct PeerState {
        files: Vec<(FileHeader, Bytes)>,
        transactions: BTreeMap<TransactionId, CommittedTransaction>,
        /// Lowest transaction id still retained.
        retained_from: TransactionId,
        last_checkpointed_tx_id: TransactionId,
        available: bool,
        failing_file_requests: u32,
        file_requests: u64,
    }

    /// A peer serving one store from memory.
    pub struct MemoryPeer {
        store_id: StoreId,
        chunk_size: usize,
        state: RwLock<PeerState>,
    }

    impl MemoryPeer {
        pub fn new(store_id: StoreId) -> Self {
            Self {
                store_id,
                chunk_size: DEFAULT_CHUNK_SIZE,
                state: RwLock::new(PeerState {
                    files: Vec::new(),
                    transactions: BTreeMap::new(),
                    retained_from: BASE_TX_ID + 1,
                    last_checkpointed_tx_id: BASE_TX_ID,
                    available: true,
                    failing_file_requests: 0,
                    file_requests: 0,
                }),
            }
        }

        pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
            self.chunk_size = chunk_size.max(1);
            self
        }

        pub fn store_id(&self) -> StoreId {
            self.store_id
        }

        /// Add or replace a store file.
        pub async fn add_file(&self, header: FileHeader, contents: impl Into<Bytes>) {
            let contents = contents.into();
            let mut state = self.state.write().await;
            state.files.retain(|(h, _)| h.file_name() != header.file_name());
            state.files.push((header, contents));
        }

        /// Commit a transaction on the peer.
        pub async fn append_transaction(&self, tx: CommittedTransaction) {
            self.state.write().await.transactions.insert(tx.tx_id, tx);
        }

        /// Transaction the peer's store files are consistent with.
        pub async fn set_last_checkpointed_tx_id(&self, tx_id: TransactionId) {
            self.state.write().await.last_checkpointed_tx_id = tx_id;
        }

        /// Drop every transaction before `tx_id` from the retained range.
        pub async fn prune_before(&self, tx_id: TransactionId) {
            let mut state = self.state.write().await;
            state.retained_from = state.retained_from.max(tx_id);
            state.transactions = state.transactions.split_off(&tx_id);
        }

        pub async fn set_available(&self, available: bool) {
            self.state.write().await.available = available;
        }

        /// Break the next `count` file transfers part way through.
        pub async fn fail_next_file_requests(&self, count: u32) {
            self.state.write().await.failing_file_requests = count;
        }

        /// Number of file requests served or failed so far.
        pub async fn file_requests(&self) -> u64 {
            self.state.read().await.file_requests
        }

        pub async fn last_tx_id(&self) -> Option<TransactionId> {
            self.state.read().await.transactions.keys().next_back().copied()
        }
    }

    /// Channel onto a [`MemoryNetwork`].
    #[derive(Clone)]
    pub struct MemoryChannel {
        network: Arc<MemoryNetwork>,
    }

    #[async_trait]
    impl CatchupChannel for MemoryChannel {
        async fn get_store_id(&self, address: &PeerAddress) -> Result<StoreId> {
            Ok(self.network.peer(address).await?.store_id)
        }

        async fn prepare_store_copy(
            &self,
            address: &PeerAddress,
            expected_store_id: StoreId,
        ) -> Result<PrepareStoreCopyResponse> {
            let peer = self.network.peer(address).await?;
            if peer.store_id != expected_store_id {
                return Ok(PrepareStoreCopyResponse::error(
                    PrepareStoreCopyStatus::StoreIdMismatch,
                ));
            }

            let state = peer.state.read().await;
            Ok(PrepareStoreCopyResponse::success(
                state.files.iter().map(|(header, _)| header.clone()).collect(),
                state.last_checkpointed_tx_id,
            ))
        }

        async fn get_store_file(
            &self,
            address: &PeerAddress,
            expected_store_id: StoreId,
            header: &FileHeader,
            sink: &mut dyn StoreFileStream,
        ) -> Result<StoreCopyFinishedResponse> {
            let peer = self.network.peer(address).await?;

            let (contents, checkpoint, fail) = {
                let mut state = peer.state.write().await;
                state.file_requests += 1;
                if peer.store_id != expected_store_id {
                    return Ok(StoreCopyFinishedResponse {
                        status: StoreCopyStatus::StoreIdMismatch,
                        last_checkpointed_tx_id: state.last_checkpointed_tx_id,
                    });
                }
                let fail = state.failing_file_requests > 0;
                if fail {
                    state.failing_file_requests -= 1;
                }
                let contents = state
                    .files
                    .iter()
                    .find(|(h, _)| h.file_name() == header.file_name())
                    .map(|(_, contents)| contents.clone());
                (contents, state.last_checkpointed_tx_id, fail)
            };

            let Some(contents) = contents else {
                return Ok(StoreCopyFinishedResponse {
                    status: StoreCopyStatus::UnknownFile,
                    last_checkpointed_tx_id: checkpoint,
                });
            };

            if fail {
                let half = contents.len() / 2;
                sink.write(&contents[..half])?;
                return Err(ClientError::Transport(format!(
                    "connection reset while sending {}",
                    header.file_name()
                )));
            }

            for chunk in contents.chunks(peer.chunk_size) {
                sink.write(chunk)?;
            }

            Ok(StoreCopyFinishedResponse {
                status: StoreCopyStatus::Success,
                last_checkpointed_tx_id: checkpoint,
            })
        }

        async fn pull_transactions(
            &self,
            address: &PeerAddress,
            expected_store_id: StoreId,
            previous_tx_id: TransactionId,
            listener: &mut dyn TxPullResponseListener,
        ) -> Result<TxStreamFinishedResponse> {
            let peer = self.network.peer(address).await?;
            if peer.store_id != expected_store_id {
                return Ok(TxStreamFinishedResponse {
                    status: CatchupResult::StoreIdMismatch,
                    latest_tx_id: previous_tx_id,
                });
            }

            let first = previous_tx_id.saturating_add(1);
            let batch: Vec<CommittedTransaction> = {
                let state = peer.state.read().await;
                if first < state.retained_from {
                    return Ok(TxStreamFinishedResponse {
                        status: CatchupResult::TransactionPruned,
                        latest_tx_id: previous_tx_id,
                    });
                }
                state.transactions.range(first..).map(|(_, tx)| tx.clone()).collect()
            };

            let mut latest_tx_id = previous_tx_id;
            for tx in batch {
                let tx_id = tx.tx_id;
                listener.on_tx_received(tx)?;
                latest_tx_id = tx_id;
            }

            Ok(TxStreamFinishedResponse {
                status: CatchupResult::SuccessEndOfStream,
                latest_tx_id,
            })
        }
    }
}
