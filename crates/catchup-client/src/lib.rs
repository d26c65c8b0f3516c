//! # Catch-up Client
//!
//! The network side of remote store catch-up.
//!
//! ## Overview
//!
//! [`StoreCopyClient`] bulk-copies a peer's store files and
//! [`TxPullClient`] streams its transactions. [`CatchupClient`] implements
//! both over any [`CatchupChannel`], adding the per-file retry policy: a
//! failed file request is retried against the secondary address, with
//! exponential backoff, until its [`MaximumTotalTime`] budget runs out.
//!
//! ## Key Types
//!
//! - [`CatchupChannel`] - Single requests against a peer
//! - [`CatchupClient`] - Retrying client over a channel
//! - [`CatchupAddressProvider`] - Primary and secondary peer resolution
//! - [`StoreCopyClientMonitor`] - Progress observer
//! - [`MemoryNetwork`] - In-process peers for tests and embedding
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use catchup_client::{CatchupClient, ClientConfig, MemoryNetwork, MemoryPeer, PeerAddress, StoreCopyClient};
//! use catchup_core::StoreId;
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let address = PeerAddress::new("core-1", 6000);
//!     let peer = Arc::new(MemoryPeer::new(StoreId::generate(0)));
//!     network.register(address.clone(), peer).await;
//!
//!     let client = CatchupClient::new(network.channel(), ClientConfig::default());
//!     let store_id = client.fetch_store_id(&address).await.unwrap();
//!     println!("peer serves {}", store_id);
//! }
//! ```
//!
//! ## Request Flow
//!
//! ```text
//! Client                              Peer
//!   |-------- PrepareStoreCopy ------->|
//!   |<------- file list, checkpoint ---|
//!   |-------- GetStoreFile (each) ---->|   retried under the budget
//!   |<------- file bytes, status ------|
//!   |-------- PullTransactions ------->|
//!   |<------- transactions, status ----|
//! ```

pub mod address;
pub mod client;
pub mod error;
pub mod messages;
pub mod monitor;
pub mod timeout;
pub mod transport;

pub use address::{CatchupAddressProvider, PeerAddress, PrioritisedAddressProvider, SingleAddressProvider};
pub use client::{CatchupClient, ClientConfig, StoreCopyClient, TxPullClient};
pub use error::{ClientError, Result};
pub use messages::{
    PrepareStoreCopyResponse, PrepareStoreCopyStatus, StoreCopyFinishedResponse, StoreCopyStatus,
    TxStreamFinishedResponse,
};
pub use monitor::{NoopMonitor, StoreCopyClientMonitor, TracingMonitor};
pub use timeout::{ExponentialBackoff, MaximumTotalTime, TerminationCondition};
pub use transport::{
    memory::{MemoryChannel, MemoryNetwork, MemoryPeer},
    CatchupChannel,
};
