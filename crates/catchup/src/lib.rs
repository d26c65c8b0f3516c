//! # Catch-up
//!
//! Brings a database replica's on-disk state into agreement with an
//! authoritative peer.
//!
//! ## Overview
//!
//! [`RemoteStore`] offers two operations:
//!
//! - **Resume**: [`RemoteStore::try_catching_up`] reads the local commit
//!   state and pulls every transaction the store is missing
//! - **Copy**: [`RemoteStore::copy`] copies all store files from a peer, then
//!   replays the transactions committed since the files were flushed
//!
//! ## Key Concepts
//!
//! - **Commit state**: the last committed id in the metadata store, plus the
//!   log tail when the log covers it. The log tail wins.
//! - **Pruned**: the peer no longer has the requested transactions. A resume
//!   from the metadata point gets exactly one second chance.
//! - **Ordering**: store files are complete before any replay begins.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use catchup::{CatchupConfig, RemoteStore};
//! use catchup::client::{CatchupClient, ClientConfig, MemoryNetwork, PeerAddress, SingleAddressProvider};
//! use catchup::store::{DatabaseLayout, LogCatchupWriterFactory};
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let client = Arc::new(CatchupClient::new(network.channel(), ClientConfig::default()));
//!     let remote = RemoteStore::new(
//!         client.clone(),
//!         client,
//!         LogCatchupWriterFactory::default(),
//!         CatchupConfig::default(),
//!     );
//!
//!     let upstream = PeerAddress::new("core-1", 6000);
//!     let store_id = remote.get_store_id(&upstream).await.unwrap();
//!     let layout = DatabaseLayout::new("/data/graph.db");
//!     remote
//!         .copy(&SingleAddressProvider::new(upstream), store_id, &layout)
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `catchup::core` - Value types (ids, results, file headers)
//! - `catchup::store` - Local durable state
//! - `catchup::client` - Network capabilities and the in-memory network

pub mod config;
pub mod error;
pub mod remote_store;

pub use catchup_client as client;
pub use catchup_core as core;
pub use catchup_store as store;

pub use config::CatchupConfig;
pub use error::{CatchupError, Result, StoreCopyFailure};
pub use remote_store::RemoteStore;

pub use catchup_core::{CatchupResult, CommitState, FileHeader, StoreId, TransactionId, BASE_TX_ID};
