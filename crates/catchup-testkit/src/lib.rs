//! # Catch-up Testkit
//!
//! Testing utilities for remote store catch-up.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Doubles**: Scripted clients, a recording writer factory and a
//!   recording monitor that share one ordered [`EventLog`]
//! - **Fixtures**: Local stores on disk and in-memory peers serving a store
//! - **Generators**: Proptest strategies for ids, headers and transactions
//!
//! ## Scripted Pulls
//!
//! ```rust
//! use catchup_core::CatchupResult;
//! use catchup_testkit::doubles::{EventLog, PullScript, ScriptedTxPullClient};
//!
//! let log = EventLog::new();
//! let client = ScriptedTxPullClient::new(
//!     log.clone(),
//!     [PullScript::result(CatchupResult::TransactionPruned)],
//! );
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use catchup_core::StoreId;
//! use catchup_testkit::fixtures::LocalStoreFixture;
//!
//! let fixture = LocalStoreFixture::new(StoreId::new(1, 2));
//! fixture.set_last_committed(100);
//! assert_eq!(fixture.commit_state().meta_data_store_index(), 100);
//! ```

pub mod doubles;
pub mod fixtures;
pub mod generators;

pub use doubles::{
    Event, EventLog, PullScript, RecordingMonitor, RecordingWriter, RecordingWriterFactory,
    ScriptedTxPullClient, StubStoreCopyClient,
};
pub use fixtures::{
    network_with, peer_fixture, transaction, transactions, LocalStoreFixture, NODE_STORE_ALIGNMENT,
    NODE_STORE_CONTENTS, NODE_STORE_FILE_NAME,
};
