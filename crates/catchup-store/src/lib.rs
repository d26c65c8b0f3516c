//! # Catch-up Store
//!
//! Local durable state for remote store catch-up: the metadata store, the
//! transaction log, and the sinks that network code writes into.
//!
//! ## Overview
//!
//! Nothing in this crate talks to the network. Pulled transactions arrive
//! through [`TxPullResponseListener`]; copied store files arrive through
//! [`StoreFileStreamProvider`]. [`CommitStateHelper`] reads the same files
//! back to decide where replication should resume.
//!
//! ## Key Types
//!
//! - [`DatabaseLayout`] - Where a store keeps its files
//! - [`MetaDataStore`] - SQLite record of store id and last committed transaction
//! - [`CommitStateHelper`] - Computes the local [`CommitState`](catchup_core::CommitState)
//! - [`LogCatchupWriterFactory`] - Creates the writers used by pulls
//! - [`StreamToDiskProvider`] - Receives copied files into a directory
//!
//! ## Usage
//!
//! ```rust,no_run
//! use catchup_store::{CommitStateHelper, DatabaseLayout};
//!
//! let layout = DatabaseLayout::new("/data/graph.db");
//! let state = CommitStateHelper::new().get_store_state(&layout).unwrap();
//! println!("resume from {}", state);
//! ```
//!
//! ## Design Notes
//!
//! - **Fail loud**: missing or corrupt local files are errors, never guesses
//! - **Ordered writes**: writers refuse gaps and out-of-order transactions
//! - **Scoped writers**: a writer that is dropped unclosed still closes

pub mod commit_state;
pub mod error;
pub mod file_stream;
pub mod layout;
pub mod log;
pub mod metadata;
pub mod migration;
pub mod traits;
pub mod writer;

pub use commit_state::CommitStateHelper;
pub use error::{Result, StoreError};
pub use file_stream::StreamToDiskProvider;
pub use layout::{DatabaseLayout, METADATA_STORE_FILE_NAME};
pub use log::{LogEntry, LogHeader, SegmentReader, SegmentWriter, TransactionLogFiles};
pub use metadata::{MetaDataStore, MetadataRecord};
pub use traits::{
    CatchupWriter, StoreFileStream, StoreFileStreamProvider, TransactionLogCatchupFactory,
    TxPullResponseListener, WriterOptions,
};
pub use writer::{LogCatchupWriterFactory, LogConfig, TransactionLogCatchupWriter};
