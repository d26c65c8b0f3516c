//! # Catchup Core
//!
//! Value types shared by every layer of the remote store catch-up subsystem.
//!
//! This crate contains no I/O, no storage, no networking. Everything here is
//! an owned, immutable-by-convention value that is produced by one call and
//! handed down the call chain.
//!
//! ## Key Types
//!
//! - [`StoreId`] - Identity of a logical store instance
//! - [`CommitState`] - Local durable-state snapshot used to pick a resume point
//! - [`CatchupResult`] - Terminal outcome of one transaction pull
//! - [`TxPullRequestResult`] - Outcome plus the last transaction id seen
//! - [`FileHeader`] - Descriptor preceding each file in a store copy
//! - [`CommittedTransaction`] - A transaction as streamed from a peer
//!
//! ## Transaction Ids
//!
//! Transaction ids are plain `u64`s. [`BASE_TX_ID`] is the sentinel for
//! "nothing has ever been committed"; the first real transaction is
//! `BASE_TX_ID + 1`.

pub mod commit_state;
pub mod error;
pub mod file_header;
pub mod result;
pub mod transaction;
pub mod types;

pub use commit_state::CommitState;
pub use error::CoreError;
pub use file_header::FileHeader;
pub use result::{CatchupResult, TxPullRequestResult};
pub use transaction::{Checksum, CommittedTransaction};
pub use types::{StoreId, TransactionId, BASE_TX_ID};
