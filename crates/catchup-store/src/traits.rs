//! Traits at the durable-state boundary.
//!
//! The network side of catch-up hands data to these traits and never touches
//! files directly: streamed transactions go to a [`TxPullResponseListener`],
//! copied store files go to a [`StoreFileStreamProvider`].

use catchup_core::{CommittedTransaction, FileHeader, TransactionId};

use crate::error::Result;
use crate::layout::DatabaseLayout;

/// Receives transactions as they are streamed from a peer, in order.
pub trait TxPullResponseListener: Send {
    /// Persist one received transaction.
    fn on_tx_received(&mut self, tx: CommittedTransaction) -> Result<()>;
}

/// A scoped log writer used for one pull.
///
/// Must be closed on every exit path. Implementations also close on drop,
/// but only an explicit [`close`](CatchupWriter::close) reports failures.
pub trait CatchupWriter: TxPullResponseListener {
    /// Id of the last transaction applied so far, if any.
    fn last_tx_id(&self) -> Option<TransactionId>;

    /// Flush, finalize and release the writer.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// How a catch-up writer treats the log it writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriterOptions {
    /// The pull follows a fresh store copy; a checkpoint is written on close.
    pub as_part_of_store_copy: bool,
    /// Put log segments in the database directory rather than the
    /// configured log directory.
    pub keep_tx_logs_in_store_dir: bool,
    /// Rotate segments by size while writing.
    pub force_rotation: bool,
}

impl WriterOptions {
    /// Options for the replay that follows a full store copy: everything on.
    pub const fn store_copy() -> Self {
        Self {
            as_part_of_store_copy: true,
            keep_tx_logs_in_store_dir: true,
            force_rotation: true,
        }
    }

    /// Options for a resume-only catch-up with caller-chosen toggles.
    pub const fn catch_up(keep_tx_logs_in_store_dir: bool, force_rotation: bool) -> Self {
        Self {
            as_part_of_store_copy: false,
            keep_tx_logs_in_store_dir,
            force_rotation,
        }
    }
}

/// Creates catch-up writers.
pub trait TransactionLogCatchupFactory: Send + Sync {
    type Writer: CatchupWriter;

    /// Open a writer that expects `from_tx_id` as its first transaction.
    fn create(
        &self,
        layout: &DatabaseLayout,
        from_tx_id: TransactionId,
        options: WriterOptions,
    ) -> Result<Self::Writer>;
}

/// Destination of one copied store file.
pub trait StoreFileStream: Send {
    /// Append payload bytes.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Finish the file, honouring its alignment, and make it durable.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Hands out a [`StoreFileStream`] for every file announced by a header.
pub trait StoreFileStreamProvider: Send + Sync {
    /// Start receiving the file described by `header`.
    ///
    /// Acquiring the same file again starts it over from empty.
    fn acquire(&self, header: &FileHeader) -> Result<Box<dyn StoreFileStream>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_copy_options_force_everything_on() {
        let options = WriterOptions::store_copy();
        assert!(options.as_part_of_store_copy);
        assert!(options.keep_tx_logs_in_store_dir);
        assert!(options.force_rotation);
    }

    #[test]
    fn test_catch_up_options_pass_flags_through() {
        let options = WriterOptions::catch_up(false, true);
        assert!(!options.as_part_of_store_copy);
        assert!(!options.keep_tx_logs_in_store_dir);
        assert!(options.force_rotation);
    }
}
