//! Progress reporting for store copies and transaction pulls.

use catchup_core::TransactionId;
use tracing::{debug, info};

/// Observer of catch-up progress. Every method defaults to doing nothing.
pub trait StoreCopyClientMonitor: Send + Sync {
    fn start_receiving_store_files(&self) {}

    fn finish_receiving_store_files(&self) {}

    fn start_receiving_store_file(&self, _file_name: &str) {}

    fn finish_receiving_store_file(&self, _file_name: &str) {}

    /// A pull is starting; `start_tx_id` is the first id requested.
    fn start_receiving_transactions(&self, _start_tx_id: TransactionId) {}

    /// A pull ended, successfully or not; `end_tx_id` is the last id applied.
    fn finish_receiving_transactions(&self, _end_tx_id: TransactionId) {}
}

/// Ignores all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitor;

impl StoreCopyClientMonitor for NoopMonitor {}

/// Reports progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMonitor;

impl StoreCopyClientMonitor for TracingMonitor {
    fn start_receiving_store_files(&self) {
        info!("start receiving store files");
    }

    fn finish_receiving_store_files(&self) {
        info!("finish receiving store files");
    }

    fn start_receiving_store_file(&self, file_name: &str) {
        debug!(file = file_name, "start receiving store file");
    }

    fn finish_receiving_store_file(&self, file_name: &str) {
        debug!(file = file_name, "finish receiving store file");
    }

    fn start_receiving_transactions(&self, start_tx_id: TransactionId) {
        info!(start_tx_id, "start receiving transactions");
    }

    fn finish_receiving_transactions(&self, end_tx_id: TransactionId) {
        info!(end_tx_id, "finish receiving transactions");
    }
}
