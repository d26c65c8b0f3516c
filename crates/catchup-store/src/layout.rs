//! Where a store keeps its files.

use std::path::{Path, PathBuf};

/// File name of the metadata store inside the database directory.
pub const METADATA_STORE_FILE_NAME: &str = "metadata.db";

/// Locates a store's directory, its metadata store and its transaction logs.
///
/// By default transaction logs live in the database directory; a separate
/// log directory can be configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseLayout {
    database_directory: PathBuf,
    transaction_logs_directory: PathBuf,
}

impl DatabaseLayout {
    /// Layout rooted at `database_directory` with logs alongside the store files.
    pub fn new(database_directory: impl Into<PathBuf>) -> Self {
        let database_directory = database_directory.into();
        Self {
            transaction_logs_directory: database_directory.clone(),
            database_directory,
        }
    }

    /// Keep transaction logs in a separate directory.
    pub fn with_transaction_logs_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.transaction_logs_directory = directory.into();
        self
    }

    pub fn database_directory(&self) -> &Path {
        &self.database_directory
    }

    pub fn transaction_logs_directory(&self) -> &Path {
        &self.transaction_logs_directory
    }

    /// Path of the metadata store.
    pub fn metadata_store(&self) -> PathBuf {
        self.database_directory.join(METADATA_STORE_FILE_NAME)
    }
}
