//! SQLite-backed metadata store.
//!
//! Holds the store's identity and the id of the last committed transaction.
//! The file is copied verbatim during a store copy, so every connection is
//! closed as soon as the store handle is dropped.

use std::path::{Path, PathBuf};

use catchup_core::{StoreId, TransactionId, BASE_TX_ID};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration;

/// The single metadata record of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataRecord {
    pub store_id: StoreId,
    pub last_committed_tx_id: TransactionId,
}

/// Handle on a store's metadata file.
pub struct MetaDataStore {
    conn: Connection,
    path: PathBuf,
}

impl MetaDataStore {
    /// Create a new metadata store for a store that has committed nothing.
    ///
    /// Fails if the file already exists.
    pub fn create(path: impl AsRef<Path>, store_id: StoreId) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(StoreError::InvalidData(format!(
                "metadata store already exists: {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        conn.execute(
            "INSERT INTO store_metadata (id, creation_time, random_id, last_committed_tx_id, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4)",
            params![
                store_id.creation_time,
                store_id.random_id as i64,
                BASE_TX_ID as i64,
                migration::now_millis(),
            ],
        )?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing metadata store.
    ///
    /// A missing or unreadable file is a local-integrity failure.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StoreError::MissingFile(path.to_path_buf()));
        }

        let mut conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        migration::migrate(&mut conn).map_err(|e| match e {
            StoreError::Database(inner) => StoreError::corrupt(path, inner.to_string()),
            other => other,
        })?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing metadata store without modifying it.
    ///
    /// The schema must already be current; nothing is migrated.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StoreError::MissingFile(path.to_path_buf()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let version = migration::schema_version(&conn).map_err(|e| match e {
            StoreError::Database(inner) => StoreError::corrupt(path, inner.to_string()),
            other => other,
        })?;
        if version != migration::CURRENT_VERSION {
            return Err(StoreError::Migration(format!(
                "metadata schema version {} at {} does not match supported version {}",
                version,
                path.display(),
                migration::CURRENT_VERSION
            )));
        }

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the metadata record.
    pub fn record(&self) -> Result<MetadataRecord> {
        let row: Option<(i64, i64, i64)> = self
            .conn
            .query_row(
                "SELECT creation_time, random_id, last_committed_tx_id FROM store_metadata WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let (creation_time, random_id, last_committed) =
            row.ok_or_else(|| StoreError::corrupt(&self.path, "metadata record missing"))?;

        if last_committed < 0 {
            return Err(StoreError::corrupt(
                &self.path,
                format!("negative last committed transaction id {}", last_committed),
            ));
        }

        Ok(MetadataRecord {
            store_id: StoreId::new(creation_time, random_id as u64),
            last_committed_tx_id: last_committed as TransactionId,
        })
    }

    pub fn store_id(&self) -> Result<StoreId> {
        Ok(self.record()?.store_id)
    }

    pub fn last_committed_tx_id(&self) -> Result<TransactionId> {
        Ok(self.record()?.last_committed_tx_id)
    }

    /// Record `tx_id` as the last committed transaction.
    pub fn set_last_committed_tx_id(&self, tx_id: TransactionId) -> Result<()> {
        let tx_id = i64::try_from(tx_id).map_err(|_| {
            StoreError::InvalidData(format!("transaction id {} out of range", tx_id))
        })?;
        let updated = self.conn.execute(
            "UPDATE store_metadata SET last_committed_tx_id = ?1, updated_at = ?2 WHERE id = 1",
            params![tx_id, migration::now_millis()],
        )?;
        if updated == 0 {
            return Err(StoreError::corrupt(&self.path, "metadata record missing"));
        }
        Ok(())
    }
}
