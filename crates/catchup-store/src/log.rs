//! Transaction log segments.
//!
//! A log is a directory of numbered segment files
//! (`transaction.log.0`, `transaction.log.1`, ...). Each segment starts with
//! a fixed-size header recording its version and the id of the transaction
//! preceding its first entry, followed by length-prefixed CBOR records.
//!
//! ```text
//! +----------+--------+-------------+----------------+---------+
//! | magic(8) | fmt(4) | version(8)  | previous tx(8) | pad(4)  |   header, 32 bytes
//! +----------+--------+-------------+----------------+---------+
//! | len(4) | CBOR LogEntry | len(4) | CBOR LogEntry | ...          records
//! ```
//!
//! A record cut short by a crash is a torn tail and ends the segment. A
//! newest segment shorter than its header is a torn head: the writer died
//! before anything reached disk, so it holds nothing. A record that is
//! complete but fails to decode or verify is corruption.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use catchup_core::{CommittedTransaction, TransactionId};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// File name prefix of log segments; the version follows it.
pub const LOG_FILE_PREFIX: &str = "transaction.log.";

/// Segment header magic.
pub const LOG_MAGIC: [u8; 8] = *b"CATCHLOG";

/// Segment format version.
pub const LOG_FORMAT_VERSION: u32 = 1;

/// Size of the segment header in bytes.
pub const LOG_HEADER_SIZE: usize = 32;

/// Largest record a segment may hold.
pub const MAX_RECORD_SIZE: u32 = 64 * 1024 * 1024;

/// Header at the start of every segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogHeader {
    pub log_version: u64,
    /// Id of the transaction immediately before this segment's first entry.
    pub previous_tx_id: TransactionId,
}

impl LogHeader {
    pub const fn new(log_version: u64, previous_tx_id: TransactionId) -> Self {
        Self {
            log_version,
            previous_tx_id,
        }
    }

    fn encode(&self) -> [u8; LOG_HEADER_SIZE] {
        let mut buf = [0u8; LOG_HEADER_SIZE];
        buf[0..8].copy_from_slice(&LOG_MAGIC);
        buf[8..12].copy_from_slice(&LOG_FORMAT_VERSION.to_le_bytes());
        buf[12..20].copy_from_slice(&self.log_version.to_le_bytes());
        buf[20..28].copy_from_slice(&self.previous_tx_id.to_le_bytes());
        buf
    }

    fn decode(path: &Path, buf: &[u8; LOG_HEADER_SIZE]) -> Result<Self> {
        if buf[0..8] != LOG_MAGIC {
            return Err(StoreError::corrupt(path, "bad log segment magic"));
        }
        let format = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
        if format != LOG_FORMAT_VERSION {
            return Err(StoreError::corrupt(
                path,
                format!("unsupported log format version {}", format),
            ));
        }
        let mut word = [0u8; 8];
        word.copy_from_slice(&buf[12..20]);
        let log_version = u64::from_le_bytes(word);
        word.copy_from_slice(&buf[20..28]);
        let previous_tx_id = u64::from_le_bytes(word);

        Ok(Self {
            log_version,
            previous_tx_id,
        })
    }
}

/// One record in a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEntry {
    /// A committed transaction.
    Transaction(CommittedTransaction),
    /// Marks the log as consistent with the store files up to `last_tx_id`.
    Checkpoint { last_tx_id: TransactionId },
}

/// The set of segments in one log directory.
#[derive(Debug, Clone)]
pub struct TransactionLogFiles {
    directory: PathBuf,
}

impl TransactionLogFiles {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the segment with the given version.
    pub fn segment_path(&self, version: u64) -> PathBuf {
        self.directory
            .join(format!("{}{}", LOG_FILE_PREFIX, version))
    }

    /// Versions of all segments present, ascending.
    ///
    /// A missing directory has no segments.
    pub fn versions(&self) -> Result<Vec<u64>> {
        if !self.directory.is_dir() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(version) = name
                .strip_prefix(LOG_FILE_PREFIX)
                .and_then(|v| v.parse::<u64>().ok())
            {
                versions.push(version);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    pub fn has_segments(&self) -> Result<bool> {
        Ok(!self.versions()?.is_empty())
    }

    pub fn highest_version(&self) -> Result<Option<u64>> {
        Ok(self.versions()?.last().copied())
    }

    /// Version of the newest segment if it is too short to hold a header.
    pub fn torn_head(&self) -> Result<Option<u64>> {
        let Some(version) = self.highest_version()? else {
            return Ok(None);
        };
        let len = std::fs::metadata(self.segment_path(version))?.len();
        Ok((len < LOG_HEADER_SIZE as u64).then_some(version))
    }
}

/// Sequential reader over one segment.
pub struct SegmentReader {
    reader: BufReader<File>,
    path: PathBuf,
    header: LogHeader,
    torn_tail: bool,
    done: bool,
}

impl SegmentReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::MissingFile(path));
            }
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(file);

        let mut buf = [0u8; LOG_HEADER_SIZE];
        if read_up_to(&mut reader, &mut buf)? < LOG_HEADER_SIZE {
            return Err(StoreError::corrupt(&path, "truncated log segment header"));
        }
        let header = LogHeader::decode(&path, &buf)?;

        Ok(Self {
            reader,
            path,
            header,
            torn_tail: false,
            done: false,
        })
    }

    pub fn header(&self) -> LogHeader {
        self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether reading stopped at a partially written record.
    pub fn torn_tail(&self) -> bool {
        self.torn_tail
    }

    /// Read the next entry, `None` at the end of the segment.
    pub fn next_entry(&mut self) -> Result<Option<LogEntry>> {
        if self.done {
            return Ok(None);
        }

        let mut len_buf = [0u8; 4];
        match read_up_to(&mut self.reader, &mut len_buf)? {
            0 => return Ok(self.finish(false)),
            n if n < len_buf.len() => return Ok(self.finish(true)),
            _ => {}
        }

        let len = u32::from_le_bytes(len_buf);
        if len == 0 || len > MAX_RECORD_SIZE {
            return Err(StoreError::corrupt(
                &self.path,
                format!("invalid record length {}", len),
            ));
        }

        let mut record = vec![0u8; len as usize];
        if read_up_to(&mut self.reader, &mut record)? < record.len() {
            return Ok(self.finish(true));
        }

        let entry: LogEntry = ciborium::from_reader(&record[..]).map_err(|e| {
            StoreError::corrupt(&self.path, format!("undecodable log record: {}", e))
        })?;
        if let LogEntry::Transaction(tx) = &entry {
            tx.verify()
                .map_err(|e| StoreError::corrupt(&self.path, e.to_string()))?;
        }

        Ok(Some(entry))
    }

    fn finish(&mut self, torn: bool) -> Option<LogEntry> {
        self.done = true;
        self.torn_tail = torn;
        None
    }
}

/// Appending writer for a new segment.
pub struct SegmentWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    header: LogHeader,
    size: u64,
}

impl SegmentWriter {
    /// Create a new segment. Fails if the file already exists.
    pub fn create(path: impl Into<PathBuf>, header: LogHeader) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&header.encode())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        Ok(Self {
            writer,
            path,
            header,
            size: LOG_HEADER_SIZE as u64,
        })
    }

    pub fn append(&mut self, entry: &LogEntry) -> Result<()> {
        let mut buf = Vec::new();
        ciborium::into_writer(entry, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let len = u32::try_from(buf.len())
            .ok()
            .filter(|len| *len <= MAX_RECORD_SIZE)
            .ok_or_else(|| {
                StoreError::InvalidData(format!("log record of {} bytes is too large", buf.len()))
            })?;

        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(&buf)?;
        self.size += 4 + u64::from(len);
        Ok(())
    }

    /// Bytes written so far, header included.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn header(&self) -> LogHeader {
        self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered records and fsync the segment.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(self.path)
    }
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
