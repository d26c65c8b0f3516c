//! Writing copied store files to disk.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use catchup_core::FileHeader;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::traits::{StoreFileStream, StoreFileStreamProvider};

/// Receives store files into a destination directory.
///
/// File names are taken relative to the directory; absolute names and names
/// that would escape it are refused.
#[derive(Debug, Clone)]
pub struct StreamToDiskProvider {
    directory: PathBuf,
}

impl StreamToDiskProvider {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn resolve(&self, file_name: &str) -> Result<PathBuf> {
        let relative = Path::new(file_name);
        let safe = !file_name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StoreError::InvalidData(format!(
                "refusing store file name {:?}",
                file_name
            )));
        }
        Ok(self.directory.join(relative))
    }
}

impl StoreFileStreamProvider for StreamToDiskProvider {
    fn acquire(&self, header: &FileHeader) -> Result<Box<dyn StoreFileStream>> {
        let path = self.resolve(header.file_name())?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        Ok(Box::new(DiskFileStream {
            writer: BufWriter::new(file),
            page: Vec::new(),
            alignment: if header.is_aligned() {
                header.required_alignment() as usize
            } else {
                1
            },
            written: 0,
            path,
        }))
    }
}

/// One file being received. Bytes are written in whole pages of the
/// required alignment; the final partial page is zero-padded on finish.
struct DiskFileStream {
    writer: BufWriter<File>,
    page: Vec<u8>,
    alignment: usize,
    written: u64,
    path: PathBuf,
}

impl DiskFileStream {
    fn write_pages(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }
}

impl StoreFileStream for DiskFileStream {
    fn write(&mut self, mut data: &[u8]) -> Result<()> {
        if !self.page.is_empty() {
            let take = (self.alignment - self.page.len()).min(data.len());
            self.page.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.page.len() < self.alignment {
                return Ok(());
            }
            let page = std::mem::take(&mut self.page);
            self.write_pages(&page)?;
        }

        let whole = data.len() - data.len() % self.alignment;
        if whole > 0 {
            self.write_pages(&data[..whole])?;
        }
        self.page.extend_from_slice(&data[whole..]);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        if !this.page.is_empty() {
            let mut page = std::mem::take(&mut this.page);
            page.resize(this.alignment, 0);
            this.write_pages(&page)?;
        }
        this.writer.flush()?;
        this.writer.get_ref().sync_all()?;

        debug!(file = %this.path.display(), bytes = this.written, "received store file");
        Ok(())
    }
}
