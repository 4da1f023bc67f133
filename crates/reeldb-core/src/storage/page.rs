//! Positional page I/O over a single file handle.
//!
//! Every write is flushed before returning; with `sync_writes` enabled the data
//! is also pushed to stable storage. Writes past end-of-file extend the file and
//! any hole in between reads back as zeros.

use crate::error::{Error, Result};

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Size of a disk page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// A file accessed by absolute byte offset.
///
/// Not internally synchronized: callers serialize access (the database holds
/// every `PageFile` behind its coarse mutex).
#[derive(Debug)]
pub struct PageFile {
    path: PathBuf,
    file: File,
    sync_writes: bool,
}

impl PageFile {
    /// Opens `path` for read/write, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P, sync_writes: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        Ok(Self {
            path,
            file,
            sync_writes,
        })
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file length in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if file metadata cannot be read.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Returns true if the file holds no bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if file metadata cannot be read.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads exactly `buf.len()` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corruption`] if the file ends before the buffer is
    /// filled, or an IO error if the read fails.
    pub fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let got = self.read_into(offset, buf)?;
        if got != buf.len() {
            return Err(Error::corruption(format!(
                "short read in {} at offset {offset}: expected {} bytes, got {got}",
                self.path.display(),
                buf.len()
            )));
        }
        Ok(())
    }

    /// Reads `len` bytes at `offset`, failing on a short read.
    ///
    /// # Errors
    ///
    /// See [`PageFile::read_exact_at`].
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Reads `len` bytes at `offset`, treating bytes past end-of-file as zero.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the read fails.
    pub fn read_at_or_zero(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    /// Writes `bytes` at `offset` and flushes.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the seek, write or flush fails.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        self.file.flush()?;
        if self.sync_writes {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Forces file contents to stable storage.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the sync fails.
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    fn read_into(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}
