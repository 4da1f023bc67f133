//! Fixed-width record store addressed by id.
//!
//! Record `id` lives at `RECORD_HEADER_SIZE + id * R::SIZE`. The slot index is
//! the id itself, so no allocator is consulted here; which slots are live is
//! tracked by the caller's primary index and bitmap.
//!
//! ## Header
//!
//! ```text
//! [Magic: "RLDB" 4 bytes]
//! [Version: u32]
//! [Record size: u32]
//! [Reserved: 4 bytes]
//! ```
//!
//! An all-zero header is accepted and initialised on open.

use super::page::PageFile;
use crate::error::{Error, Result};
use crate::model::FixedRecord;

use std::marker::PhantomData;
use std::path::Path;

/// Size of the reserved region at the start of a record file.
pub const RECORD_HEADER_SIZE: u64 = 16;

pub(crate) const RECORD_MAGIC: &[u8; 4] = b"RLDB";
pub(crate) const RECORD_VERSION: u32 = 1;

/// Store of `R` records keyed by slot.
#[derive(Debug)]
pub struct RecordStore<R: FixedRecord> {
    file: PageFile,
    _record: PhantomData<fn() -> R>,
}

impl<R: FixedRecord> RecordStore<R> {
    /// Opens or creates a record file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corruption`] if the header belongs to another format
    /// or record size, or an IO error if the file cannot be accessed.
    pub fn open<P: AsRef<Path>>(path: P, sync_writes: bool) -> Result<Self> {
        let mut file = PageFile::open(path, sync_writes)?;
        let header = file.read_at_or_zero(0, RECORD_HEADER_SIZE as usize)?;

        if header.iter().all(|&b| b == 0) {
            file.write_at(0, &Self::header_bytes())?;
        } else {
            Self::check_header(&file, &header)?;
        }

        Ok(Self {
            file,
            _record: PhantomData,
        })
    }

    fn header_bytes() -> [u8; RECORD_HEADER_SIZE as usize] {
        let mut header = [0u8; RECORD_HEADER_SIZE as usize];
        header[0..4].copy_from_slice(RECORD_MAGIC);
        header[4..8].copy_from_slice(&RECORD_VERSION.to_le_bytes());
        header[8..12].copy_from_slice(&(R::SIZE as u32).to_le_bytes());
        header
    }

    fn check_header(file: &PageFile, header: &[u8]) -> Result<()> {
        if &header[0..4] != RECORD_MAGIC {
            return Err(Error::corruption(format!(
                "{} is not a record file (bad magic)",
                file.path().display()
            )));
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != RECORD_VERSION {
            return Err(Error::corruption(format!(
                "{} has unsupported version {version}",
                file.path().display()
            )));
        }
        let size = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
        if size as usize != R::SIZE {
            return Err(Error::corruption(format!(
                "{} holds {size}-byte records, expected {}-byte {} records",
                file.path().display(),
                R::SIZE,
                R::KIND
            )));
        }
        Ok(())
    }

    /// Byte offset of slot `id`.
    #[must_use]
    pub fn offset_of(id: u32) -> u64 {
        RECORD_HEADER_SIZE + u64::from(id) * R::SIZE as u64
    }

    /// Reads the record in slot `id`; a never-written slot reads as zeros.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the read fails.
    pub fn read(&mut self, id: u32) -> Result<R> {
        let buf = self.file.read_at_or_zero(Self::offset_of(id), R::SIZE)?;
        Ok(R::decode(&buf))
    }

    /// Overwrites the record in slot `id`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the write fails.
    pub fn write(&mut self, id: u32, record: &R) -> Result<()> {
        self.file.write_at(Self::offset_of(id), &record.to_bytes())
    }

    /// Forces the file to stable storage.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the sync fails.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync()
    }
}
