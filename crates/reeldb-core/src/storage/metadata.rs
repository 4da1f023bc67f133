//! Database metadata file (`metadata.dat`).
//!
//! ```text
//! [total_users: u32]
//! [total_movies: u32]
//! [max_user_slot: u32]
//! [max_movie_slot: u32]
//! [user_bitmap_bytes: u32]
//! [movie_bitmap_bytes: u32]
//! [user bitmap blob]
//! [movie bitmap blob]
//! ```
//!
//! The primary indexes are authoritative; this file is a cache that the
//! startup rebuild checks and corrects. A missing or short file loads as
//! all-zero defaults.

use crate::error::Result;

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::warn;

const FIXED_SIZE: usize = 6 * 4;

/// Counters and serialized bitmaps persisted across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Live user count.
    pub total_users: u32,
    /// Live movie count.
    pub total_movies: u32,
    /// Highest user id ever stored.
    pub max_user_slot: u32,
    /// Highest movie id ever stored.
    pub max_movie_slot: u32,
    /// Raw user-slot bitmap (empty when unknown).
    pub user_bitmap: Vec<u8>,
    /// Raw movie-slot bitmap (empty when unknown).
    pub movie_bitmap: Vec<u8>,
}

impl Metadata {
    /// Encodes the metadata to its file format.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf =
            Vec::with_capacity(FIXED_SIZE + self.user_bitmap.len() + self.movie_bitmap.len());
        for value in [
            self.total_users,
            self.total_movies,
            self.max_user_slot,
            self.max_movie_slot,
            self.user_bitmap.len() as u32,
            self.movie_bitmap.len() as u32,
        ] {
            buf.extend_from_slice(&value.to_le_bytes());
        }
        buf.extend_from_slice(&self.user_bitmap);
        buf.extend_from_slice(&self.movie_bitmap);
        buf
    }

    /// Decodes metadata, returning `None` if `data` is too short.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < FIXED_SIZE {
            return None;
        }
        let field = |i: usize| {
            let at = i * 4;
            u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
        };
        let user_len = field(4) as usize;
        let movie_len = field(5) as usize;
        let user_end = FIXED_SIZE.checked_add(user_len)?;
        let movie_end = user_end.checked_add(movie_len)?;
        if data.len() < movie_end {
            return None;
        }

        Some(Self {
            total_users: field(0),
            total_movies: field(1),
            max_user_slot: field(2),
            max_movie_slot: field(3),
            user_bitmap: data[FIXED_SIZE..user_end].to_vec(),
            movie_bitmap: data[user_end..movie_end].to_vec(),
        })
    }

    /// Loads metadata from `path`.
    ///
    /// # Errors
    ///
    /// Returns an IO error only if an existing file cannot be read; a missing
    /// or short file yields defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        match Self::from_bytes(&data) {
            Some(meta) => Ok(meta),
            None => {
                if !data.is_empty() {
                    warn!(
                        path = %path.display(),
                        bytes = data.len(),
                        "Metadata file is short, starting from defaults"
                    );
                }
                Ok(Self::default())
            }
        }
    }

    /// Saves metadata via temp file + rename.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be written or renamed.
    pub fn save<P: AsRef<Path>>(&self, path: P, sync_writes: bool) -> Result<()> {
        let path = path.as_ref();
        let temp_path = path.with_extension("tmp");

        let mut file = File::create(&temp_path)?;
        file.write_all(&self.to_bytes())?;
        file.flush()?;
        if sync_writes {
            file.sync_all()?;
        }
        drop(file);

        fs::rename(&temp_path, path)?;
        Ok(())
    }
}
