//! Per-user rating edge files.
//!
//! Each user owns `user_<id>.edges` under the ratings directory:
//!
//! ```text
//! [count: u32]
//! [count × RatingEdge (16 bytes)]
//! ```
//!
//! Updates rewrite the whole file. The rewrite is not crash-atomic; callers
//! serialize access per user.

use crate::error::{Error, Result};
use crate::model::{FixedRecord, RatingEdge};

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

const COUNT_SIZE: usize = 4;

/// Outcome of [`EdgeStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeUpsert {
    /// Previous `rating_q` for the movie, if the user had already rated it.
    pub previous: Option<u32>,
    /// Number of edges after the write.
    pub total: u32,
    /// Sum of all `rating_q` values after the write.
    pub sum_q: u64,
}

impl EdgeUpsert {
    /// Returns true if the upsert appended a new edge.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.previous.is_none()
    }
}

/// Directory of per-user edge files.
#[derive(Debug, Clone)]
pub struct EdgeStore {
    dir: PathBuf,
    sync_writes: bool,
}

impl EdgeStore {
    /// Opens the edge directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(dir: P, sync_writes: bool) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, sync_writes })
    }

    /// Path of the edge file for `user_id`.
    #[must_use]
    pub fn path_for(&self, user_id: u32) -> PathBuf {
        self.dir.join(format!("user_{user_id}.edges"))
    }

    /// Reads every edge of a user; a missing file yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corruption`] if the file is shorter than its count
    /// claims, or an IO error if it cannot be read.
    pub fn read(&self, user_id: u32) -> Result<Vec<RatingEdge>> {
        let path = self.path_for(user_id);
        let mut data = Vec::new();
        match File::open(&path) {
            Ok(mut file) => {
                file.read_to_end(&mut data)?;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }

        if data.is_empty() {
            return Ok(Vec::new());
        }
        if data.len() < COUNT_SIZE {
            return Err(Error::corruption(format!(
                "{} is truncated inside its count field",
                path.display()
            )));
        }

        let count = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let needed = count
            .checked_mul(RatingEdge::SIZE)
            .and_then(|n| n.checked_add(COUNT_SIZE))
            .ok_or_else(|| Error::corruption(format!("{} has absurd count", path.display())))?;
        if data.len() < needed {
            return Err(Error::corruption(format!(
                "{} claims {count} edges but holds {} bytes",
                path.display(),
                data.len()
            )));
        }

        Ok(data[COUNT_SIZE..needed]
            .chunks_exact(RatingEdge::SIZE)
            .map(RatingEdge::decode)
            .collect())
    }

    /// Replaces a user's edge list: truncate, full write, flush.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be written.
    pub fn write(&self, user_id: u32, edges: &[RatingEdge]) -> Result<()> {
        let count = u32::try_from(edges.len())
            .map_err(|_| Error::capacity(format!("user {user_id} has too many edges")))?;

        let mut buf = Vec::with_capacity(COUNT_SIZE + edges.len() * RatingEdge::SIZE);
        buf.extend_from_slice(&count.to_le_bytes());
        for edge in edges {
            buf.extend_from_slice(&edge.to_bytes());
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.path_for(user_id))?;
        file.write_all(&buf)?;
        file.flush()?;
        if self.sync_writes {
            file.sync_data()?;
        }
        Ok(())
    }

    /// Sets the user's rating for `movie_id`, preserving edge order.
    ///
    /// An existing edge is updated in place; a new one is appended. The
    /// timestamp is refreshed either way.
    ///
    /// # Errors
    ///
    /// Propagates read and write failures.
    pub fn upsert(&self, user_id: u32, movie_id: u32, rating_q: u32) -> Result<EdgeUpsert> {
        let mut edges = self.read(user_id)?;
        let timestamp = unix_now();

        let previous = match edges.iter_mut().find(|e| e.movie_id == movie_id) {
            Some(edge) => {
                let old = edge.rating_q;
                edge.rating_q = rating_q;
                edge.timestamp = timestamp;
                Some(old)
            }
            None => {
                edges.push(RatingEdge::new(movie_id, rating_q, timestamp));
                None
            }
        };

        self.write(user_id, &edges)?;

        Ok(EdgeUpsert {
            previous,
            total: edges.len() as u32,
            sum_q: edges.iter().map(|e| u64::from(e.rating_q)).sum(),
        })
    }

    /// Returns the user's edge for `movie_id`, if any.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn get(&self, user_id: u32, movie_id: u32) -> Result<Option<RatingEdge>> {
        Ok(self
            .read(user_id)?
            .into_iter()
            .find(|e| e.movie_id == movie_id))
    }

    /// Returns true if the user has rated `movie_id`.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn has(&self, user_id: u32, movie_id: u32) -> Result<bool> {
        Ok(self.get(user_id, movie_id)?.is_some())
    }

    /// Removes the user's edge file. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file exists but cannot be removed.
    pub fn delete_user(&self, user_id: u32) -> Result<()> {
        match fs::remove_file(self.path_for(user_id)) {
            Ok(()) => {
                debug!(user_id, "Removed edge file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
