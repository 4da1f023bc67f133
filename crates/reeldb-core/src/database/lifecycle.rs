//! Open, flush and close.

use super::locks::RatingLocks;
use super::{Database, RATINGS_DIR};
use crate::config::ReelConfig;
use crate::error::Result;
use crate::graph::{DatabaseStats, GraphDatabase};
use crate::storage::EdgeStore;

use parking_lot::Mutex;
use std::path::Path;

impl Database {
    /// Opens or creates a database at the specified path with default
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or a data file is
    /// unreadable or corrupt.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, &ReelConfig::default())
    }

    /// Opens or creates a database with explicit configuration.
    ///
    /// The in-memory state (slot bitmaps, counters, genre and title indexes)
    /// is rebuilt from the primary indexes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] for an invalid configuration, or any
    /// error raised while opening the data files.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: &ReelConfig) -> Result<Self> {
        config.validate()?;

        let data_dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let graph = GraphDatabase::open(&data_dir, config)?;
        let edges = EdgeStore::open(data_dir.join(RATINGS_DIR), config.storage.sync_writes)?;

        tracing::info!(
            path = %data_dir.display(),
            users = graph.user_count(),
            movies = graph.movie_count(),
            "Database opened"
        );

        Ok(Self {
            data_dir,
            config: config.clone(),
            graph: Mutex::new(graph),
            edges,
            locks: RatingLocks::new(config.index.user_lock_stripes),
        })
    }

    /// Path to the data directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.data_dir
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &ReelConfig {
        &self.config
    }

    /// Counters and slot high-water marks.
    #[must_use]
    pub fn stats(&self) -> DatabaseStats {
        self.graph.lock().stats()
    }

    /// Syncs every file and persists `metadata.dat`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if a sync or the metadata write fails.
    pub fn flush(&self) -> Result<()> {
        self.graph.lock().flush()
    }

    /// Flushes and releases every file handle.
    ///
    /// Dropping a `Database` without closing it writes nothing; the next
    /// open reconciles from the primary indexes.
    ///
    /// # Errors
    ///
    /// See [`Database::flush`].
    pub fn close(self) -> Result<()> {
        self.flush()?;
        tracing::info!(
            path = %self.data_dir.display(),
            movie_locks = self.locks.movie_lock_count(),
            "Database closed"
        );
        Ok(())
    }
}
