//! The database handle.
//!
//! [`Database`] is the single owned entry point: open it once and share it by
//! reference (or `Arc`) between worker threads. Every method takes `&self`.
//!
//! - `graph`: the coarse mutex over indexes and record stores
//! - `edges`: per-user rating files, guarded by user stripes
//! - `locks`: per-movie and per-user locks for rating writes
//!
//! # Example
//!
//! ```rust,no_run
//! use reeldb_core::Database;
//!
//! # fn main() -> reeldb_core::Result<()> {
//! let db = Database::open("./data")?;
//! db.add_user(1, "alice")?;
//! db.add_movie(10, "Heat (1995)", &["Crime", "Thriller"])?;
//! db.add_rating(1, 10, 4.5)?;
//! assert_eq!(db.get_rating(1, 10)?, Some(4.5));
//! db.close()?;
//! # Ok(())
//! # }
//! ```

mod crud;
mod lifecycle;
mod locks;
mod ratings;

#[cfg(test)]
mod ratings_tests;

use crate::config::ReelConfig;
use crate::graph::GraphDatabase;
use crate::storage::EdgeStore;

use locks::RatingLocks;
use parking_lot::Mutex;
use std::path::PathBuf;

/// Directory holding the per-user edge files.
pub const RATINGS_DIR: &str = "ratings";

/// Thread-safe movie-rating store.
#[derive(Debug)]
pub struct Database {
    /// Path to the data directory
    data_dir: PathBuf,
    /// Configuration the database was opened with
    config: ReelConfig,
    /// Indexes and record stores
    graph: Mutex<GraphDatabase>,
    /// Rating edge files
    edges: EdgeStore,
    /// Movie locks and user stripes
    locks: RatingLocks,
}
