//! # `ReelDB` Core
//!
//! Embedded on-disk store for a movie-rating workload: users, movies and
//! user → movie ratings.
//!
//! ## Features
//!
//! - **Disk B-tree**: primary indexes for users and movies (T = 64)
//! - **Fixed-width records**: slot = id, no allocator on the read path
//! - **Per-user edge files**: one file holds every rating of a user
//! - **Secondary indexes**: genre and normalized-title lookups rebuilt at open
//! - **Thread-safe handle**: per-movie locks for concurrent rating writes
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reeldb_core::Database;
//!
//! let db = Database::open("./data")?;
//!
//! db.add_user(1, "alice")?;
//! db.add_movie(7, "The Matrix (1999)", &["Action", "Sci-Fi"])?;
//! db.add_rating(1, 7, 4.5)?;
//!
//! let movie = db.get_movie(7)?;
//! assert_eq!(movie.rating_count, 1);
//! assert_eq!(db.search_movies_by_title("matrix"), vec![7]);
//!
//! db.close()?;
//! ```
//!
//! ## Data directory
//!
//! | File | Contents |
//! |------|----------|
//! | `user_index.dat`, `movie_index.dat` | B-tree primary indexes |
//! | `users.dat`, `movies.dat` | fixed-width records |
//! | `metadata.dat` | counters and slot bitmaps |
//! | `ratings/user_<id>.edges` | one user's ratings |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
// =============================================================================
// NUMERIC CAST LINTS
// =============================================================================
// On-disk fields are fixed-width u32/u64; counts are bounded by max_slots.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
// =============================================================================
// STYLISTIC LINTS
// =============================================================================
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod database;
pub mod error;
#[cfg(test)]
mod error_tests;
pub mod graph;
pub mod index;
pub mod model;
pub mod storage;

pub use config::{ConfigError, IndexConfig, ReelConfig, StorageConfig};
pub use database::Database;
pub use error::{Error, ErrorKind, Result};
pub use graph::{DatabaseStats, GraphDatabase};
pub use index::{normalize_title, BTree, BTreeKey, GenreIndex, TitleIndex};
pub use model::{
    dequantize_rating, quantize_rating, FixedRecord, Movie, RatingEdge, User, MAX_GENRES,
    MAX_RATING, MIN_RATING,
};
pub use storage::{
    Bitmap, EdgeStore, EdgeUpsert, Metadata, PageFile, RecordStore, PAGE_SIZE, RECORD_HEADER_SIZE,
};
