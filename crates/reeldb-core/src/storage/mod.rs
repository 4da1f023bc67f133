//! On-disk storage primitives.
//!
//! # Public Types
//!
//! - [`PageFile`]: Positional read/write with flush-on-write
//! - [`Bitmap`]: Fixed-capacity slot allocator
//! - [`RecordStore`]: Fixed-width records addressed by id
//! - [`EdgeStore`]: Per-user rating edge files
//! - [`Metadata`]: Persisted counters and bitmaps

mod bitmap;
mod edge_file;
mod metadata;
mod page;
mod record_store;

#[cfg(test)]
mod edge_file_tests;
#[cfg(test)]
mod metadata_tests;
#[cfg(test)]
mod page_tests;

// Re-export public types
pub use bitmap::Bitmap;
pub use edge_file::{EdgeStore, EdgeUpsert};
pub use metadata::Metadata;
pub use page::{PageFile, PAGE_SIZE};
pub use record_store::{RecordStore, RECORD_HEADER_SIZE};
