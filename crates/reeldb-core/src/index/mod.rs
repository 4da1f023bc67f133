//! Primary and secondary indexes.
//!
//! - [`BTree`]: disk-resident primary index (id → slot)
//! - [`GenreIndex`], [`TitleIndex`]: in-memory movie lookups rebuilt at open

pub mod btree;
mod secondary;

#[cfg(test)]
mod secondary_tests;

pub use btree::{BTree, BTreeKey};
pub use secondary::{normalize_title, GenreIndex, TitleIndex};
