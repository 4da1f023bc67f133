//! Crash recovery and corruption handling for `ReelDB`.
//!
//! These tests damage files in a closed data directory and check that the
//! next open (or the next read) either recovers from the primary indexes or
//! fails with a `Corruption` error. Nothing may panic.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use reeldb_core::{Database, Error, ErrorKind, FixedRecord, Movie, ReelConfig, RECORD_HEADER_SIZE};
use tempfile::tempdir;

fn config() -> ReelConfig {
    let mut config = ReelConfig::default();
    config.storage.max_slots = 1024;
    config.index.user_lock_stripes = 4;
    config
}

fn open(dir: &Path) -> reeldb_core::Result<Database> {
    Database::open_with_config(dir, &config())
}

/// Builds a closed data directory with two users, two movies and ratings.
fn populated_dir(dir: &Path) {
    let db = open(dir).expect("open");
    db.add_user(1, "alice").expect("alice");
    db.add_user(2, "bob").expect("bob");
    db.add_movie(10, "Heat (1995)", &["Crime"]).expect("heat");
    db.add_movie(11, "Ronin (1998)", &["Action", "Crime"])
        .expect("ronin");
    db.add_rating(1, 10, 4.0).expect("rating");
    db.add_rating(1, 11, 3.0).expect("rating");
    db.add_rating(2, 10, 5.0).expect("rating");
    db.close().expect("close");
}

fn overwrite_at(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).expect("open file");
    file.seek(SeekFrom::Start(offset)).expect("seek");
    file.write_all(bytes).expect("write");
}

#[test]
fn test_drop_without_close_keeps_entities() {
    // Arrange: simulate an abrupt shutdown, metadata is never written
    let dir = tempdir().expect("tempdir");
    {
        let db = open(dir.path()).expect("open");
        db.add_user(7, "ghost").expect("user");
        db.add_movie(3, "Memento (2000)", &["Mystery"]).expect("movie");
        db.add_rating(7, 3, 4.5).expect("rating");
        drop(db);
    }
    assert!(!dir.path().join("metadata.dat").exists());

    // Act
    let db = open(dir.path()).expect("reopen");

    // Assert
    assert_eq!(db.user_count(), 1);
    assert_eq!(db.movie_count(), 1);
    assert_eq!(db.get_rating(7, 3).expect("rating"), Some(4.5));
    assert_eq!(db.get_movies_by_genre("Mystery"), vec![3]);
    assert_eq!(db.get_movie(3).expect("movie").rating_count, 1);
}

#[test]
fn test_truncated_edge_file_is_corruption() {
    // Arrange
    let dir = tempdir().expect("tempdir");
    populated_dir(dir.path());
    let edge_path = dir.path().join("ratings").join("user_1.edges");
    let data = fs::read(&edge_path).expect("read edges");
    fs::write(&edge_path, &data[..data.len() - 5]).expect("truncate");

    // Act
    let db = open(dir.path()).expect("open");
    let result = db.user_ratings(1);

    // Assert
    let err = result.expect_err("truncated edge file must fail");
    assert_eq!(err.kind(), ErrorKind::Corruption);
    assert!(!err.is_recoverable());
    // Other users are unaffected.
    assert_eq!(db.user_ratings(2).expect("bob").len(), 1);
}

#[test]
fn test_rating_on_corrupt_edge_file_fails_cleanly() {
    let dir = tempdir().expect("tempdir");
    populated_dir(dir.path());
    fs::write(dir.path().join("ratings").join("user_2.edges"), [9u8, 0]).expect("damage");
    let db = open(dir.path()).expect("open");
    let before = db.get_movie(11).expect("movie");

    let result = db.add_rating(2, 11, 2.5);

    assert!(matches!(result, Err(Error::Corruption(_))));
    assert_eq!(db.get_movie(11).expect("movie"), before);
}

#[test]
fn test_truncated_index_fails_open() {
    // Arrange: keep the header, cut the root node short
    let dir = tempdir().expect("tempdir");
    populated_dir(dir.path());
    let index = dir.path().join("user_index.dat");
    let file = OpenOptions::new().write(true).open(&index).expect("open index");
    file.set_len(100).expect("truncate");
    drop(file);

    // Act
    let result = open(dir.path());

    // Assert
    assert!(matches!(result, Err(Error::Corruption(_))));
}

#[test]
fn test_bad_index_header_fails_open() {
    let dir = tempdir().expect("tempdir");
    populated_dir(dir.path());
    // root beyond next_free
    let mut header = Vec::new();
    header.extend_from_slice(&1_000_000u64.to_le_bytes());
    header.extend_from_slice(&128u64.to_le_bytes());
    overwrite_at(&dir.path().join("movie_index.dat"), 0, &header);

    let result = open(dir.path());

    assert!(matches!(result, Err(Error::Corruption(_))));
}

#[test]
fn test_record_file_with_wrong_record_size_fails_open() {
    let dir = tempdir().expect("tempdir");
    populated_dir(dir.path());
    overwrite_at(&dir.path().join("users.dat"), 8, &99u32.to_le_bytes());

    let result = open(dir.path());

    assert!(matches!(result, Err(Error::Corruption(_))));
}

#[test]
fn test_mismatched_movie_record_is_skipped_at_open() {
    // Arrange: rewrite the id inside movie 10's slot
    let dir = tempdir().expect("tempdir");
    populated_dir(dir.path());
    let offset = RECORD_HEADER_SIZE + 10 * Movie::SIZE as u64;
    overwrite_at(&dir.path().join("movies.dat"), offset, &99u32.to_le_bytes());

    // Act
    let db = open(dir.path()).expect("open tolerates a bad record");

    // Assert
    assert!(matches!(db.get_movie(10), Err(Error::Corruption(_))));
    assert_eq!(db.get_movies_by_genre("Crime"), vec![11]);
    assert!(db.search_movies_by_title("heat").is_empty());
    assert_eq!(db.movie_count(), 2);
    // The primary index still owns the id, so delete works.
    db.delete_movie(10).expect("delete");
    assert_eq!(db.movie_count(), 1);
}

#[test]
fn test_short_metadata_is_tolerated() {
    let dir = tempdir().expect("tempdir");
    populated_dir(dir.path());
    fs::write(dir.path().join("metadata.dat"), [1u8, 2, 3]).expect("damage");

    let db = open(dir.path()).expect("open");

    assert_eq!(db.user_count(), 2);
    assert_eq!(db.movie_count(), 2);
    assert_eq!(db.all_user_ids().expect("ids"), vec![1, 2]);
    db.add_user(3, "carol").expect("slot allocation still works");
}

#[test]
fn test_stale_metadata_totals_are_rebuilt() {
    // Arrange: flush early, then keep writing without a flush
    let dir = tempdir().expect("tempdir");
    {
        let db = open(dir.path()).expect("open");
        db.add_user(1, "alice").expect("alice");
        db.flush().expect("flush");
        db.add_user(2, "bob").expect("bob");
        db.add_user(3, "carol").expect("carol");
    }

    // Act
    let db = open(dir.path()).expect("reopen");

    // Assert
    assert_eq!(db.user_count(), 3);
    assert_eq!(db.stats().max_user_slot, 3);
    assert!(matches!(db.add_user(2, "again"), Err(Error::UserExists(2))));
}
