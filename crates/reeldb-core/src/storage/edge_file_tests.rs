//! Tests for `edge_file` module

use super::edge_file::EdgeStore;
use crate::error::Error;
use crate::model::RatingEdge;

use tempfile::TempDir;

fn create_store() -> (EdgeStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = EdgeStore::open(temp_dir.path().join("ratings"), false).expect("open");
    (store, temp_dir)
}

#[test]
fn test_missing_file_reads_empty() {
    let (store, _temp) = create_store();

    assert!(store.read(1).expect("read").is_empty());
    assert!(!store.has(1, 10).expect("has"));
    assert_eq!(store.get(1, 10).expect("get"), None);
}

#[test]
fn test_upsert_appends_then_updates_in_place() {
    // Arrange
    let (store, _temp) = create_store();

    // Act
    let first = store.upsert(1, 10, 400).expect("first");
    let second = store.upsert(1, 20, 300).expect("second");
    let third = store.upsert(1, 10, 200).expect("overwrite");

    // Assert
    assert!(first.is_new());
    assert!(second.is_new());
    assert_eq!(third.previous, Some(400));
    assert_eq!(third.total, 2);
    assert_eq!(third.sum_q, 500);

    let edges = store.read(1).expect("read");
    let order: Vec<(u32, u32)> = edges.iter().map(|e| (e.movie_id, e.rating_q)).collect();
    assert_eq!(order, vec![(10, 200), (20, 300)]);
}

#[test]
fn test_file_format_is_count_then_edges() {
    // Arrange
    let (store, _temp) = create_store();
    let edges = [RatingEdge::new(7, 350, 1_700_000_000)];

    // Act
    store.write(3, &edges).expect("write");
    let raw = std::fs::read(store.path_for(3)).expect("raw read");

    // Assert
    assert_eq!(raw.len(), 4 + 16);
    assert_eq!(&raw[0..4], &1u32.to_le_bytes());
    assert_eq!(&raw[4..8], &7u32.to_le_bytes());
    assert_eq!(&raw[8..12], &350u32.to_le_bytes());
    assert_eq!(&raw[12..20], &1_700_000_000u64.to_le_bytes());
}

#[test]
fn test_rewrite_shrinks_file() {
    let (store, _temp) = create_store();
    store
        .write(1, &[RatingEdge::new(1, 100, 0), RatingEdge::new(2, 200, 0)])
        .expect("write two");

    store.write(1, &[]).expect("write none");

    assert_eq!(std::fs::metadata(store.path_for(1)).expect("meta").len(), 4);
    assert!(store.read(1).expect("read").is_empty());
}

#[test]
fn test_truncated_file_is_corruption() {
    // Arrange
    let (store, _temp) = create_store();
    store
        .write(5, &[RatingEdge::new(1, 100, 0), RatingEdge::new(2, 200, 0)])
        .expect("write");
    let path = store.path_for(5);
    let raw = std::fs::read(&path).expect("raw");
    std::fs::write(&path, &raw[..raw.len() - 3]).expect("truncate");

    // Act
    let result = store.read(5);

    // Assert
    assert!(matches!(result, Err(Error::Corruption(_))));
}

#[test]
fn test_delete_user_removes_file_and_tolerates_missing() {
    let (store, _temp) = create_store();
    store.upsert(9, 1, 500).expect("upsert");

    store.delete_user(9).expect("delete");
    store.delete_user(9).expect("delete again");

    assert!(!store.path_for(9).exists());
    assert!(store.read(9).expect("read").is_empty());
}

#[test]
fn test_upsert_refreshes_timestamp() {
    let (store, _temp) = create_store();
    store.write(1, &[RatingEdge::new(10, 400, 1)]).expect("seed");

    store.upsert(1, 10, 400).expect("same rating");

    let edge = store.get(1, 10).expect("get").expect("edge");
    assert_eq!(edge.rating_q, 400);
    assert!(edge.timestamp > 1);
}
