//! Tests for `metadata` module

use super::metadata::Metadata;

use tempfile::TempDir;

fn sample() -> Metadata {
    Metadata {
        total_users: 3,
        total_movies: 2,
        max_user_slot: 42,
        max_movie_slot: 10,
        user_bitmap: vec![0b0000_0111, 0, 0, 0, 0, 0b0000_0100],
        movie_bitmap: vec![0b0000_0001, 0b0000_0100],
    }
}

#[test]
fn test_save_then_load() {
    // Arrange
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("metadata.dat");

    // Act
    sample().save(&path, false).expect("save");
    let loaded = Metadata::load(&path).expect("load");

    // Assert
    assert_eq!(loaded, sample());
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn test_file_layout() {
    let bytes = sample().to_bytes();

    assert_eq!(bytes.len(), 24 + 6 + 2);
    assert_eq!(&bytes[8..12], &42u32.to_le_bytes());
    assert_eq!(&bytes[16..20], &6u32.to_le_bytes());
    assert_eq!(&bytes[20..24], &2u32.to_le_bytes());
    assert_eq!(bytes[24], 0b0000_0111);
}

#[test]
fn test_missing_file_yields_defaults() {
    let temp = TempDir::new().expect("tempdir");

    let loaded = Metadata::load(temp.path().join("metadata.dat")).expect("load");

    assert_eq!(loaded, Metadata::default());
}

#[test]
fn test_short_file_yields_defaults() {
    // Arrange: header claims more bitmap bytes than the file holds
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("metadata.dat");
    let bytes = sample().to_bytes();
    std::fs::write(&path, &bytes[..bytes.len() - 1]).expect("write");

    // Act
    let loaded = Metadata::load(&path).expect("load");

    // Assert
    assert_eq!(loaded, Metadata::default());
}

#[test]
fn test_overwrite_replaces_previous_contents() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("metadata.dat");
    sample().save(&path, false).expect("first save");

    let smaller = Metadata {
        total_users: 1,
        ..Metadata::default()
    };
    smaller.save(&path, true).expect("second save");

    assert_eq!(Metadata::load(&path).expect("load"), smaller);
}
