//! Tests for `page` module

use super::page::{PageFile, PAGE_SIZE};
use crate::error::Error;

use tempfile::TempDir;

fn create_test_file() -> (PageFile, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let file = PageFile::open(temp_dir.path().join("pages.dat"), false).expect("open");
    (file, temp_dir)
}

#[test]
fn test_write_then_read_at_offset() {
    // Arrange
    let (mut file, _temp) = create_test_file();

    // Act
    file.write_at(100, b"hello").expect("write");
    let bytes = file.read_at(100, 5).expect("read");

    // Assert
    assert_eq!(bytes, b"hello");
}

#[test]
fn test_write_past_eof_leaves_zero_hole() {
    // Arrange
    let (mut file, _temp) = create_test_file();

    // Act
    file.write_at(PAGE_SIZE as u64, &[7u8; 4]).expect("write");
    let hole = file.read_at(0, PAGE_SIZE).expect("read hole");

    // Assert
    assert!(hole.iter().all(|&b| b == 0));
    assert_eq!(file.len().expect("len"), PAGE_SIZE as u64 + 4);
}

#[test]
fn test_short_read_is_corruption() {
    // Arrange
    let (mut file, _temp) = create_test_file();
    file.write_at(0, &[1u8; 10]).expect("write");

    // Act
    let result = file.read_at(4, 16);

    // Assert
    assert!(matches!(result, Err(Error::Corruption(_))));
}

#[test]
fn test_read_or_zero_pads_past_eof() {
    // Arrange
    let (mut file, _temp) = create_test_file();
    file.write_at(0, &[9u8; 4]).expect("write");

    // Act
    let bytes = file.read_at_or_zero(2, 6).expect("read");

    // Assert
    assert_eq!(bytes, vec![9, 9, 0, 0, 0, 0]);
}

#[test]
fn test_reopen_sees_previous_writes() {
    // Arrange
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("reopen.dat");
    {
        let mut file = PageFile::open(&path, true).expect("open");
        file.write_at(8, &42u64.to_le_bytes()).expect("write");
    }

    // Act
    let mut file = PageFile::open(&path, false).expect("reopen");
    let bytes = file.read_at(8, 8).expect("read");

    // Assert
    assert_eq!(u64::from_le_bytes(bytes.try_into().expect("8 bytes")), 42);
}
