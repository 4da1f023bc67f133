//! Tests for `error` module

use super::error::*;

// -------------------------------------------------------------------------
// Error code tests
// -------------------------------------------------------------------------

fn all_variants() -> Vec<Error> {
    vec![
        Error::UserNotFound(1),
        Error::MovieNotFound(2),
        Error::UserExists(3),
        Error::MovieExists(4),
        Error::RatingOutOfRange(5.5),
        Error::InvalidArgument("test".into()),
        Error::Capacity("test".into()),
        Error::Corruption("test".into()),
        Error::Io(std::io::Error::other("test")),
        Error::Config("test".into()),
    ]
}

#[test]
fn test_error_codes_are_unique() {
    // Arrange
    let errors = all_variants();

    // Act
    let codes: Vec<&str> = errors.iter().map(Error::code).collect();

    // Assert
    let mut unique_codes = codes.clone();
    unique_codes.sort_unstable();
    unique_codes.dedup();
    assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");

    for code in &codes {
        assert!(code.starts_with("REEL-"), "Code {code} should start with REEL-");
    }
}

#[test]
fn test_error_display_includes_code() {
    // Arrange
    let err = Error::MovieNotFound(42);

    // Act
    let display = format!("{err}");

    // Assert
    assert!(display.contains("REEL-002"));
    assert!(display.contains("42"));
}

#[test]
fn test_kind_folds_entity_variants() {
    assert_eq!(Error::UserNotFound(1).kind(), ErrorKind::NotFound);
    assert_eq!(Error::MovieNotFound(1).kind(), ErrorKind::NotFound);
    assert_eq!(Error::UserExists(1).kind(), ErrorKind::Duplicate);
    assert_eq!(Error::MovieExists(1).kind(), ErrorKind::Duplicate);
    assert_eq!(Error::RatingOutOfRange(0.5).kind(), ErrorKind::OutOfRange);
}

#[test]
fn test_kind_wire_messages_are_unique() {
    // Arrange
    let mut messages: Vec<&str> = all_variants().iter().map(|e| e.kind().as_str()).collect();

    // Act
    messages.sort_unstable();
    messages.dedup();

    // Assert: 10 variants fold onto 8 kinds
    assert_eq!(messages.len(), 8);
    assert!(messages.contains(&"not_found"));
    assert!(messages.contains(&"io_error"));
}

#[test]
fn test_io_error_conversion() {
    // Arrange
    let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short");

    // Act
    let err: Error = io.into();

    // Assert
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(err.code(), "REEL-009");
}

#[test]
fn test_corruption_is_not_recoverable() {
    assert!(!Error::Corruption("bad node".into()).is_recoverable());
    assert!(Error::UserNotFound(7).is_recoverable());
    assert!(Error::Capacity("full".into()).is_recoverable());
}
