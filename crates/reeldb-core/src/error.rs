//! Error types for `ReelDB`.
//!
//! This module provides a unified error type for all `ReelDB` operations.
//! Every variant renders a stable `REEL-XXX` code, and [`Error::kind`] folds
//! the variants onto the short taxonomy used by the request/response front end.

use thiserror::Error;

/// Result type alias for `ReelDB` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `ReelDB` operations.
///
/// Error codes follow the pattern `REEL-XXX` for easy debugging.
#[derive(Error, Debug)]
pub enum Error {
    /// User not found (REEL-001).
    #[error("[REEL-001] User {0} not found")]
    UserNotFound(u32),

    /// Movie not found (REEL-002).
    #[error("[REEL-002] Movie {0} not found")]
    MovieNotFound(u32),

    /// User already exists (REEL-003).
    #[error("[REEL-003] User {0} already exists")]
    UserExists(u32),

    /// Movie already exists (REEL-004).
    #[error("[REEL-004] Movie {0} already exists")]
    MovieExists(u32),

    /// Rating outside `[1.0, 5.0]` (REEL-005).
    #[error("[REEL-005] Rating {0} is out of range [1.0, 5.0]")]
    RatingOutOfRange(f32),

    /// Invalid argument such as an oversized name or a bad genre list (REEL-006).
    #[error("[REEL-006] Invalid argument: {0}")]
    InvalidArgument(String),

    /// No free slot, id beyond capacity, or an index file at its size limit (REEL-007).
    #[error("[REEL-007] Capacity exceeded: {0}")]
    Capacity(String),

    /// On-disk data failed validation (REEL-008).
    ///
    /// Raised for id mismatches, short reads and malformed B-tree nodes.
    #[error("[REEL-008] Data corruption: {0}")]
    Corruption(String),

    /// IO error (REEL-009).
    #[error("[REEL-009] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error (REEL-010).
    #[error("[REEL-010] Configuration error: {0}")]
    Config(String),
}

/// Coarse error classification shared with the request/response layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// User or movie absent.
    NotFound,
    /// Id already present.
    Duplicate,
    /// Rating outside the accepted range.
    OutOfRange,
    /// Malformed input.
    InvalidArgument,
    /// Slot or file capacity exhausted.
    Capacity,
    /// On-disk data is inconsistent.
    Corruption,
    /// Underlying read/write/flush failure.
    Io,
    /// Configuration could not be loaded or validated.
    Config,
}

impl ErrorKind {
    /// Returns the short wire message for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Duplicate => "duplicate",
            Self::OutOfRange => "out_of_range",
            Self::InvalidArgument => "invalid_argument",
            Self::Capacity => "capacity",
            Self::Corruption => "corruption",
            Self::Io => "io_error",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Returns the error code (e.g., "REEL-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UserNotFound(_) => "REEL-001",
            Self::MovieNotFound(_) => "REEL-002",
            Self::UserExists(_) => "REEL-003",
            Self::MovieExists(_) => "REEL-004",
            Self::RatingOutOfRange(_) => "REEL-005",
            Self::InvalidArgument(_) => "REEL-006",
            Self::Capacity(_) => "REEL-007",
            Self::Corruption(_) => "REEL-008",
            Self::Io(_) => "REEL-009",
            Self::Config(_) => "REEL-010",
        }
    }

    /// Returns the coarse classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UserNotFound(_) | Self::MovieNotFound(_) => ErrorKind::NotFound,
            Self::UserExists(_) | Self::MovieExists(_) => ErrorKind::Duplicate,
            Self::RatingOutOfRange(_) => ErrorKind::OutOfRange,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Capacity(_) => ErrorKind::Capacity,
            Self::Corruption(_) => ErrorKind::Corruption,
            Self::Io(_) => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Returns true if this error is recoverable.
    ///
    /// Corruption is not: the affected file needs repair or a rebuild.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Corruption(_))
    }

    pub(crate) fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn capacity(msg: impl Into<String>) -> Self {
        Self::Capacity(msg.into())
    }
}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
