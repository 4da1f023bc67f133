//! Entity records and their fixed-width on-disk encoding.
//!
//! All integers are little-endian. Strings occupy fixed-width, zero-padded
//! byte arrays with no length prefix; a stored string is always shorter than
//! its field so at least one terminating zero byte remains.
//!
//! | Record       | Layout                                                        | Size |
//! |--------------|---------------------------------------------------------------|------|
//! | [`User`]       | id u32, username [64], total_ratings u32, avg_rating_q u32, reserved u64 | 84 |
//! | [`Movie`]      | id u32, title [128], genres [5][32], genre_count u32, rating_count u32, sum_rating_q u32, reserved u64 | 312 |
//! | [`RatingEdge`] | movie_id u32, rating_q u32, timestamp u64                     | 16 |

use crate::error::{Error, Result};

use serde::{Deserialize, Serialize};

/// Width of the username field, including the terminating zero.
pub const USERNAME_LEN: usize = 64;
/// Width of the title field, including the terminating zero.
pub const TITLE_LEN: usize = 128;
/// Maximum number of genres per movie.
pub const MAX_GENRES: usize = 5;
/// Width of one genre field, including the terminating zero.
pub const GENRE_LEN: usize = 32;
/// Lowest accepted rating.
pub const MIN_RATING: f32 = 1.0;
/// Highest accepted rating.
pub const MAX_RATING: f32 = 5.0;

/// A record with a constant byte width.
///
/// Implementors encode into and decode from a buffer of exactly
/// [`FixedRecord::SIZE`] bytes. Decoding never fails: a zeroed buffer decodes
/// to a record whose id is 0.
pub trait FixedRecord: Sized {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Short entity name used in log and error messages.
    const KIND: &'static str;

    /// Identifier stored in the record itself.
    fn record_id(&self) -> u32;

    /// Writes the record into `buf[..Self::SIZE]`.
    fn encode(&self, buf: &mut [u8]);

    /// Reads a record from `buf[..Self::SIZE]`.
    fn decode(buf: &[u8]) -> Self;

    /// Encodes into a freshly allocated buffer.
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        self.encode(&mut buf);
        buf
    }
}

// -------------------------------------------------------------------------
// Rating quantization
// -------------------------------------------------------------------------

/// Converts a rating to its fixed-point form, `round(rating * 100)`.
///
/// # Errors
///
/// Returns [`Error::RatingOutOfRange`] unless `1.0 <= rating <= 5.0`.
pub fn quantize_rating(rating: f32) -> Result<u32> {
    if !rating.is_finite() || !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(Error::RatingOutOfRange(rating));
    }
    Ok((rating * 100.0).round() as u32)
}

/// Converts a fixed-point rating back to `f32`.
#[must_use]
pub fn dequantize_rating(rating_q: u32) -> f32 {
    rating_q as f32 / 100.0
}

// -------------------------------------------------------------------------
// Field validation
// -------------------------------------------------------------------------

fn validate_text(field: &str, value: &str, width: usize) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid(format!("{field} must not be empty")));
    }
    if value.len() >= width {
        return Err(Error::invalid(format!(
            "{field} is {} bytes, must be < {width}",
            value.len()
        )));
    }
    if value.as_bytes().contains(&0) {
        return Err(Error::invalid(format!("{field} must not contain NUL bytes")));
    }
    Ok(())
}

/// Checks that a username fits its field.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for empty or oversized names.
pub fn validate_username(name: &str) -> Result<()> {
    validate_text("username", name, USERNAME_LEN)
}

/// Checks that a title fits its field.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for empty or oversized titles.
pub fn validate_title(title: &str) -> Result<()> {
    validate_text("title", title, TITLE_LEN)
}

/// Checks a genre list: 1..=5 distinct names, each fitting its field.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if any rule is violated.
pub fn validate_genres<S: AsRef<str>>(genres: &[S]) -> Result<()> {
    if genres.is_empty() {
        return Err(Error::invalid("genre list must not be empty"));
    }
    if genres.len() > MAX_GENRES {
        return Err(Error::invalid(format!(
            "{} genres given, at most {MAX_GENRES} allowed",
            genres.len()
        )));
    }
    for (i, genre) in genres.iter().enumerate() {
        let genre = genre.as_ref();
        validate_text("genre", genre, GENRE_LEN)?;
        if genres[..i].iter().any(|g| g.as_ref() == genre) {
            return Err(Error::invalid(format!("duplicate genre '{genre}'")));
        }
    }
    Ok(())
}

// -------------------------------------------------------------------------
// Byte helpers
// -------------------------------------------------------------------------

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u64(buf: &mut [u8], at: usize, value: u64) {
    buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

fn put_str(buf: &mut [u8], at: usize, width: usize, value: &str) {
    let field = &mut buf[at..at + width];
    field.fill(0);
    let len = value.len().min(width - 1);
    field[..len].copy_from_slice(&value.as_bytes()[..len]);
}

fn get_u32(buf: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn get_u64(buf: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(raw)
}

fn get_str(buf: &[u8], at: usize, width: usize) -> String {
    let field = &buf[at..at + width];
    let end = field.iter().position(|&b| b == 0).unwrap_or(width);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

// -------------------------------------------------------------------------
// User
// -------------------------------------------------------------------------

/// A user record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    /// User id (>= 1).
    pub user_id: u32,
    /// Display name, < 64 bytes.
    pub username: String,
    /// Number of entries in the user's edge file.
    pub total_ratings: u32,
    /// Mean rating × 100.
    pub avg_rating_q: u32,
    /// Reserved for future use.
    pub reserved: u64,
}

impl User {
    /// Creates a user with no ratings.
    #[must_use]
    pub fn new(user_id: u32, username: &str) -> Self {
        Self {
            user_id,
            username: username.to_string(),
            ..Self::default()
        }
    }

    /// Mean rating as a float.
    #[must_use]
    pub fn avg_rating(&self) -> f32 {
        dequantize_rating(self.avg_rating_q)
    }
}

impl FixedRecord for User {
    const SIZE: usize = 4 + USERNAME_LEN + 4 + 4 + 8;
    const KIND: &'static str = "user";

    fn record_id(&self) -> u32 {
        self.user_id
    }

    fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.user_id);
        put_str(buf, 4, USERNAME_LEN, &self.username);
        put_u32(buf, 68, self.total_ratings);
        put_u32(buf, 72, self.avg_rating_q);
        put_u64(buf, 76, self.reserved);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            user_id: get_u32(buf, 0),
            username: get_str(buf, 4, USERNAME_LEN),
            total_ratings: get_u32(buf, 68),
            avg_rating_q: get_u32(buf, 72),
            reserved: get_u64(buf, 76),
        }
    }
}

// -------------------------------------------------------------------------
// Movie
// -------------------------------------------------------------------------

const MOVIE_GENRES_AT: usize = 4 + TITLE_LEN;
const MOVIE_COUNT_AT: usize = MOVIE_GENRES_AT + MAX_GENRES * GENRE_LEN;

/// A movie record with its rating aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Movie {
    /// Movie id (>= 1).
    pub movie_id: u32,
    /// Title, < 128 bytes.
    pub title: String,
    /// Ordered genre names; the first one is the primary genre.
    pub genres: Vec<String>,
    /// Number of distinct users with a rating for this movie.
    pub rating_count: u32,
    /// Sum of all current ratings × 100.
    pub sum_rating_q: u32,
    /// Reserved for future use.
    pub reserved: u64,
}

impl Movie {
    /// Creates an unrated movie.
    #[must_use]
    pub fn new<S: AsRef<str>>(movie_id: u32, title: &str, genres: &[S]) -> Self {
        Self {
            movie_id,
            title: title.to_string(),
            genres: genres.iter().map(|g| g.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    /// First genre, if any.
    #[must_use]
    pub fn primary_genre(&self) -> Option<&str> {
        self.genres.first().map(String::as_str)
    }

    /// Average rating, or 0.0 when unrated.
    #[must_use]
    pub fn avg_rating(&self) -> f32 {
        if self.rating_count == 0 {
            return 0.0;
        }
        (f64::from(self.sum_rating_q) / 100.0 / f64::from(self.rating_count)) as f32
    }
}

impl FixedRecord for Movie {
    const SIZE: usize = 4 + TITLE_LEN + MAX_GENRES * GENRE_LEN + 4 + 4 + 4 + 8;
    const KIND: &'static str = "movie";

    fn record_id(&self) -> u32 {
        self.movie_id
    }

    fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.movie_id);
        put_str(buf, 4, TITLE_LEN, &self.title);
        buf[MOVIE_GENRES_AT..MOVIE_COUNT_AT].fill(0);
        let count = self.genres.len().min(MAX_GENRES);
        for (i, genre) in self.genres.iter().take(count).enumerate() {
            put_str(buf, MOVIE_GENRES_AT + i * GENRE_LEN, GENRE_LEN, genre);
        }
        put_u32(buf, MOVIE_COUNT_AT, count as u32);
        put_u32(buf, MOVIE_COUNT_AT + 4, self.rating_count);
        put_u32(buf, MOVIE_COUNT_AT + 8, self.sum_rating_q);
        put_u64(buf, MOVIE_COUNT_AT + 12, self.reserved);
    }

    fn decode(buf: &[u8]) -> Self {
        let count = (get_u32(buf, MOVIE_COUNT_AT) as usize).min(MAX_GENRES);
        Self {
            movie_id: get_u32(buf, 0),
            title: get_str(buf, 4, TITLE_LEN),
            genres: (0..count)
                .map(|i| get_str(buf, MOVIE_GENRES_AT + i * GENRE_LEN, GENRE_LEN))
                .collect(),
            rating_count: get_u32(buf, MOVIE_COUNT_AT + 4),
            sum_rating_q: get_u32(buf, MOVIE_COUNT_AT + 8),
            reserved: get_u64(buf, MOVIE_COUNT_AT + 12),
        }
    }
}

// -------------------------------------------------------------------------
// RatingEdge
// -------------------------------------------------------------------------

/// One user → movie rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RatingEdge {
    /// Rated movie.
    pub movie_id: u32,
    /// Rating × 100 (100..=500).
    pub rating_q: u32,
    /// Seconds since the Unix epoch of the last write.
    pub timestamp: u64,
}

impl RatingEdge {
    /// Creates an edge.
    #[must_use]
    pub fn new(movie_id: u32, rating_q: u32, timestamp: u64) -> Self {
        Self {
            movie_id,
            rating_q,
            timestamp,
        }
    }

    /// Rating as a float.
    #[must_use]
    pub fn rating(&self) -> f32 {
        dequantize_rating(self.rating_q)
    }
}

impl FixedRecord for RatingEdge {
    const SIZE: usize = 16;
    const KIND: &'static str = "rating";

    fn record_id(&self) -> u32 {
        self.movie_id
    }

    fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.movie_id);
        put_u32(buf, 4, self.rating_q);
        put_u64(buf, 8, self.timestamp);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            movie_id: get_u32(buf, 0),
            rating_q: get_u32(buf, 4),
            timestamp: get_u64(buf, 8),
        }
    }
}
