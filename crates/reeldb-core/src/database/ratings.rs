//! Rating writes and reads.
//!
//! A rating write touches three files in order: the user's edge file, the
//! movie record, then the user record. A crash between steps leaves the
//! later aggregates one rating behind; nothing is rolled back.

use super::Database;
use crate::error::{Error, Result};
use crate::model::{quantize_rating, Movie, RatingEdge};

impl Database {
    /// Sets `user_id`'s rating of `movie_id`.
    ///
    /// A repeat rating replaces the previous one: the movie's count is
    /// unchanged and its sum moves by the difference. Writes to the same
    /// movie are serialized; the last writer wins.
    ///
    /// # Errors
    ///
    /// - [`Error::RatingOutOfRange`] unless `1.0 <= rating <= 5.0`
    /// - [`Error::UserNotFound`] / [`Error::MovieNotFound`]
    /// - [`Error::Capacity`] if the movie's rating sum would overflow
    pub fn add_rating(&self, user_id: u32, movie_id: u32, rating: f32) -> Result<()> {
        let rating_q = quantize_rating(rating)?;
        // Early reject so unknown ids never allocate a movie lock.
        {
            let mut graph = self.graph.lock();
            graph.get_user(user_id)?;
            graph.get_movie(movie_id)?;
        }

        let movie_lock = self.locks.movie(movie_id);
        let _movie_guard = movie_lock.lock();
        let _user_guard = self.locks.user(user_id).lock();

        // Re-checked under the locks: delete_user holds this stripe and
        // delete_movie this movie lock while they run.
        let mut movie = {
            let mut graph = self.graph.lock();
            graph.get_user(user_id)?;
            graph.get_movie(movie_id)?
        };
        let previous = self.edges.get(user_id, movie_id)?.map(|e| e.rating_q);
        apply_rating(&mut movie, previous, rating_q)?;

        let upsert = self.edges.upsert(user_id, movie_id, rating_q)?;

        let mut graph = self.graph.lock();
        graph.store_movie_aggregate(&movie)?;

        let mut user = graph.get_user(user_id)?;
        user.total_ratings = upsert.total;
        user.avg_rating_q = mean_q(upsert.sum_q, upsert.total);
        graph.update_user(user_id, &user)
    }

    /// The user's current rating of a movie, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corruption`] if the edge file is truncated.
    pub fn get_rating(&self, user_id: u32, movie_id: u32) -> Result<Option<f32>> {
        let _user_guard = self.locks.user(user_id).lock();
        Ok(self.edges.get(user_id, movie_id)?.map(|e| e.rating()))
    }

    /// Returns true if the user has rated the movie.
    ///
    /// # Errors
    ///
    /// See [`Database::get_rating`].
    pub fn has_rated(&self, user_id: u32, movie_id: u32) -> Result<bool> {
        let _user_guard = self.locks.user(user_id).lock();
        self.edges.has(user_id, movie_id)
    }

    /// Every rating of a user, in the order first given.
    ///
    /// # Errors
    ///
    /// See [`Database::get_rating`].
    pub fn user_ratings(&self, user_id: u32) -> Result<Vec<RatingEdge>> {
        let _user_guard = self.locks.user(user_id).lock();
        self.edges.read(user_id)
    }

    /// Removes a user's edge file without touching the user record or any
    /// movie aggregate.
    ///
    /// # Errors
    ///
    /// Returns an IO error if an existing file cannot be removed.
    pub fn delete_user_edges(&self, user_id: u32) -> Result<()> {
        let _user_guard = self.locks.user(user_id).lock();
        self.edges.delete_user(user_id)
    }
}

/// Folds one rating into a movie's aggregate.
pub(super) fn apply_rating(movie: &mut Movie, previous: Option<u32>, rating_q: u32) -> Result<()> {
    let base = match previous {
        Some(old) => movie.sum_rating_q.saturating_sub(old),
        None => movie.sum_rating_q,
    };
    let sum = base.checked_add(rating_q);
    let count = match previous {
        Some(_) => Some(movie.rating_count),
        None => movie.rating_count.checked_add(1),
    };

    match (sum, count) {
        (Some(sum), Some(count)) => {
            movie.sum_rating_q = sum;
            movie.rating_count = count;
            Ok(())
        }
        _ => Err(Error::capacity(format!(
            "rating aggregate of movie {} would overflow",
            movie.movie_id
        ))),
    }
}

/// Rounded mean of `total` quantized ratings summing to `sum_q`.
pub(super) fn mean_q(sum_q: u64, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let total = u64::from(total);
    ((sum_q + total / 2) / total) as u32
}
