//! Lock table for rating writes.
//!
//! # Lock Ordering
//!
//! movie lock → user stripe → graph mutex. The graph mutex is only ever held
//! for short sections and never while waiting on the other two.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Per-movie mutexes plus striped per-user mutexes.
pub(crate) struct RatingLocks {
    /// Created lazily, kept for the life of the process.
    movies: DashMap<u32, Arc<Mutex<()>>>,
    users: Box<[Mutex<()>]>,
    mask: usize,
}

impl RatingLocks {
    /// `stripes` must be a power of two.
    pub(crate) fn new(stripes: usize) -> Self {
        debug_assert!(stripes.is_power_of_two());
        let users = (0..stripes).map(|_| Mutex::new(())).collect();
        Self {
            movies: DashMap::new(),
            users,
            mask: stripes - 1,
        }
    }

    /// The mutex owned by `movie_id`.
    pub(crate) fn movie(&self, movie_id: u32) -> Arc<Mutex<()>> {
        let entry = self
            .movies
            .entry(movie_id)
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(entry.value())
    }

    /// The stripe guarding `user_id`'s edge file.
    pub(crate) fn user(&self, user_id: u32) -> &Mutex<()> {
        &self.users[user_id as usize & self.mask]
    }

    /// Number of movie mutexes created so far.
    pub(crate) fn movie_lock_count(&self) -> usize {
        self.movies.len()
    }
}

impl std::fmt::Debug for RatingLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatingLocks")
            .field("movies", &self.movies.len())
            .field("user_stripes", &self.users.len())
            .finish()
    }
}
