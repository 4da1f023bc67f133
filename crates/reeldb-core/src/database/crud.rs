//! User and movie operations.

use super::Database;
use crate::error::{Error, Result};
use crate::model::{validate_username, Movie, User};

use std::collections::BTreeSet;

impl Database {
    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    /// Creates a user. Any edge file left behind by an earlier user with the
    /// same id is removed first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserExists`] if the id is live,
    /// [`Error::InvalidArgument`] for id 0 or a bad name, or
    /// [`Error::Capacity`] for an id past slot capacity.
    pub fn add_user(&self, user_id: u32, username: &str) -> Result<User> {
        let _user_guard = self.locks.user(user_id).lock();
        let mut graph = self.graph.lock();

        if graph.user_exists(user_id)? {
            return Err(Error::UserExists(user_id));
        }
        validate_username(username)?;
        self.edges.delete_user(user_id)?;
        graph.add_user(user_id, username)
    }

    /// Reads a user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserNotFound`] if absent.
    pub fn get_user(&self, user_id: u32) -> Result<User> {
        self.graph.lock().get_user(user_id)
    }

    /// Overwrites a user record. `user.user_id` must equal `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserNotFound`] if absent or
    /// [`Error::InvalidArgument`] for a mismatched id or bad name.
    pub fn update_user(&self, user_id: u32, user: &User) -> Result<()> {
        let _user_guard = self.locks.user(user_id).lock();
        self.graph.lock().update_user(user_id, user)
    }

    /// Deletes a user and its rating edges.
    ///
    /// Movie aggregates are not adjusted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserNotFound`] if absent.
    pub fn delete_user(&self, user_id: u32) -> Result<()> {
        let _user_guard = self.locks.user(user_id).lock();
        self.graph.lock().delete_user(user_id)?;
        self.edges.delete_user(user_id)
    }

    /// Returns true if the user is live.
    ///
    /// # Errors
    ///
    /// Propagates index read failures.
    pub fn user_exists(&self, user_id: u32) -> Result<bool> {
        self.graph.lock().user_exists(user_id)
    }

    /// Live user ids in ascending order.
    ///
    /// # Errors
    ///
    /// Propagates index read failures.
    pub fn all_user_ids(&self) -> Result<Vec<u32>> {
        self.graph.lock().all_user_ids()
    }

    /// Number of live users.
    #[must_use]
    pub fn user_count(&self) -> u32 {
        self.graph.lock().user_count()
    }

    // -------------------------------------------------------------------------
    // Movies
    // -------------------------------------------------------------------------

    /// Creates a movie with an ordered genre list (first genre is primary).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MovieExists`] if the id is live,
    /// [`Error::InvalidArgument`] for a bad title or genre list, or
    /// [`Error::Capacity`] for an id past slot capacity.
    pub fn add_movie<S: AsRef<str>>(&self, movie_id: u32, title: &str, genres: &[S]) -> Result<Movie> {
        self.graph.lock().add_movie(movie_id, title, genres)
    }

    /// Reads a movie, including its rating aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MovieNotFound`] if absent.
    pub fn get_movie(&self, movie_id: u32) -> Result<Movie> {
        self.graph.lock().get_movie(movie_id)
    }

    /// Overwrites a movie record and re-indexes it.
    ///
    /// Serialized with rating writes on the same movie; the aggregate fields
    /// in `movie` are stored as given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MovieNotFound`] if absent or
    /// [`Error::InvalidArgument`] for a mismatched id, title or genre list.
    pub fn update_movie(&self, movie_id: u32, movie: &Movie) -> Result<()> {
        let movie_lock = self.locks.movie(movie_id);
        let _movie_guard = movie_lock.lock();
        self.graph.lock().update_movie(movie_id, movie)
    }

    /// Deletes a movie. Rating edges that reference it stay in users' files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MovieNotFound`] if absent.
    pub fn delete_movie(&self, movie_id: u32) -> Result<()> {
        let movie_lock = self.locks.movie(movie_id);
        let _movie_guard = movie_lock.lock();
        self.graph.lock().delete_movie(movie_id)
    }

    /// Returns true if the movie is live.
    ///
    /// # Errors
    ///
    /// Propagates index read failures.
    pub fn movie_exists(&self, movie_id: u32) -> Result<bool> {
        self.graph.lock().movie_exists(movie_id)
    }

    /// Live movie ids in ascending order.
    ///
    /// # Errors
    ///
    /// Propagates index read failures.
    pub fn all_movie_ids(&self) -> Result<Vec<u32>> {
        self.graph.lock().all_movie_ids()
    }

    /// Number of live movies.
    #[must_use]
    pub fn movie_count(&self) -> u32 {
        self.graph.lock().movie_count()
    }

    /// Copy of the movie ids listed under `genre`; empty if unknown.
    #[must_use]
    pub fn get_movies_by_genre(&self, genre: &str) -> Vec<u32> {
        self.graph.lock().movies_by_genre(genre)
    }

    /// Movies whose normalized title contains the normalized query, in
    /// ascending id order. An empty query returns nothing.
    #[must_use]
    pub fn search_movies_by_title(&self, query: &str) -> Vec<u32> {
        self.graph.lock().search_movies_by_title(query)
    }

    /// Every genre with at least one movie.
    #[must_use]
    pub fn all_genres(&self) -> BTreeSet<String> {
        self.graph.lock().all_genres()
    }
}
