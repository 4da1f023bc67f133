//! Graph store over users and movies.
//!
//! [`GraphDatabase`] owns the primary indexes, record stores, slot bitmaps and
//! in-memory secondary indexes. It is single-threaded: [`crate::Database`]
//! wraps it in its coarse mutex and layers rating edges on top.
//!
//! The primary index maps an id to its slot, which is the id itself. The index
//! is authoritative for existence; a record whose id is absent from the index
//! is a tombstone even if its bytes remain in the data file.

use crate::config::ReelConfig;
use crate::error::{Error, Result};
use crate::index::{BTree, GenreIndex, TitleIndex};
use crate::model::{validate_genres, validate_title, validate_username, FixedRecord, Movie, User};
use crate::storage::{Bitmap, Metadata, RecordStore};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// User primary index file.
pub const USER_INDEX_FILE: &str = "user_index.dat";
/// Movie primary index file.
pub const MOVIE_INDEX_FILE: &str = "movie_index.dat";
/// User record file.
pub const USERS_FILE: &str = "users.dat";
/// Movie record file.
pub const MOVIES_FILE: &str = "movies.dat";
/// Counters and bitmaps.
pub const METADATA_FILE: &str = "metadata.dat";

/// Counts reported by [`GraphDatabase::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DatabaseStats {
    /// Live users.
    pub users: u32,
    /// Live movies.
    pub movies: u32,
    /// Distinct genres with at least one movie.
    pub genres: usize,
    /// Highest user id ever stored.
    pub max_user_slot: u32,
    /// Highest movie id ever stored.
    pub max_movie_slot: u32,
}

/// User and movie storage with its indexes.
#[derive(Debug)]
pub struct GraphDatabase {
    dir: PathBuf,
    sync_writes: bool,
    max_slots: u32,

    user_index: BTree<u32>,
    movie_index: BTree<u32>,
    users: RecordStore<User>,
    movies: RecordStore<Movie>,
    user_slots: Bitmap,
    movie_slots: Bitmap,

    genres: GenreIndex,
    titles: TitleIndex,

    total_users: u32,
    total_movies: u32,
    max_user_slot: u32,
    max_movie_slot: u32,
}

impl GraphDatabase {
    /// Opens every file under `dir` and rebuilds in-memory state.
    ///
    /// Bitmaps and totals are re-derived from the primary indexes; where they
    /// disagree with `metadata.dat` the index wins and a warning is logged.
    /// Movie records that fail to load are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be opened or a header or index node
    /// is corrupt.
    pub fn open<P: AsRef<Path>>(dir: P, config: &ReelConfig) -> Result<Self> {
        let started = Instant::now();
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let sync_writes = config.storage.sync_writes;
        let max_bytes = config.storage.max_index_bytes;
        let max_slots = config.storage.max_slots;

        let mut graph = Self {
            user_index: BTree::open(dir.join(USER_INDEX_FILE), sync_writes, max_bytes)?,
            movie_index: BTree::open(dir.join(MOVIE_INDEX_FILE), sync_writes, max_bytes)?,
            users: RecordStore::open(dir.join(USERS_FILE), sync_writes)?,
            movies: RecordStore::open(dir.join(MOVIES_FILE), sync_writes)?,
            user_slots: Bitmap::new(max_slots),
            movie_slots: Bitmap::new(max_slots),
            genres: GenreIndex::new(config.index.genre_list_cap),
            titles: TitleIndex::new(),
            total_users: 0,
            total_movies: 0,
            max_user_slot: 0,
            max_movie_slot: 0,
            dir,
            sync_writes,
            max_slots,
        };

        let meta = Metadata::load(graph.dir.join(METADATA_FILE))?;
        graph.rebuild_users(&meta)?;
        let skipped = graph.rebuild_movies(&meta)?;

        tracing::info!(
            users = graph.total_users,
            movies = graph.total_movies,
            genres = graph.genres.len(),
            skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Graph indexes rebuilt"
        );
        Ok(graph)
    }

    fn rebuild_users(&mut self, meta: &Metadata) -> Result<()> {
        let ids = self.user_index.keys()?;
        for &id in &ids {
            if self.user_slots.set(id).is_err() {
                tracing::warn!(user_id = id, max_slots = self.max_slots, "User id beyond slot capacity");
            }
        }
        self.total_users = ids.len() as u32;
        self.max_user_slot = meta.max_user_slot.max(ids.last().copied().unwrap_or(0));

        reconcile("user", &self.user_slots, &meta.user_bitmap, meta.total_users, self.total_users);
        Ok(())
    }

    fn rebuild_movies(&mut self, meta: &Metadata) -> Result<usize> {
        let entries = self.movie_index.entries()?;
        let mut skipped = 0usize;
        for &(id, slot) in &entries {
            if self.movie_slots.set(id).is_err() {
                tracing::warn!(movie_id = id, max_slots = self.max_slots, "Movie id beyond slot capacity");
            }
            match skip_corrupt(id, self.load_movie(id, slot))? {
                Some(movie) => {
                    self.genres.insert(movie.movie_id, &movie.genres);
                    self.titles.insert(movie.movie_id, &movie.title);
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, "Skipped unreadable movie records during rebuild");
        }

        self.total_movies = entries.len() as u32;
        self.max_movie_slot = meta
            .max_movie_slot
            .max(entries.last().map_or(0, |&(id, _)| id));

        reconcile("movie", &self.movie_slots, &meta.movie_bitmap, meta.total_movies, self.total_movies);
        Ok(skipped)
    }

    /// Directory holding the data files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Slot capacity of each bitmap; valid ids are `1..max_slots`.
    #[must_use]
    pub fn max_slots(&self) -> u32 {
        self.max_slots
    }

    fn check_id(&self, id: u32) -> Result<()> {
        if id == 0 {
            return Err(Error::invalid("id 0 is reserved"));
        }
        if id >= self.max_slots {
            return Err(Error::capacity(format!(
                "id {id} is beyond slot capacity {}",
                self.max_slots
            )));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    /// Creates a user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserExists`] for a live id, [`Error::InvalidArgument`]
    /// for id 0 or a bad name, or [`Error::Capacity`] for an id past capacity.
    pub fn add_user(&mut self, user_id: u32, username: &str) -> Result<User> {
        self.check_id(user_id)?;
        validate_username(username)?;
        if self.user_index.contains(user_id)? {
            return Err(Error::UserExists(user_id));
        }

        let user = User::new(user_id, username);
        self.users.write(user_id, &user)?;
        self.user_index.insert(user_id, u64::from(user_id))?;
        self.user_slots.set(user_id)?;
        self.total_users += 1;
        self.max_user_slot = self.max_user_slot.max(user_id);
        Ok(user)
    }

    /// Reads a user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserNotFound`] if absent, or [`Error::Corruption`] if
    /// the stored record carries another id.
    pub fn get_user(&mut self, user_id: u32) -> Result<User> {
        let slot = self
            .user_index
            .search(user_id)?
            .ok_or(Error::UserNotFound(user_id))?;
        let user = self.users.read(slot_of(slot)?)?;
        if user.user_id != user_id {
            return Err(mismatch::<User>(user_id, user.user_id));
        }
        Ok(user)
    }

    /// Overwrites a user record in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserNotFound`] if absent, or [`Error::InvalidArgument`]
    /// if `user.user_id != user_id` or the name is invalid.
    pub fn update_user(&mut self, user_id: u32, user: &User) -> Result<()> {
        if user.user_id != user_id {
            return Err(Error::invalid(format!(
                "record id {} does not match user {user_id}",
                user.user_id
            )));
        }
        validate_username(&user.username)?;
        let slot = self
            .user_index
            .search(user_id)?
            .ok_or(Error::UserNotFound(user_id))?;
        self.users.write(slot_of(slot)?, user)
    }

    /// Removes a user from the index and frees its slot. Record bytes stay
    /// on disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserNotFound`] if absent.
    pub fn delete_user(&mut self, user_id: u32) -> Result<()> {
        if !self.user_index.delete(user_id)? {
            return Err(Error::UserNotFound(user_id));
        }
        self.user_slots.free(user_id);
        self.total_users = self.total_users.saturating_sub(1);
        Ok(())
    }

    /// Returns true if the user is live.
    ///
    /// # Errors
    ///
    /// Propagates index read failures.
    pub fn user_exists(&mut self, user_id: u32) -> Result<bool> {
        self.user_index.contains(user_id)
    }

    /// Live user ids, ascending.
    ///
    /// # Errors
    ///
    /// Propagates index read failures.
    pub fn all_user_ids(&mut self) -> Result<Vec<u32>> {
        self.user_index.keys()
    }

    /// Number of live users.
    #[must_use]
    pub fn user_count(&self) -> u32 {
        self.total_users
    }

    // -------------------------------------------------------------------------
    // Movies
    // -------------------------------------------------------------------------

    /// Creates a movie and indexes its genres and title.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MovieExists`] for a live id, [`Error::InvalidArgument`]
    /// for a bad title or genre list, or [`Error::Capacity`] for an id past
    /// capacity.
    pub fn add_movie<S: AsRef<str>>(
        &mut self,
        movie_id: u32,
        title: &str,
        genres: &[S],
    ) -> Result<Movie> {
        self.check_id(movie_id)?;
        validate_title(title)?;
        validate_genres(genres)?;
        if self.movie_index.contains(movie_id)? {
            return Err(Error::MovieExists(movie_id));
        }

        let movie = Movie::new(movie_id, title, genres);
        self.movies.write(movie_id, &movie)?;
        self.movie_index.insert(movie_id, u64::from(movie_id))?;
        self.movie_slots.set(movie_id)?;
        self.total_movies += 1;
        self.max_movie_slot = self.max_movie_slot.max(movie_id);

        self.genres.insert(movie_id, &movie.genres);
        self.titles.insert(movie_id, &movie.title);
        Ok(movie)
    }

    /// Reads a movie.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MovieNotFound`] if absent, or [`Error::Corruption`]
    /// if the stored record carries another id.
    pub fn get_movie(&mut self, movie_id: u32) -> Result<Movie> {
        let slot = self
            .movie_index
            .search(movie_id)?
            .ok_or(Error::MovieNotFound(movie_id))?;
        self.load_movie(movie_id, slot)
    }

    fn load_movie(&mut self, movie_id: u32, slot: u64) -> Result<Movie> {
        let movie = self.movies.read(slot_of(slot)?)?;
        if movie.movie_id != movie_id {
            return Err(mismatch::<Movie>(movie_id, movie.movie_id));
        }
        Ok(movie)
    }

    /// Overwrites a movie and re-indexes its genres and title.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MovieNotFound`] if absent, or
    /// [`Error::InvalidArgument`] if the id, title or genres are invalid.
    pub fn update_movie(&mut self, movie_id: u32, movie: &Movie) -> Result<()> {
        if movie.movie_id != movie_id {
            return Err(Error::invalid(format!(
                "record id {} does not match movie {movie_id}",
                movie.movie_id
            )));
        }
        validate_title(&movie.title)?;
        validate_genres(&movie.genres)?;

        let prior = self.get_movie(movie_id)?;
        self.movies.write(movie_id, movie)?;

        self.genres.remove(movie_id);
        self.titles.remove(movie_id, &prior.title);
        self.genres.insert(movie_id, &movie.genres);
        self.titles.insert(movie_id, &movie.title);
        Ok(())
    }

    /// Writes a movie's rating aggregate without touching the secondary
    /// indexes. Title and genres in `movie` must be unchanged.
    pub(crate) fn store_movie_aggregate(&mut self, movie: &Movie) -> Result<()> {
        let slot = self
            .movie_index
            .search(movie.movie_id)?
            .ok_or(Error::MovieNotFound(movie.movie_id))?;
        self.movies.write(slot_of(slot)?, movie)
    }

    /// Removes a movie from the primary and secondary indexes and frees its
    /// slot. Users' edges that reference it are left in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MovieNotFound`] if absent.
    pub fn delete_movie(&mut self, movie_id: u32) -> Result<()> {
        let prior = match self.get_movie(movie_id) {
            Ok(movie) => Some(movie),
            Err(Error::Corruption(_)) => None,
            Err(e) => return Err(e),
        };
        if !self.movie_index.delete(movie_id)? {
            return Err(Error::MovieNotFound(movie_id));
        }
        self.movie_slots.free(movie_id);
        self.total_movies = self.total_movies.saturating_sub(1);

        self.genres.remove(movie_id);
        match prior {
            Some(prior) => self.titles.remove(movie_id, &prior.title),
            None => self.titles.remove_id(movie_id),
        }
        Ok(())
    }

    /// Returns true if the movie is live.
    ///
    /// # Errors
    ///
    /// Propagates index read failures.
    pub fn movie_exists(&mut self, movie_id: u32) -> Result<bool> {
        self.movie_index.contains(movie_id)
    }

    /// Live movie ids, ascending.
    ///
    /// # Errors
    ///
    /// Propagates index read failures.
    pub fn all_movie_ids(&mut self) -> Result<Vec<u32>> {
        self.movie_index.keys()
    }

    /// Number of live movies.
    #[must_use]
    pub fn movie_count(&self) -> u32 {
        self.total_movies
    }

    /// Ids listed under `genre`.
    #[must_use]
    pub fn movies_by_genre(&self, genre: &str) -> Vec<u32> {
        self.genres.get(genre)
    }

    /// Ids whose normalized title contains the normalized query.
    #[must_use]
    pub fn search_movies_by_title(&self, query: &str) -> Vec<u32> {
        self.titles.search(query)
    }

    /// Every indexed genre name.
    #[must_use]
    pub fn all_genres(&self) -> BTreeSet<String> {
        self.genres.genres()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Current counters and bitmaps.
    #[must_use]
    pub fn metadata(&self) -> Metadata {
        Metadata {
            total_users: self.total_users,
            total_movies: self.total_movies,
            max_user_slot: self.max_user_slot,
            max_movie_slot: self.max_movie_slot,
            user_bitmap: self.user_slots.as_bytes().to_vec(),
            movie_bitmap: self.movie_slots.as_bytes().to_vec(),
        }
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            users: self.total_users,
            movies: self.total_movies,
            genres: self.genres.len(),
            max_user_slot: self.max_user_slot,
            max_movie_slot: self.max_movie_slot,
        }
    }

    /// Syncs every file and saves `metadata.dat`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if a sync or the metadata write fails.
    pub fn flush(&mut self) -> Result<()> {
        self.user_index.sync()?;
        self.movie_index.sync()?;
        self.users.sync()?;
        self.movies.sync()?;
        self.metadata()
            .save(self.dir.join(METADATA_FILE), self.sync_writes)
    }
}

/// Turns a corrupt record into `None` so a rebuild can continue; every other
/// error aborts the open.
pub(crate) fn skip_corrupt<R>(id: u32, loaded: Result<R>) -> Result<Option<R>> {
    match loaded {
        Ok(record) => Ok(Some(record)),
        Err(Error::Corruption(reason)) => {
            tracing::debug!(id, %reason, "Unreadable record");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn slot_of(value: u64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::corruption(format!("index value {value} is not a valid slot")))
}

fn mismatch<R: FixedRecord>(wanted: u32, found: u32) -> Error {
    Error::corruption(format!(
        "{} slot {wanted} holds record id {found}",
        R::KIND
    ))
}

/// Logs where persisted metadata disagrees with state rebuilt from an index.
fn reconcile(kind: &str, rebuilt: &Bitmap, persisted: &[u8], persisted_total: u32, total: u32) {
    if persisted_total != total {
        tracing::warn!(
            kind,
            persisted = persisted_total,
            rebuilt = total,
            "Metadata total disagrees with primary index"
        );
    }
    if persisted.is_empty() {
        return;
    }
    match Bitmap::from_bytes(rebuilt.capacity(), persisted) {
        Ok(stored) if stored == *rebuilt => {}
        Ok(_) => tracing::warn!(kind, "Persisted slot bitmap disagrees with primary index"),
        Err(_) => tracing::warn!(
            kind,
            bytes = persisted.len(),
            "Persisted slot bitmap has the wrong size, discarded"
        ),
    }
}
