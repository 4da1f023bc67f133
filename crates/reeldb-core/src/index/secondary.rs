//! In-memory secondary indexes over movies.
//!
//! Neither index is persisted. Both are rebuilt from the movie primary index
//! at open and kept in step with every movie mutation.

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

/// Normalizes a title for search: ASCII alphanumerics only, lowercased.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Genre name → movie ids, in insertion order.
#[derive(Debug, Clone)]
pub struct GenreIndex {
    lists: FxHashMap<String, Vec<u32>>,
    cap: usize,
}

impl GenreIndex {
    /// Creates an empty index whose lists hold at most `cap` ids each.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            lists: FxHashMap::default(),
            cap,
        }
    }

    /// Appends `movie_id` under each genre. Lists already at the cap are
    /// left unchanged.
    pub fn insert<S: AsRef<str>>(&mut self, movie_id: u32, genres: &[S]) {
        for genre in genres {
            let list = self.lists.entry(genre.as_ref().to_string()).or_default();
            if list.len() < self.cap {
                list.push(movie_id);
            }
        }
    }

    /// Removes `movie_id` from every list, dropping lists left empty.
    pub fn remove(&mut self, movie_id: u32) {
        self.lists.retain(|_, ids| {
            ids.retain(|&id| id != movie_id);
            !ids.is_empty()
        });
    }

    /// Copy of the ids listed under `genre` (empty if unknown).
    #[must_use]
    pub fn get(&self, genre: &str) -> Vec<u32> {
        self.lists.get(genre).cloned().unwrap_or_default()
    }

    /// All genre names with at least one movie.
    #[must_use]
    pub fn genres(&self) -> BTreeSet<String> {
        self.lists.keys().cloned().collect()
    }

    /// Number of distinct genres.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    /// Returns true if no genre is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.lists.clear();
    }
}

/// Normalized title → ids of the movies sharing it.
#[derive(Debug, Clone, Default)]
pub struct TitleIndex {
    titles: FxHashMap<String, Vec<u32>>,
}

impl TitleIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes `movie_id` under the normalized form of `title`.
    pub fn insert(&mut self, movie_id: u32, title: &str) {
        let ids = self.titles.entry(normalize_title(title)).or_default();
        if let Err(pos) = ids.binary_search(&movie_id) {
            ids.insert(pos, movie_id);
        }
    }

    /// Removes `movie_id` from the entry for `title`.
    pub fn remove(&mut self, movie_id: u32, title: &str) {
        let key = normalize_title(title);
        if let Some(ids) = self.titles.get_mut(&key) {
            ids.retain(|&id| id != movie_id);
            if ids.is_empty() {
                self.titles.remove(&key);
            }
        }
    }

    /// Drops `movie_id` from every title, for when its title is unknown.
    pub fn remove_id(&mut self, movie_id: u32) {
        self.titles.retain(|_, ids| {
            ids.retain(|&id| id != movie_id);
            !ids.is_empty()
        });
    }

    /// Ids whose normalized title contains the normalized `query`, ascending
    /// and without duplicates. A query that normalizes to nothing matches
    /// nothing.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<u32> {
        let needle = normalize_title(query);
        if needle.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<u32> = self
            .titles
            .iter()
            .filter(|(title, _)| title.contains(needle.as_str()))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();
        hits.sort_unstable();
        hits.dedup();
        hits
    }

    /// Number of distinct normalized titles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.titles.len()
    }

    /// Returns true if no title is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.titles.clear();
    }
}
