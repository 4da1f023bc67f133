//! `ReelDB` Configuration Module
//!
//! Provides configuration file support via `reeldb.toml`, environment variables,
//! and programmatic overrides.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`REELDB_*`)
//! 2. Configuration file (`reeldb.toml`)
//! 3. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::index::btree::NODE_SIZE_U32;

/// Default bitmap capacity (and exclusive upper bound on entity ids).
pub const DEFAULT_MAX_SLOTS: u32 = 1_000_000;

/// Default cap on the number of movie ids kept per genre list.
pub const DEFAULT_GENRE_LIST_CAP: usize = 5000;

/// Upper bound accepted for `storage.max_slots`.
const MAX_SLOTS_LIMIT: u32 = 16_777_216;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },
}

/// Storage configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Call `sync_data` after every page write, on top of the flush.
    pub sync_writes: bool,
    /// Bitmap capacity; ids must be strictly below this value.
    pub max_slots: u32,
    /// Maximum size of a B-tree index file in bytes.
    pub max_index_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sync_writes: false,
            max_slots: DEFAULT_MAX_SLOTS,
            max_index_bytes: 4 * 1024 * 1024 * 1024, // 4 GiB
        }
    }
}

/// Secondary index and locking configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Maximum movie ids kept per genre; further insertions are dropped.
    pub genre_list_cap: usize,
    /// Number of striped mutexes serializing per-user edge file access.
    pub user_lock_stripes: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            genre_list_cap: DEFAULT_GENRE_LIST_CAP,
            user_lock_stripes: 64,
        }
    }
}

/// Main `ReelDB` configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReelConfig {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Index configuration.
    pub index: IndexConfig,
}

impl ReelConfig {
    /// Loads configuration from default sources.
    ///
    /// Priority: defaults < file < environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("reeldb.toml")
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("REELDB_").split("__"));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Creates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(8..=MAX_SLOTS_LIMIT).contains(&self.storage.max_slots) {
            return Err(ConfigError::InvalidValue {
                key: "storage.max_slots".to_string(),
                message: format!(
                    "value {} is out of range [8, {MAX_SLOTS_LIMIT}]",
                    self.storage.max_slots
                ),
            });
        }

        let min_index = 64 + NODE_SIZE_U32 as u64;
        if self.storage.max_index_bytes < min_index {
            return Err(ConfigError::InvalidValue {
                key: "storage.max_index_bytes".to_string(),
                message: format!(
                    "value {} must be >= {min_index}",
                    self.storage.max_index_bytes
                ),
            });
        }

        if self.index.genre_list_cap == 0 {
            return Err(ConfigError::InvalidValue {
                key: "index.genre_list_cap".to_string(),
                message: "value must be > 0".to_string(),
            });
        }

        if !self.index.user_lock_stripes.is_power_of_two() {
            return Err(ConfigError::InvalidValue {
                key: "index.user_lock_stripes".to_string(),
                message: format!(
                    "value {} must be a power of two",
                    self.index.user_lock_stripes
                ),
            });
        }

        Ok(())
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
