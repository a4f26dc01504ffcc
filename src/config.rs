//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults
//! 2. The TOML file (`<config dir>/gen-readme/config.toml` or `--config`)
//! 3. `GEN_README_`-prefixed environment variables
//! 4. Command-line flags, applied by the caller
//!
//! The exclusion list is the only setting edited from the command line
//! (`gen-readme exclude ...`); those edits are written back to the TOML file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::readme::{RootLayout, DEFAULT_INDEX_FILE};
use crate::scanner::{ExcludeRules, ScanError, DEFAULT_WORKERS};
use crate::store::DEFAULT_BATCH_SIZE;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "GEN_README_";

/// Name of the hash database file.
pub const DATABASE_FILE_NAME: &str = "file_hashes.db";

/// Directories excluded out of the box.
pub const DEFAULT_EXCLUDED_DIRS: [&str; 3] = [".git", ".config", "venv"];

/// What to do with stored records whose file no longer exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalePolicy {
    /// Leave them in the store
    #[default]
    Keep,
    /// Delete records under the scanned root whose file is gone
    Prune,
}

/// Errors from loading, validating or saving configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// The layered configuration could not be extracted.
    #[error("Invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// The platform config directory could not be determined.
    #[error("Failed to determine project directories")]
    NoProjectDirs,

    /// Writing the config file failed.
    #[error("Failed to write config file {path}: {source}")]
    Save {
        /// Config file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Serializing the configuration failed.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `workers` must be positive.
    #[error("workers must be at least 1")]
    InvalidWorkers,

    /// `batch_size` must be positive.
    #[error("batch_size must be at least 1")]
    InvalidBatchSize,

    /// An exclusion pattern does not compile.
    #[error(transparent)]
    InvalidPattern(#[from] ScanError),

    /// The pattern is already in the exclusion list.
    #[error("Pattern already excluded: {0}")]
    DuplicatePattern(String),

    /// The pattern is not in the exclusion list.
    #[error("Pattern not found: {pattern}{}", did_you_mean(.suggestion))]
    UnknownPattern {
        /// The pattern that was asked for
        pattern: String,
        /// Closest existing pattern, if any is close enough
        suggestion: Option<String>,
    },
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean '{s}'?)"))
        .unwrap_or_default()
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Glob patterns for directories that are never scanned or listed.
    pub excluded_dirs: Vec<String>,
    /// Worker threads for walking and hashing.
    pub workers: usize,
    /// Hash records buffered before a write transaction.
    pub batch_size: usize,
    /// Maximum scan depth below the root; `-1` means unlimited.
    pub max_depth: i64,
    /// Hash database path. Defaults to the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    /// Root used when `scan` is given no path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_folder: Option<PathBuf>,
    /// Name of generated index files.
    pub index_file_name: String,
    /// Handling of records for deleted files.
    pub stale_policy: StalePolicy,
    /// Layout of the root index file.
    pub root_layout: RootLayout,
    /// Custom index file template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| (*s).to_string()).collect(),
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            max_depth: -1,
            database: None,
            default_folder: None,
            index_file_name: DEFAULT_INDEX_FILE.to_string(),
            stale_policy: StalePolicy::Keep,
            root_layout: RootLayout::Listing,
            template: None,
        }
    }
}

impl Config {
    /// Load the layered configuration.
    ///
    /// With `path` set the file must exist; otherwise the default config file
    /// is used when present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a missing explicit file, malformed TOML,
    /// bad environment values or settings that fail validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) if !p.exists() => return Err(ConfigError::NotFound(p.to_path_buf())),
            Some(p) => Some(p.to_path_buf()),
            None => Self::config_path().ok(),
        };

        let config: Self = Self::figment(file.as_deref())
            .extract()
            .map_err(Box::new)?;
        config.validate()?;

        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Load defaults plus one TOML file, without environment overrides.
    ///
    /// Used when editing the file, so environment values are never written
    /// back. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file is not valid TOML.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// The figment used by [`Config::load`].
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Check settings that deserialization alone cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for zero workers, zero batch size or a
    /// malformed exclusion pattern.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkers);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        ExcludeRules::new(self.excluded_dirs.as_slice())?;
        Ok(())
    }

    /// Save the configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Save`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Save {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(io_err)?;
        log::debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Default platform-specific configuration file path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoProjectDirs`] if no home directory is known.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let dirs = project_dirs().ok_or(ConfigError::NoProjectDirs)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Hash database path, falling back to the platform data directory and
    /// finally the working directory.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        if let Some(ref db) = self.database {
            return db.clone();
        }
        project_dirs().map_or_else(
            || PathBuf::from(DATABASE_FILE_NAME),
            |dirs| dirs.data_dir().join(DATABASE_FILE_NAME),
        )
    }

    /// Scan root for a run: the explicit path, else `default_folder`, else
    /// the working directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the working directory is unavailable.
    pub fn scan_root(&self, explicit: Option<&Path>) -> io::Result<PathBuf> {
        match explicit.or(self.default_folder.as_deref()) {
            Some(path) => Ok(path.to_path_buf()),
            None => std::env::current_dir(),
        }
    }

    /// The exclusion list.
    #[must_use]
    pub fn exclusions(&self) -> &[String] {
        &self.excluded_dirs
    }

    /// Add an exclusion pattern.
    ///
    /// # Errors
    ///
    /// Fails if the pattern is malformed or already present.
    pub fn add_exclusion(&mut self, pattern: &str) -> Result<(), ConfigError> {
        let pattern = pattern.trim();
        ExcludeRules::new(&[pattern])?;
        if self.excluded_dirs.iter().any(|p| p == pattern) {
            return Err(ConfigError::DuplicatePattern(pattern.to_string()));
        }
        self.excluded_dirs.push(pattern.to_string());
        Ok(())
    }

    /// Remove an exclusion pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPattern`], with the closest existing
    /// pattern as a suggestion, if `pattern` is not in the list.
    pub fn remove_exclusion(&mut self, pattern: &str) -> Result<(), ConfigError> {
        let index = self.position(pattern.trim())?;
        self.excluded_dirs.remove(index);
        Ok(())
    }

    /// Replace `old` with `new` in place.
    ///
    /// # Errors
    ///
    /// Fails if `old` is unknown, `new` is malformed, or `new` is already
    /// present.
    pub fn modify_exclusion(&mut self, old: &str, new: &str) -> Result<(), ConfigError> {
        let index = self.position(old.trim())?;
        let new = new.trim();
        ExcludeRules::new(&[new])?;
        if self
            .excluded_dirs
            .iter()
            .enumerate()
            .any(|(i, p)| i != index && p == new)
        {
            return Err(ConfigError::DuplicatePattern(new.to_string()));
        }
        self.excluded_dirs[index] = new.to_string();
        Ok(())
    }

    fn position(&self, pattern: &str) -> Result<usize, ConfigError> {
        self.excluded_dirs
            .iter()
            .position(|p| p == pattern)
            .ok_or_else(|| ConfigError::UnknownPattern {
                pattern: pattern.to_string(),
                suggestion: closest_match(pattern, &self.excluded_dirs),
            })
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "gen-readme")
}

/// The candidate closest to `input`, if it is close enough to be a typo.
#[must_use]
pub fn closest_match(input: &str, candidates: &[String]) -> Option<String> {
    candidates
        .iter()
        .map(|c| (strsim::levenshtein(input, c), c))
        .filter(|(distance, c)| *distance <= (c.chars().count() / 3).max(2))
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, c)| c.clone())
}
