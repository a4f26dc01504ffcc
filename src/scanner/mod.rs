//! Scanner module for directory traversal and content hashing.
//!
//! This module provides functionality for:
//! - Parallel directory walking using jwalk on a shared rayon pool
//! - Exclusion of hidden entries and glob-matched directories
//! - Streaming 128-bit content digests (truncated BLAKE3)
//! - Unicode path normalization for stable store keys
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and metadata collection
//! - [`exclude`]: Glob-based directory exclusion rules
//! - [`hasher`]: Streaming content hashing
//! - [`path_utils`]: Path keys, hidden-name checks, mtime conversion
//!
//! # Example
//!
//! ```no_run
//! use gen_readme::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     max_depth: Some(2),
//!     exclude_patterns: vec!["*/drafts".to_string()],
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("."), config).unwrap();
//! for file in walker.scan().unwrap() {
//!     println!("{} @ {}", file.path.display(), file.modified);
//! }
//! ```

pub mod exclude;
pub mod hasher;
pub mod path_utils;
pub mod walker;

use std::path::PathBuf;

// Re-export main types
pub use exclude::ExcludeRules;
pub use hasher::{ContentHash, Hasher, CHUNK_SIZE};
pub use walker::Walker;

/// Default number of worker threads for scanning and hashing.
pub const DEFAULT_WORKERS: usize = 4;

/// A regular file discovered by one scan pass.
///
/// `modified` is the modification time as floating-point seconds since the
/// Unix epoch, the same representation the hash store persists.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMeta {
    /// Absolute path to the file
    pub path: PathBuf,
    /// Last modification time (epoch seconds)
    pub modified: f64,
}

impl FileMeta {
    /// Create a new FileMeta.
    #[must_use]
    pub fn new(path: PathBuf, modified: f64) -> Self {
        Self { path, modified }
    }
}

/// Configuration for directory walking.
///
/// Hidden files and directories are always skipped; only the exclusion
/// patterns, depth limit and worker count are configurable.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Glob patterns matched against directory paths and names.
    pub exclude_patterns: Vec<String>,

    /// Maximum depth below the root. `Some(0)` means files directly in the
    /// root only; `None` means unlimited.
    pub max_depth: Option<usize>,

    /// Number of worker threads when the walker builds its own pool.
    pub workers: usize,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: Vec::new(),
            max_depth: None,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl WalkerConfig {
    /// Create a new configuration.
    ///
    /// # Arguments
    ///
    /// * `exclude_patterns` - Glob patterns for excluded directories
    /// * `max_depth` - Depth limit, negative values mean unlimited
    /// * `workers` - Worker thread count (clamped to at least 1)
    #[must_use]
    pub fn new(exclude_patterns: Vec<String>, max_depth: i64, workers: usize) -> Self {
        Self {
            exclude_patterns,
            max_depth: depth_limit(max_depth),
            workers: workers.max(1),
        }
    }
}

/// Convert the user-facing depth (`-1` = unlimited) into an optional limit.
#[must_use]
pub fn depth_limit(depth: i64) -> Option<usize> {
    usize::try_from(depth).ok()
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An exclusion pattern could not be compiled.
    #[error("Invalid exclusion pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// The underlying glob error
        #[source]
        source: globset::Error,
    },

    /// The worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error raised while reading `path`.
    #[must_use]
    pub fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
