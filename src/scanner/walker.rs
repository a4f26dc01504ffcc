//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct, the metadata scanner of the
//! change-detection pipeline. It produces every regular file below a root
//! together with its modification time.
//!
//! # Features
//!
//! - Parallel directory traversal on a shared rayon pool
//! - Per-file metadata fetched concurrently on the same pool
//! - Hidden files and directories always skipped
//! - Glob exclusion of directories (subtrees are never entered)
//! - Optional depth limit
//! - Graceful shutdown via atomic flag
//!
//! Per-file failures (permission errors, files vanishing mid-scan) are
//! logged and the file is left out of the result. Only problems with the
//! root itself are returned as errors.
//!
//! # Example
//!
//! ```no_run
//! use gen_readme::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/notes"), WalkerConfig::default()).unwrap();
//! let files = walker.scan().unwrap();
//! println!("Found {} files", files.len());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jwalk::{Parallelism, WalkDir};
use rayon::prelude::*;
use rayon::ThreadPool;

use super::path_utils::epoch_seconds;
use super::{ExcludeRules, FileMeta, ScanError, WalkerConfig};
use crate::progress::{ProgressCallback, PHASE_WALKING};

/// Directory walker for parallel file discovery.
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Compiled exclusion rules
    rules: Arc<ExcludeRules>,
    /// Worker pool shared with the rest of the pipeline
    pool: Option<Arc<ThreadPool>>,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("pool", &self.pool.as_ref().map(|p| p.current_num_threads()))
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Walker {
    /// Create a new walker for the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidPattern`] if an exclusion pattern is
    /// malformed. Nothing is scanned in that case.
    pub fn new(path: &Path, config: WalkerConfig) -> Result<Self, ScanError> {
        let rules = ExcludeRules::new(config.exclude_patterns.as_slice())?;
        Ok(Self {
            root: path.to_path_buf(),
            config,
            rules: Arc::new(rules),
            pool: None,
            shutdown_flag: None,
            progress_callback: None,
        })
    }

    /// Use an existing worker pool instead of building one per scan.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// The root this walker scans.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The compiled exclusion rules, shared with index file generation.
    #[must_use]
    pub fn rules(&self) -> Arc<ExcludeRules> {
        Arc::clone(&self.rules)
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Verify the root exists and is a directory.
    fn check_root(&self) -> Result<(), ScanError> {
        match std::fs::metadata(&self.root) {
            Ok(m) if m.is_dir() => Ok(()),
            Ok(_) => Err(ScanError::NotADirectory(self.root.clone())),
            Err(e) => Err(match e.kind() {
                std::io::ErrorKind::NotFound => ScanError::NotFound(self.root.clone()),
                std::io::ErrorKind::PermissionDenied => {
                    ScanError::PermissionDenied(self.root.clone())
                }
                _ => ScanError::Io {
                    path: self.root.clone(),
                    source: e,
                },
            }),
        }
    }

    fn pool(&self) -> Result<Arc<ThreadPool>, ScanError> {
        match self.pool {
            Some(ref pool) => Ok(Arc::clone(pool)),
            None => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(self.config.workers.max(1))
                    .build()?;
                Ok(Arc::new(pool))
            }
        }
    }

    /// Scan the tree and return every regular file with its mtime.
    ///
    /// The whole pass completes before this returns; result order follows
    /// sorted traversal order but callers must not rely on it.
    ///
    /// # Errors
    ///
    /// Returns an error only if the root is missing, is not a directory,
    /// or the worker pool cannot be built.
    pub fn scan(&self) -> Result<Vec<FileMeta>, ScanError> {
        self.check_root()?;
        let pool = self.pool()?;

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(PHASE_WALKING, 0);
        }

        let paths = self.discover(&pool);
        log::debug!(
            "Walker: discovered {} files under {}",
            paths.len(),
            self.root.display()
        );

        let files: Vec<FileMeta> = pool.install(|| {
            paths
                .into_par_iter()
                .filter_map(|path| {
                    if self.is_shutdown_requested() {
                        return None;
                    }
                    read_file_meta(path)
                })
                .collect()
        });

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(PHASE_WALKING);
        }

        Ok(files)
    }

    /// Walk the directory tree and collect candidate file paths.
    fn discover(&self, pool: &Arc<ThreadPool>) -> Vec<PathBuf> {
        let rules = Arc::clone(&self.rules);

        let mut walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(true)
            .sort(true)
            .parallelism(Parallelism::RayonExistingPool {
                pool: Arc::clone(pool),
                busy_timeout: None,
            })
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                // Dropping an excluded directory here keeps jwalk from descending into it
                children.retain(|child| match child {
                    Ok(entry) => {
                        if entry.file_type().is_dir() && rules.is_excluded(&entry.path()) {
                            log::trace!("Excluding directory: {}", entry.path().display());
                            false
                        } else {
                            true
                        }
                    }
                    Err(_) => true,
                });
            });

        if let Some(depth) = self.config.max_depth {
            // jwalk counts the root as depth 0, so files in the root are depth 1
            walk_dir = walk_dir.max_depth(depth.saturating_add(1));
        }

        let mut paths = Vec::new();
        for entry_result in walk_dir {
            if self.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping iteration");
                break;
            }

            match entry_result {
                Ok(entry) => {
                    if entry.depth == 0 || !entry.file_type().is_file() {
                        continue;
                    }
                    let path = entry.path();
                    if let Some(ref callback) = self.progress_callback {
                        callback.on_progress(paths.len() + 1, path.to_string_lossy().as_ref());
                    }
                    paths.push(path);
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                }
            }
        }

        paths
    }
}

/// Fetch the modification time for one file, or `None` if it cannot be read.
fn read_file_meta(path: PathBuf) -> Option<FileMeta> {
    let metadata = match std::fs::symlink_metadata(&path) {
        Ok(m) => m,
        Err(e) => {
            match e.kind() {
                std::io::ErrorKind::NotFound => {
                    log::debug!("File not found (may have been deleted): {}", path.display());
                }
                _ => log::warn!("Cannot read metadata for {}: {}", path.display(), e),
            }
            return None;
        }
    };

    if !metadata.is_file() {
        return None;
    }

    match metadata.modified() {
        Ok(modified) => Some(FileMeta::new(path, epoch_seconds(modified))),
        Err(e) => {
            log::warn!("No modification time for {}: {}", path.display(), e);
            None
        }
    }
}
