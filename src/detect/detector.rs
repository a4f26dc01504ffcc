//! Change detector: reconciles one scan pass against the stored digests.
//!
//! # Overview
//!
//! 1. **Scan**: the supplied scan function lists `(path, mtime)` pairs
//! 2. **Hash**: every file is hashed on the worker pool
//! 3. **Classify**: new / modified / unchanged against the prior snapshot
//! 4. **Write back**: every hashed file is saved through the store's batch,
//!    from the coordinating thread, in discovery order
//!
//! Files that cannot be hashed, and files whose path is not valid UTF-8, are
//! recorded as skipped and appear in neither output. With persistence turned
//! off ([`DetectorConfig::with_persist`]) nothing is written to the store.
//! Paths in the prior snapshot that are no longer on disk are left
//! alone.
//!
//! # Example
//!
//! ```no_run
//! use gen_readme::detect::{ChangeDetector, DetectorConfig};
//! use gen_readme::scanner::{Walker, WalkerConfig};
//! use gen_readme::store::HashStore;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let store = Arc::new(HashStore::open(Path::new("file_hashes.db")).unwrap());
//! let prior = store.load_all().unwrap();
//! let detector = ChangeDetector::new(Arc::clone(&store), DetectorConfig::default());
//!
//! let walker = Walker::new(Path::new("notes"), WalkerConfig::default()).unwrap();
//! let detection = detector
//!     .detect_changes(Path::new("notes"), &prior, |_| walker.scan())
//!     .unwrap();
//! store.flush();
//!
//! println!("{} changed files", detection.changed.len());
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;
use serde::Serialize;

use crate::progress::{ProgressCallback, PHASE_HASHING};
use crate::scanner::path_utils::path_key;
use crate::scanner::{ContentHash, FileMeta, HashError, Hasher, ScanError, DEFAULT_WORKERS};
use crate::store::{FileRecord, HashStore};

/// Configuration for the change detector.
#[derive(Clone)]
pub struct DetectorConfig {
    /// Number of hashing threads when no shared pool is supplied.
    pub workers: usize,
    /// Shared worker pool.
    pub pool: Option<Arc<ThreadPool>>,
    /// Hasher used for file contents.
    pub hasher: Hasher,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
    /// Write digests and skip reasons back to the store.
    pub persist: bool,
}

impl std::fmt::Debug for DetectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorConfig")
            .field("workers", &self.workers)
            .field("pool", &self.pool.as_ref().map(|p| p.current_num_threads()))
            .field("hasher", &self.hasher)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .field("persist", &self.persist)
            .finish()
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            pool: None,
            hasher: Hasher::new(),
            shutdown_flag: None,
            progress_callback: None,
            persist: true,
        }
    }
}

impl DetectorConfig {
    /// Set the hashing thread count (clamped to at least 1).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Hash on an existing pool.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Use a specific hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = hasher;
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

    /// Turn store writes on or off. Dry runs classify without persisting.
    #[must_use]
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Counters from one detection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionStats {
    /// Files returned by the scan
    pub scanned: usize,
    /// Files successfully hashed
    pub hashed: usize,
    /// Files that could not be hashed
    pub skipped: usize,
    /// Files with no stored digest
    pub new_files: usize,
    /// Files whose digest differs from the stored one
    pub modified_files: usize,
    /// Files whose digest matches the stored one
    pub unchanged: usize,
    /// Total bytes read while hashing
    pub bytes_hashed: u64,
    /// Whether hashing stopped early because of a shutdown request
    pub interrupted: bool,
}

/// Result of one detection pass.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// New or modified files, in discovery order
    pub changed: Vec<PathBuf>,
    /// Normalized path → digest for every successfully hashed file
    pub current: HashMap<String, ContentHash>,
    /// Counters
    pub stats: DetectionStats,
}

impl Detection {
    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Split into the changed-path list and the current digest map.
    #[must_use]
    pub fn into_parts(self) -> (Vec<PathBuf>, HashMap<String, ContentHash>) {
        (self.changed, self.current)
    }
}

/// Errors that abort a detection pass.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    /// The scan of the root failed.
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
}

enum HashOutcome {
    Hashed(ContentHash, u64),
    Failed(HashError),
    Cancelled,
}

/// Classifies scanned files as changed or unchanged.
pub struct ChangeDetector {
    store: Arc<HashStore>,
    config: DetectorConfig,
}

impl ChangeDetector {
    /// Create a detector writing back through `store`.
    #[must_use]
    pub fn new(store: Arc<HashStore>, config: DetectorConfig) -> Self {
        Self { store, config }
    }

    /// The store this detector writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<HashStore> {
        &self.store
    }

    /// Run one detection pass.
    ///
    /// `prior` is the snapshot from [`HashStore::load_all`]. When persisting,
    /// every hashed file is saved through the store's batch; the caller must
    /// call [`HashStore::flush`] afterwards, on success and on interruption.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Scan`] if `scan_fn` fails. Per-file problems
    /// never abort the pass.
    pub fn detect_changes<F>(
        &self,
        root: &Path,
        prior: &HashMap<String, ContentHash>,
        scan_fn: F,
    ) -> Result<Detection, DetectError>
    where
        F: FnOnce(&Path) -> Result<Vec<FileMeta>, ScanError>,
    {
        let files = scan_fn(root)?;
        let mut detection = Detection {
            stats: DetectionStats {
                scanned: files.len(),
                ..Default::default()
            },
            ..Default::default()
        };

        if files.is_empty() {
            log::debug!("No files found under {}", root.display());
            return Ok(detection);
        }

        // Store keys must be exact, so lossy names are never hashed
        let (files, unreadable): (Vec<FileMeta>, Vec<FileMeta>) =
            files.into_iter().partition(|f| f.path.to_str().is_some());
        for file in unreadable {
            log::warn!("Skipping {}: path is not valid UTF-8", file.path.display());
            detection.stats.skipped += 1;
            if self.config.persist {
                self.store
                    .log_skipped(&path_key(&file.path), "Path is not valid UTF-8");
            }
        }

        log::info!("Hashing {} files", files.len());
        let outcomes = self.hash_all(files)?;

        for (file, outcome) in outcomes {
            let key = path_key(&file.path);
            match outcome {
                HashOutcome::Hashed(hash, bytes) => {
                    detection.stats.hashed += 1;
                    detection.stats.bytes_hashed += bytes;

                    match prior.get(&key) {
                        None => {
                            log::debug!("New file: {}", file.path.display());
                            detection.stats.new_files += 1;
                            detection.changed.push(file.path);
                        }
                        Some(previous) if *previous != hash => {
                            log::debug!("Modified file: {}", file.path.display());
                            detection.stats.modified_files += 1;
                            detection.changed.push(file.path);
                        }
                        Some(_) => detection.stats.unchanged += 1,
                    }

                    // Saved even when unchanged so the stored mtime stays current
                    if self.config.persist {
                        self.store
                            .save(FileRecord::new(key.clone(), hash, file.modified));
                    }
                    detection.current.insert(key, hash);
                }
                HashOutcome::Failed(e) => {
                    log::warn!("Skipping {}: {}", file.path.display(), e);
                    detection.stats.skipped += 1;
                    if self.config.persist {
                        self.store.log_skipped(&key, &e.to_string());
                    }
                }
                HashOutcome::Cancelled => detection.stats.interrupted = true,
            }
        }

        log::info!(
            "Detected {} changed files ({} new, {} modified, {} unchanged, {} skipped)",
            detection.changed.len(),
            detection.stats.new_files,
            detection.stats.modified_files,
            detection.stats.unchanged,
            detection.stats.skipped
        );

        Ok(detection)
    }

    /// Hash every file on the worker pool, preserving input order.
    fn hash_all(&self, files: Vec<FileMeta>) -> Result<Vec<(FileMeta, HashOutcome)>, ScanError> {
        let pool = match self.config.pool {
            Some(ref pool) => Arc::clone(pool),
            None => Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.config.workers.max(1))
                    .build()?,
            ),
        };

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(PHASE_HASHING, files.len());
        }

        let done = AtomicUsize::new(0);
        let config = &self.config;
        let outcomes = pool.install(|| {
            files
                .into_par_iter()
                .map(|file| {
                    if config.is_shutdown_requested() {
                        return (file, HashOutcome::Cancelled);
                    }

                    let outcome = match config.hasher.hash_file_counted(&file.path) {
                        Ok((hash, bytes)) => HashOutcome::Hashed(hash, bytes),
                        Err(e) => HashOutcome::Failed(e),
                    };

                    if let Some(ref callback) = config.progress_callback {
                        let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                        callback.on_progress(current, file.path.to_string_lossy().as_ref());
                    }
                    (file, outcome)
                })
                .collect()
        });

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(PHASE_HASHING);
        }

        Ok(outcomes)
    }
}
