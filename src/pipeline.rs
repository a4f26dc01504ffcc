//! One scan → detect → generate run.
//!
//! [`Pipeline`] owns everything with a lifetime longer than a single phase:
//! the hash store, the worker pool shared by walking and hashing, and the
//! loaded template. Creating it validates the configuration, so problems
//! like a missing root or a malformed pattern surface before any work is
//! done. [`Pipeline::run`] may be called repeatedly, which is what `watch`
//! does.
//!
//! # Example
//!
//! ```no_run
//! use gen_readme::config::Config;
//! use gen_readme::pipeline::Pipeline;
//! use std::path::Path;
//!
//! let pipeline = Pipeline::new(Path::new("notes"), Config::default()).unwrap();
//! let summary = pipeline.run().unwrap();
//! println!("{} files changed", summary.changed.len());
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::ThreadPool;
use serde::Serialize;

use crate::config::{Config, ConfigError, StalePolicy};
use crate::detect::{ChangeDetector, DetectError, DetectionStats, DetectorConfig};
use crate::metrics::ScanMetrics;
use crate::progress::ProgressCallback;
use crate::readme::{GeneratedReadme, ReadmeError, ReadmeGenerator, Template};
use crate::scanner::path_utils::{epoch_seconds, is_within, path_key};
use crate::scanner::{ContentHash, ScanError, Walker, WalkerConfig};
use crate::store::{EventKind, FileRecord, HashStore, StoreError};

/// Errors that abort a run.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The root could not be scanned, or a pattern is malformed.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The hash database could not be opened.
    #[error("Cannot open hash database: {0}")]
    Store(#[from] StoreError),

    /// The template could not be loaded.
    #[error(transparent)]
    Template(#[from] ReadmeError),

    /// The run was interrupted; pending hashes were flushed.
    #[error("Scan interrupted by user")]
    Interrupted,
}

impl From<DetectError> for PipelineError {
    fn from(e: DetectError) -> Self {
        match e {
            DetectError::Scan(e) => Self::Scan(e),
        }
    }
}

impl PipelineError {
    /// Whether the error is a problem with user input rather than the
    /// environment.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::Config(_) | Self::Template(_) => true,
            Self::Scan(e) => !matches!(e, ScanError::Pool(_) | ScanError::Io { .. }),
            Self::Store(_) | Self::Interrupted => false,
        }
    }
}

/// Outcome of one completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Scanned root
    pub root: PathBuf,
    /// Whether index files were left untouched
    pub dry_run: bool,
    /// New or modified files, in discovery order
    pub changed: Vec<PathBuf>,
    /// Previously stored files that are gone from disk
    pub removed: Vec<PathBuf>,
    /// Index files considered, with their outcome
    pub readmes: Vec<GeneratedReadme>,
    /// Stale records removed by the prune policy
    pub pruned: usize,
    /// Detection counters
    pub detection: DetectionStats,
    /// Run metrics
    pub metrics: ScanMetrics,
}

impl RunSummary {
    /// Whether any file was skipped.
    #[must_use]
    pub fn has_skipped(&self) -> bool {
        self.metrics.files_skipped > 0
    }
}

/// Runs the change-detection pipeline for one root.
pub struct Pipeline {
    root: PathBuf,
    config: Config,
    store: Arc<HashStore>,
    pool: Arc<ThreadPool>,
    template: Template,
    dry_run: bool,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("workers", &self.pool.current_num_threads())
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Validate `config`, open the store and build the worker pool.
    ///
    /// # Errors
    ///
    /// Fails for invalid settings, a missing or non-directory root, an
    /// unreadable template or an unopenable database.
    pub fn new(root: &Path, config: Config) -> Result<Self, PipelineError> {
        config.validate()?;
        let root = canonical_root(root)?;
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root).into());
        }

        let template = match config.template {
            Some(ref path) => Template::from_file(path)?,
            None => Template::Builtin,
        };

        let store = HashStore::open(&config.database_path())?.with_batch_size(config.batch_size);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("gen-readme-worker-{i}"))
            .build()
            .map_err(ScanError::from)?;

        log::debug!(
            "Pipeline for {} with {} workers, database {}",
            root.display(),
            config.workers,
            config.database_path().display()
        );

        Ok(Self {
            root,
            config,
            store: Arc::new(store),
            pool: Arc::new(pool),
            template,
            dry_run: false,
            shutdown_flag: None,
            progress_callback: None,
        })
    }

    /// Report index file outcomes without writing them.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
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

    /// The canonical scan root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The hash store.
    #[must_use]
    pub fn store(&self) -> &Arc<HashStore> {
        &self.store
    }

    /// The effective configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn walker(&self) -> Result<Walker, ScanError> {
        let config = WalkerConfig::new(
            self.config.excluded_dirs.clone(),
            self.config.max_depth,
            self.config.workers,
        );
        let mut walker = Walker::new(&self.root, config)?.with_pool(Arc::clone(&self.pool));
        if let Some(ref flag) = self.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(ref callback) = self.progress_callback {
            walker = walker.with_progress_callback(Arc::clone(callback));
        }
        Ok(walker)
    }

    fn detector(&self) -> ChangeDetector {
        let mut config = DetectorConfig::default()
            .with_workers(self.config.workers)
            .with_pool(Arc::clone(&self.pool))
            .with_persist(!self.dry_run);
        if let Some(ref flag) = self.shutdown_flag {
            config = config.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(ref callback) = self.progress_callback {
            config = config.with_progress_callback(Arc::clone(callback));
        }
        ChangeDetector::new(Arc::clone(&self.store), config)
    }

    /// Run one pass.
    ///
    /// Pending hash records are flushed before this returns, whether the run
    /// completed, failed or was interrupted.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Scan`] if the root cannot be scanned and
    /// [`PipelineError::Interrupted`] if the shutdown flag was raised.
    /// Per-file problems never fail the run.
    pub fn run(&self) -> Result<RunSummary, PipelineError> {
        let mut metrics = ScanMetrics::new();
        metrics.start_timer();
        self.store.log_event(
            EventKind::Info,
            &format!("Scan started: {}", self.root.display()),
        );

        let mut prior = match self.store.load_all() {
            Ok(prior) => prior,
            Err(e) => {
                log::error!("Failed to load hashes from database: {}", e);
                self.store.log_event(
                    EventKind::Error,
                    &format!("Failed to load hashes from database: {e}"),
                );
                HashMap::new()
            }
        };
        // Deletions already reported under the keep policy are not reported
        // again, and a recreated file counts as new
        match self.store.stale_paths() {
            Ok(stale) => prior.retain(|key, _| !stale.contains(key)),
            Err(e) => log::warn!("Failed to load stale records: {}", e),
        }
        log::debug!("Loaded {} stored hashes", prior.len());

        let walker = self.walker()?;
        let generator = ReadmeGenerator::new(walker.rules())
            .with_index_file_name(self.config.index_file_name.clone())
            .with_template(self.template.clone())
            .with_root_layout(&self.root, self.config.root_layout)
            .with_dry_run(self.dry_run);

        let detection = match self
            .detector()
            .detect_changes(&self.root, &prior, |_| walker.scan())
        {
            Ok(detection) => detection,
            Err(e) => {
                self.store.flush();
                return Err(e.into());
            }
        };

        if detection.stats.interrupted || self.is_shutdown_requested() {
            return Err(self.interrupted());
        }

        metrics.record_detection(&detection.stats);
        let removed = self.removed_files(&prior, &detection.current);

        // Deleted files change their directory's listing too
        let mut touched = detection.changed.clone();
        touched.extend(removed.iter().cloned());

        let mut readmes = Vec::new();
        for dir in generator.affected_directories(&self.root, &touched) {
            if self.is_shutdown_requested() {
                return Err(self.interrupted());
            }
            if !dir.is_dir() {
                continue;
            }
            match generator.generate(&dir) {
                Ok(generated) => {
                    metrics.record_readme(generated.outcome);
                    if let Some(hash) = generated.content_hash {
                        self.remember_index_file(&generated.path, hash);
                        self.store.log_event(
                            EventKind::Info,
                            &format!("README {:?} for {}", generated.outcome, dir.display()),
                        );
                    }
                    readmes.push(generated);
                }
                Err(e) => {
                    log::warn!("Cannot generate index file in {}: {}", dir.display(), e);
                    metrics.files_skipped += 1;
                    self.store.log_event(
                        EventKind::Error,
                        &format!("README generation failed for {}: {e}", dir.display()),
                    );
                    if !self.dry_run {
                        self.store.log_skipped(
                            &path_key(&dir.join(generator.index_file_name())),
                            &e.to_string(),
                        );
                    }
                }
            }
        }

        self.store.flush();

        let pruned = match self.config.stale_policy {
            _ if self.dry_run => 0,
            StalePolicy::Keep => {
                self.mark_stale(&removed);
                0
            }
            StalePolicy::Prune => self.prune_stale(&removed),
        };

        metrics.stop_timer();
        self.store.log_event(EventKind::Info, &metrics.event_message());

        Ok(RunSummary {
            root: self.root.clone(),
            dry_run: self.dry_run,
            changed: detection.changed,
            removed,
            readmes,
            pruned,
            detection: detection.stats,
            metrics,
        })
    }

    fn interrupted(&self) -> PipelineError {
        let flushed = self.store.flush();
        log::info!("Interrupted; flushed {} pending hashes", flushed);
        self.store
            .log_event(EventKind::Warning, "Scan interrupted by user");
        PipelineError::Interrupted
    }

    /// Store the digest of a freshly written index file, so the next run
    /// does not report it as changed.
    fn remember_index_file(&self, path: &Path, hash: ContentHash) {
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map(epoch_seconds)
            .unwrap_or_default();
        self.store
            .save(FileRecord::new(path_key(path), hash, modified));
    }

    /// Stored paths under the root that were not hashed this run and no
    /// longer exist, sorted.
    fn removed_files(
        &self,
        prior: &HashMap<String, ContentHash>,
        current: &HashMap<String, ContentHash>,
    ) -> Vec<PathBuf> {
        let mut removed: Vec<PathBuf> = prior
            .keys()
            .filter(|key| !current.contains_key(*key))
            .map(PathBuf::from)
            .filter(|path| is_within(path, &self.root) && !path.exists())
            .collect();
        removed.sort();
        removed
    }

    /// Keep the records of deleted files but stop reporting them.
    fn mark_stale(&self, removed: &[PathBuf]) {
        if removed.is_empty() {
            return;
        }

        let keys: Vec<String> = removed.iter().map(|p| path_key(p)).collect();
        match self.store.mark_stale(keys.as_slice()) {
            Ok(marked) => log::debug!("Marked {} records as stale", marked),
            Err(e) => {
                log::error!("Failed to mark stale records: {}", e);
                self.store.log_event(
                    EventKind::Error,
                    &format!("Failed to mark stale records: {e}"),
                );
            }
        }
    }

    /// Remove the records of deleted files.
    fn prune_stale(&self, removed: &[PathBuf]) -> usize {
        if removed.is_empty() {
            return 0;
        }

        let keys: Vec<String> = removed.iter().map(|p| path_key(p)).collect();
        match self.store.remove(keys.as_slice()) {
            Ok(removed) => {
                log::info!("Pruned {} stale records", removed);
                self.store.log_event(
                    EventKind::Info,
                    &format!("Pruned {removed} stale records."),
                );
                removed
            }
            Err(e) => {
                log::error!("Failed to prune stale records: {}", e);
                self.store.log_event(
                    EventKind::Error,
                    &format!("Failed to prune stale records: {e}"),
                );
                0
            }
        }
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf, ScanError> {
    fs::canonicalize(root).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ScanError::NotFound(root.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => ScanError::PermissionDenied(root.to_path_buf()),
        _ => ScanError::Io {
            path: root.to_path_buf(),
            source: e,
        },
    })
}
