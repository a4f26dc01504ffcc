//! Watch mode.
//!
//! Re-runs the whole pipeline after filesystem activity settles. Events are
//! only a trigger: change detection still hashes the tree, so a missed or
//! coalesced event never loses a change, it only delays it to the next one.
//!
//! Events for hidden paths and for index files are ignored, otherwise every
//! generated README would schedule another run.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use notify::{Event, RecursiveMode, Watcher};

use crate::pipeline::{Pipeline, PipelineError, RunSummary};
use crate::scanner::path_utils::is_hidden_name;

/// How often the shutdown flag is polled while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Errors from watch mode.
#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    /// The filesystem watcher could not be set up.
    #[error("Cannot watch directory: {0}")]
    Notify(#[from] notify::Error),
}

/// Whether an event on `path` should trigger a rescan.
#[must_use]
pub fn is_relevant(path: &Path, root: &Path, index_file_name: &str) -> bool {
    if path.file_name().is_some_and(|n| n == index_file_name) {
        return false;
    }
    let relative = path.strip_prefix(root).unwrap_or(path);
    !relative.components().any(|c| match c {
        Component::Normal(name) => is_hidden_name(name),
        _ => false,
    })
}

/// Recursive watcher on one root that forwards relevant paths.
pub struct TreeWatcher {
    #[allow(dead_code)]
    watcher: notify::RecommendedWatcher,
    receiver: Receiver<PathBuf>,
}

impl TreeWatcher {
    /// Start watching `root` recursively.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Notify`] if the platform watcher fails.
    pub fn new(root: &Path, index_file_name: &str) -> Result<Self, WatchError> {
        let (tx, rx) = channel();
        let root_owned = root.to_path_buf();
        let index = index_file_name.to_string();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        notify::EventKind::Create(_)
                            | notify::EventKind::Modify(_)
                            | notify::EventKind::Remove(_)
                    ) {
                        return;
                    }
                    for path in event.paths {
                        if is_relevant(&path, &root_owned, &index) {
                            log::trace!("Filesystem event: {}", path.display());
                            if tx.send(path).is_err() {
                                log::warn!("Failed to forward filesystem event");
                            }
                        }
                    }
                }
                Err(e) => log::warn!("Watch error: {}", e),
            }
        })?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        log::info!("Watching {} for changes", root.display());

        Ok(Self {
            watcher,
            receiver: rx,
        })
    }

    /// Block until an event arrives and then stays quiet for `debounce`.
    ///
    /// Returns the paths seen, or `None` once `shutdown` is raised.
    pub fn next_batch(&self, debounce: Duration, shutdown: &AtomicBool) -> Option<Vec<PathBuf>> {
        let mut batch = Vec::new();

        loop {
            if shutdown.load(Ordering::SeqCst) {
                return None;
            }
            match self.receiver.recv_timeout(POLL_INTERVAL) {
                Ok(path) => {
                    batch.push(path);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }

        let mut deadline = Instant::now() + debounce;
        loop {
            if shutdown.load(Ordering::SeqCst) {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match self.receiver.recv_timeout((deadline - now).min(POLL_INTERVAL)) {
                Ok(path) => {
                    batch.push(path);
                    deadline = Instant::now() + debounce;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        batch.sort();
        batch.dedup();
        Some(batch)
    }
}

/// Run `pipeline` once, then again after every settled burst of events,
/// until `shutdown` is raised.
///
/// `on_run` receives every result. An interrupted run ends the loop.
///
/// # Errors
///
/// Returns [`WatchError`] if the watcher cannot be started.
pub fn watch<F>(
    pipeline: &Pipeline,
    debounce: Duration,
    shutdown: &AtomicBool,
    mut on_run: F,
) -> Result<(), WatchError>
where
    F: FnMut(Result<RunSummary, PipelineError>),
{
    let watcher = TreeWatcher::new(pipeline.root(), &pipeline.config().index_file_name)?;

    let result = pipeline.run();
    let interrupted = matches!(result, Err(PipelineError::Interrupted));
    on_run(result);
    if interrupted {
        return Ok(());
    }

    while let Some(paths) = watcher.next_batch(debounce, shutdown) {
        log::info!("{} paths changed, rescanning", paths.len());
        let result = pipeline.run();
        let interrupted = matches!(result, Err(PipelineError::Interrupted));
        on_run(result);
        if interrupted {
            break;
        }
    }

    log::info!("Stopped watching {}", pipeline.root().display());
    Ok(())
}
