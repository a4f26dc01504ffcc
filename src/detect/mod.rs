//! Change detection for gen-readme.
//!
//! This module decides which files changed since the previous run:
//! - A file is **new** if the store has no digest for its path
//! - A file is **modified** if its freshly computed digest differs
//! - Everything else is **unchanged**, whatever its mtime says
//!
//! See [`ChangeDetector::detect_changes`] for the full algorithm.

pub mod detector;

pub use detector::{ChangeDetector, DetectError, Detection, DetectionStats, DetectorConfig};
