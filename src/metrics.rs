//! Run metrics.
//!
//! [`ScanMetrics`] counts what one pipeline run did and renders the end of
//! run summary. The same numbers are written to the store's event log so
//! past runs can be inspected with `gen-readme report`.

use std::time::{Duration, Instant};

use bytesize::ByteSize;
use serde::Serialize;
use yansi::Paint;

use crate::detect::DetectionStats;
use crate::readme::ReadmeOutcome;

/// Counters and timing for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanMetrics {
    /// Files hashed successfully
    pub files_scanned: usize,
    /// Files that could not be hashed or stored
    pub files_skipped: usize,
    /// New or modified files
    pub files_changed: usize,
    /// Index files written for the first time
    pub readme_created: usize,
    /// Index files rewritten
    pub readme_updated: usize,
    /// Index files whose listing had not changed
    pub readme_unchanged: usize,
    /// Bytes read while hashing
    pub bytes_hashed: u64,
    /// Wall-clock duration in seconds
    pub duration_secs: f64,
    #[serde(skip)]
    started: Option<Instant>,
}

impl ScanMetrics {
    /// Create zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the run timer.
    pub fn start_timer(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Stop the run timer. Does nothing if the timer was never started.
    pub fn stop_timer(&mut self) {
        if let Some(started) = self.started.take() {
            self.duration_secs = started.elapsed().as_secs_f64();
        }
    }

    /// Elapsed run time.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs.max(0.0))
    }

    /// Average files per second, or 0 for an instantaneous run.
    #[must_use]
    pub fn scan_rate(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.files_scanned as f64 / self.duration_secs
        } else {
            0.0
        }
    }

    /// Fold in the counters from a detection pass.
    pub fn record_detection(&mut self, stats: &DetectionStats) {
        self.files_scanned += stats.hashed;
        self.files_skipped += stats.skipped;
        self.files_changed += stats.new_files + stats.modified_files;
        self.bytes_hashed += stats.bytes_hashed;
    }

    /// Count one index file outcome.
    pub fn record_readme(&mut self, outcome: ReadmeOutcome) {
        match outcome {
            ReadmeOutcome::Created => self.readme_created += 1,
            ReadmeOutcome::Updated => self.readme_updated += 1,
            ReadmeOutcome::Unchanged => self.readme_unchanged += 1,
        }
    }

    /// One-line summary stored in the event log.
    #[must_use]
    pub fn event_message(&self) -> String {
        format!(
            "Scan completed. Total files: {}, Skipped: {}, Created: {}, Updated: {}, Time: {:.2} sec, Rate: {:.2} files/sec",
            self.files_scanned,
            self.files_skipped,
            self.readme_created,
            self.readme_updated,
            self.duration_secs,
            self.scan_rate()
        )
    }

    /// Multi-line human-readable summary.
    #[must_use]
    pub fn render(&self) -> String {
        let skipped = if self.files_skipped > 0 {
            self.files_skipped.yellow().bold().to_string()
        } else {
            self.files_skipped.to_string()
        };

        let mut out = String::new();
        out.push_str(&format!("\n{}\n", "Scan Statistics:".bold()));
        out.push_str(&format!("Total files scanned: {}\n", self.files_scanned));
        out.push_str(&format!("Changed files: {}\n", self.files_changed));
        out.push_str(&format!("Skipped files: {}\n", skipped));
        out.push_str(&format!("README files created: {}\n", self.readme_created));
        out.push_str(&format!("README files updated: {}\n", self.readme_updated));
        out.push_str(&format!("Bytes hashed: {}\n", ByteSize::b(self.bytes_hashed)));
        out.push_str(&format!(
            "Total time taken: {:.2} seconds\n",
            self.duration_secs
        ));
        out.push_str(&format!(
            "Average scan rate: {:.2} files/second\n",
            self.scan_rate()
        ));
        out
    }
}
