//! Record types persisted by the hash store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::scanner::ContentHash;

/// The last known content digest and mtime of one file.
///
/// Records are replaced wholesale; there is no partial update.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    /// Normalized absolute path (primary key)
    pub path: String,
    /// Content digest
    pub hash: ContentHash,
    /// Modification time in epoch seconds, kept for diagnostics
    pub modified: f64,
}

impl FileRecord {
    /// Create a new record.
    #[must_use]
    pub fn new(path: impl Into<String>, hash: ContentHash, modified: f64) -> Self {
        Self {
            path: path.into(),
            hash,
            modified,
        }
    }
}

/// A file the pipeline could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    /// File path
    pub path: String,
    /// Human-readable failure description
    pub reason: String,
}

/// Severity tag for event log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    /// Normal progress
    Info,
    /// Something unexpected that did not stop the run
    Warning,
    /// A failed operation
    Error,
}

impl EventKind {
    /// The tag stored in the `event_type` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            other => Err(format!("unknown event type '{}'", other)),
        }
    }
}

/// One row of the append-only event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    /// Auto-incremented row id
    pub id: i64,
    /// Event type as stored (normally one of the [`EventKind`] tags)
    pub kind: String,
    /// Event message
    pub message: String,
    /// Insert timestamp assigned by SQLite (`YYYY-MM-DD HH:MM:SS`, UTC)
    pub timestamp: String,
}
