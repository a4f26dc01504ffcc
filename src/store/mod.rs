//! Persistent hash store for gen-readme.
//!
//! This module remembers the content digest of every file seen by earlier
//! runs so the change detector can tell which files changed.
//!
//! # Architecture
//!
//! The store is split into three components:
//!
//! * [`database`]: SQLite persistence, schema management and queries.
//! * [`batch`]: The per-store write buffer used for bulk inserts.
//! * [`entry`]: The record types stored in the database.
//!
//! # Change Signal
//!
//! Only the content digest decides whether a file changed. The mtime is
//! stored next to it for diagnostics and is refreshed on every run, but a
//! touched file with identical bytes is never reported as changed.
//!
//! # Stale Records
//!
//! Records for deleted files are kept by default. See
//! [`crate::config::StalePolicy`] for the opt-in pruning mode.

pub mod batch;
pub mod database;
pub mod entry;

pub use batch::{WriteBatch, DEFAULT_BATCH_SIZE};
pub use database::{HashStore, StoreError, StoreResult};
pub use entry::{EventKind, EventRecord, FileRecord, SkippedFile};
