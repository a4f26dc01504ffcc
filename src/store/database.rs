//! SQLite-backed hash store.
//!
//! Four tables back the store:
//!
//! ```text
//! file_hashes   (file_path TEXT PRIMARY KEY, hash TEXT, mtime REAL)
//! skipped_files (file_path TEXT PRIMARY KEY, reason TEXT)
//! events        (id INTEGER PRIMARY KEY AUTOINCREMENT, event_type TEXT,
//!                message TEXT, timestamp DATETIME DEFAULT CURRENT_TIMESTAMP)
//! stale_files   (file_path TEXT PRIMARY KEY)
//! ```
//!
//! Hash records go through a per-store [`WriteBatch`] and are written in one
//! transaction per batch. Skipped-file and event rows are written
//! immediately.
//!
//! `stale_files` marks kept records whose file has been reported as deleted.
//! Writing a new record for a path clears its mark.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::batch::{WriteBatch, DEFAULT_BATCH_SIZE};
use super::{EventKind, EventRecord, FileRecord, SkippedFile};
use crate::scanner::ContentHash;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS file_hashes (
        file_path TEXT PRIMARY KEY,
        hash TEXT NOT NULL,
        mtime REAL NOT NULL
    );
    CREATE TABLE IF NOT EXISTS skipped_files (
        file_path TEXT PRIMARY KEY,
        reason TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        event_type TEXT NOT NULL,
        message TEXT NOT NULL,
        timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS stale_files (
        file_path TEXT PRIMARY KEY
    );
";

/// Errors raised by the hash store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// SQLite reported an error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The directory holding the database could not be created.
    #[error("Failed to create store directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A thread panicked while holding the store lock.
    #[error("Hash store lock poisoned")]
    Poisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent store of file content hashes.
///
/// The store is `Sync`; the connection and the write batch sit behind
/// separate mutexes so buffering a record never waits on a running write
/// transaction for longer than the hand-off.
pub struct HashStore {
    conn: Mutex<Connection>,
    batch: Mutex<WriteBatch>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for HashStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashStore")
            .field("path", &self.path)
            .field("pending", &self.pending())
            .finish()
    }
}

impl HashStore {
    /// Open or create a hash store at the specified path.
    ///
    /// Missing parent directories are created. A store that does not exist
    /// yet is a first run and starts empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or the database cannot be created.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        log::debug!("Opened hash store at {}", path.display());
        Self::initialize(conn, Some(path.to_path_buf()))
    }

    /// Open a store that lives only in memory (for tests and dry runs).
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::initialize(Connection::open_in_memory()?, None)
    }

    fn initialize(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            batch: Mutex::new(WriteBatch::new(DEFAULT_BATCH_SIZE)),
            path,
        })
    }

    /// Set the number of records buffered before a bulk write.
    ///
    /// Any records already buffered are kept.
    #[must_use]
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        if let Ok(mut batch) = self.batch.lock() {
            let pending = batch.take();
            *batch = WriteBatch::new(batch_size);
            for record in pending {
                batch.push(record);
            }
        }
        self
    }

    /// Location of the database file, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The configured batch threshold.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch.lock().map_or(DEFAULT_BATCH_SIZE, |b| b.threshold())
    }

    /// Number of records buffered and not yet written.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.batch.lock().map_or(0, |b| b.len())
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Load every stored path and digest in one pass.
    ///
    /// Rows whose digest cannot be decoded are skipped with a warning, so a
    /// damaged row only costs a re-hash of that file.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    pub fn load_all(&self) -> StoreResult<HashMap<String, ContentHash>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT file_path, hash FROM file_hashes")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut hashes = HashMap::new();
        for row in rows {
            let (path, hex) = row?;
            match hex.parse::<ContentHash>() {
                Ok(hash) => {
                    hashes.insert(path, hash);
                }
                Err(e) => log::warn!("Ignoring stored hash for {}: {}", path, e),
            }
        }
        log::debug!("Loaded {} stored hashes", hashes.len());
        Ok(hashes)
    }

    /// Fetch a single record.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, path: &str) -> StoreResult<Option<FileRecord>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT hash, mtime FROM file_hashes WHERE file_path = ?1",
                params![path],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )
            .optional()?;

        Ok(row.and_then(|(hex, modified)| {
            hex.parse::<ContentHash>()
                .ok()
                .map(|hash| FileRecord::new(path, hash, modified))
        }))
    }

    /// Number of stored hash records.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn record_count(&self) -> StoreResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM file_hashes", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Buffer a record for writing.
    ///
    /// When the buffer reaches the batch threshold the whole buffer is
    /// written in one transaction. Returns the number of records written by
    /// this call (0 when the record was only buffered or the write failed).
    /// Storage failures are absorbed, see [`flush`](Self::flush).
    pub fn save(&self, record: FileRecord) -> usize {
        let full = match self.batch.lock() {
            Ok(mut batch) => batch.push(record).then(|| batch.take()),
            Err(_) => {
                log::error!("Hash store batch lock poisoned, dropping {}", record.path);
                self.log_skipped(&record.path, "hash store batch lock poisoned");
                return 0;
            }
        };

        match full {
            Some(records) => self.write_batch(records, "Batch"),
            None => 0,
        }
    }

    /// Write any buffered records.
    ///
    /// Must run once at the end of every run, otherwise up to
    /// `batch_size - 1` records are lost. Returns the number of records
    /// written. On failure the error is logged to the event table, every
    /// path in the batch is recorded as skipped and the batch is dropped.
    pub fn flush(&self) -> usize {
        let records = match self.batch.lock() {
            Ok(mut batch) => batch.take(),
            Err(_) => {
                log::error!("Hash store batch lock poisoned, cannot flush");
                return 0;
            }
        };

        if records.is_empty() {
            return 0;
        }
        self.write_batch(records, "Final batch")
    }

    fn write_batch(&self, records: Vec<FileRecord>, label: &str) -> usize {
        match self.insert_records(&records) {
            Ok(written) => {
                log::debug!("{} of {} hashes saved", label, written);
                self.log_event(
                    EventKind::Info,
                    &format!("{} of {} hashes saved.", label, written),
                );
                written
            }
            Err(e) => {
                let message = format!("Failed to save batch of {} hashes. Error: {}", records.len(), e);
                self.log_event(EventKind::Error, &message);
                for record in &records {
                    self.log_skipped(&record.path, &message);
                }
                0
            }
        }
    }

    fn insert_records(&self, records: &[FileRecord]) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO file_hashes (file_path, hash, mtime) VALUES (?1, ?2, ?3)",
            )?;
            let mut unmark = tx.prepare_cached("DELETE FROM stale_files WHERE file_path = ?1")?;
            for record in records {
                stmt.execute(params![record.path, record.hash.to_hex(), record.modified])?;
                unmark.execute(params![record.path])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Delete hash records for the given paths in one transaction.
    ///
    /// Only used by the `prune` stale policy; the default policy never
    /// deletes records.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; nothing is deleted then.
    pub fn remove<S: AsRef<str>>(&self, paths: &[S]) -> StoreResult<usize> {
        if paths.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM file_hashes WHERE file_path = ?1")?;
            let mut unmark = tx.prepare_cached("DELETE FROM stale_files WHERE file_path = ?1")?;
            for path in paths {
                removed += stmt.execute(params![path.as_ref()])?;
                unmark.execute(params![path.as_ref()])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Mark kept records as belonging to deleted files.
    ///
    /// Marked paths are returned by [`stale_paths`](Self::stale_paths) until
    /// a new record is written for them. Returns the number of newly marked
    /// paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; nothing is marked then.
    pub fn mark_stale<S: AsRef<str>>(&self, paths: &[S]) -> StoreResult<usize> {
        if paths.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut marked = 0;
        {
            let mut stmt =
                tx.prepare_cached("INSERT OR IGNORE INTO stale_files (file_path) VALUES (?1)")?;
            for path in paths {
                marked += stmt.execute(params![path.as_ref()])?;
            }
        }
        tx.commit()?;
        Ok(marked)
    }

    /// Paths marked by [`mark_stale`](Self::mark_stale).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn stale_paths(&self) -> StoreResult<HashSet<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT file_path FROM stale_files")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<HashSet<_>, _>>()?)
    }

    /// Record a file that could not be processed, replacing any earlier reason.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record_skipped(&self, path: &str, reason: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO skipped_files (file_path, reason) VALUES (?1, ?2)",
            params![path, reason],
        )?;
        Ok(())
    }

    /// Append an entry to the event log.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record_event(&self, kind: EventKind, message: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO events (event_type, message) VALUES (?1, ?2)",
            params![kind.as_str(), message],
        )?;
        Ok(())
    }

    /// Best-effort [`record_event`](Self::record_event); failures are only logged.
    pub fn log_event(&self, kind: EventKind, message: &str) {
        if let Err(e) = self.record_event(kind, message) {
            log::warn!("Failed to record event '{}': {}", message, e);
        }
    }

    /// Best-effort [`record_skipped`](Self::record_skipped); failures are only logged.
    pub fn log_skipped(&self, path: &str, reason: &str) {
        if let Err(e) = self.record_skipped(path, reason) {
            log::warn!("Failed to record skipped file {}: {}", path, e);
        }
    }

    /// All skipped files, ordered by path.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn skipped_files(&self) -> StoreResult<Vec<SkippedFile>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT file_path, reason FROM skipped_files ORDER BY file_path")?;
        let rows = stmt.query_map([], |row| {
            Ok(SkippedFile {
                path: row.get(0)?,
                reason: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Remove all skipped-file rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn clear_skipped(&self) -> StoreResult<usize> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM skipped_files", [])?)
    }

    /// The most recent `limit` events, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recent_events(&self, limit: usize) -> StoreResult<Vec<EventRecord>> {
        let conn = self.conn()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(
            "SELECT id, event_type, message, COALESCE(timestamp, '')
             FROM events ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(EventRecord {
                id: row.get(0)?,
                kind: row.get(1)?,
                message: row.get(2)?,
                timestamp: row.get(3)?,
            })
        })?;
        let mut events = rows.collect::<Result<Vec<_>, _>>()?;
        events.reverse();
        Ok(events)
    }
}

impl Drop for HashStore {
    fn drop(&mut self) {
        let pending = self.pending();
        if pending > 0 {
            log::debug!("Flushing {} pending hashes on drop", pending);
            self.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(i: usize) -> FileRecord {
        FileRecord::new(
            format!("/notes/{}.md", i),
            ContentHash::of_bytes(format!("content {}", i).as_bytes()),
            i as f64,
        )
    }

    #[test]
    fn test_empty_store_loads_empty_map() {
        let store = HashStore::open_in_memory().unwrap();
        assert!(store.load_all().unwrap().is_empty());
        assert_eq!(store.record_count().unwrap(), 0);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/state/file_hashes.db");

        let store = HashStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), Some(path.as_path()));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_save_buffers_until_threshold() {
        let store = HashStore::open_in_memory().unwrap().with_batch_size(3);

        assert_eq!(store.save(record(0)), 0);
        assert_eq!(store.save(record(1)), 0);
        assert_eq!(store.record_count().unwrap(), 0);
        assert_eq!(store.pending(), 2);

        assert_eq!(store.save(record(2)), 3);
        assert_eq!(store.record_count().unwrap(), 3);
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn test_flush_writes_remainder() {
        let store = HashStore::open_in_memory().unwrap().with_batch_size(10);
        for i in 0..4 {
            store.save(record(i));
        }

        assert_eq!(store.record_count().unwrap(), 0);
        assert_eq!(store.flush(), 4);
        assert_eq!(store.record_count().unwrap(), 4);
        assert_eq!(store.flush(), 0);
    }

    #[test]
    fn test_save_replaces_existing_record() {
        let store = HashStore::open_in_memory().unwrap().with_batch_size(1);
        store.save(record(0));

        let replacement = FileRecord::new("/notes/0.md", ContentHash::of_bytes(b"new"), 99.0);
        store.save(replacement.clone());

        assert_eq!(store.record_count().unwrap(), 1);
        assert_eq!(store.get("/notes/0.md").unwrap(), Some(replacement));
    }

    #[test]
    fn test_load_all_round_trips_digests() {
        let store = HashStore::open_in_memory().unwrap();
        for i in 0..5 {
            store.save(record(i));
        }
        store.flush();

        let hashes = store.load_all().unwrap();
        assert_eq!(hashes.len(), 5);
        assert_eq!(hashes["/notes/3.md"], record(3).hash);
    }

    #[test]
    fn test_load_all_skips_corrupt_rows() {
        let store = HashStore::open_in_memory().unwrap();
        store.save(record(0));
        store.flush();
        store
            .conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO file_hashes (file_path, hash, mtime) VALUES ('/bad', 'xyz', 0)",
                [],
            )
            .unwrap();

        let hashes = store.load_all().unwrap();
        assert_eq!(hashes.len(), 1);
        assert!(!hashes.contains_key("/bad"));
    }

    #[test]
    fn test_failed_flush_records_skipped_and_event() {
        let store = HashStore::open_in_memory().unwrap().with_batch_size(10);
        store.save(record(0));
        store.save(record(1));
        store
            .conn
            .lock()
            .unwrap()
            .execute_batch("DROP TABLE file_hashes")
            .unwrap();

        assert_eq!(store.flush(), 0);
        assert_eq!(store.pending(), 0);

        let skipped = store.skipped_files().unwrap();
        assert_eq!(skipped.len(), 2);
        assert!(skipped[0].reason.contains("Failed to save batch"));

        let events = store.recent_events(10).unwrap();
        assert!(events.iter().any(|e| e.kind == "ERROR"));
    }

    #[test]
    fn test_stale_mark_cleared_by_new_record() {
        let store = HashStore::open_in_memory().unwrap().with_batch_size(1);
        store.save(record(0));
        store.save(record(1));

        assert_eq!(store.mark_stale(&["/notes/0.md", "/notes/1.md"][..]).unwrap(), 2);
        assert_eq!(store.mark_stale(&["/notes/0.md"][..]).unwrap(), 0);
        assert_eq!(store.stale_paths().unwrap().len(), 2);
        // Marked records are kept
        assert_eq!(store.record_count().unwrap(), 2);

        store.save(record(0));
        let stale = store.stale_paths().unwrap();
        assert_eq!(stale.len(), 1);
        assert!(stale.contains("/notes/1.md"));

        store.remove(&["/notes/1.md"][..]).unwrap();
        assert!(store.stale_paths().unwrap().is_empty());
    }

    #[test]
    fn test_record_skipped_overwrites() {
        let store = HashStore::open_in_memory().unwrap();
        store.record_skipped("/notes/a.md", "first").unwrap();
        store.record_skipped("/notes/a.md", "second").unwrap();

        let skipped = store.skipped_files().unwrap();
        assert_eq!(
            skipped,
            vec![SkippedFile {
                path: "/notes/a.md".to_string(),
                reason: "second".to_string(),
            }]
        );

        assert_eq!(store.clear_skipped().unwrap(), 1);
        assert!(store.skipped_files().unwrap().is_empty());
    }

    #[test]
    fn test_events_are_append_only_and_ordered() {
        let store = HashStore::open_in_memory().unwrap();
        store.record_event(EventKind::Info, "Scan started").unwrap();
        store.record_event(EventKind::Warning, "odd").unwrap();
        store.record_event(EventKind::Info, "Scan completed").unwrap();

        let events = store.recent_events(2).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "odd");
        assert_eq!(events[1].message, "Scan completed");
        assert!(events[0].id < events[1].id);
        assert!(!events[1].timestamp.is_empty());
    }

    #[test]
    fn test_remove_deletes_only_named_paths() {
        let store = HashStore::open_in_memory().unwrap();
        for i in 0..3 {
            store.save(record(i));
        }
        store.flush();

        assert_eq!(store.remove(&["/notes/1.md", "/notes/missing.md"]).unwrap(), 1);
        let hashes = store.load_all().unwrap();
        assert_eq!(hashes.len(), 2);
        assert!(!hashes.contains_key("/notes/1.md"));
    }

    #[test]
    fn test_drop_flushes_pending() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file_hashes.db");

        {
            let store = HashStore::open(&path).unwrap();
            store.save(record(0));
            store.save(record(1));
        }

        let store = HashStore::open(&path).unwrap();
        assert_eq!(store.record_count().unwrap(), 2);
    }

    #[test]
    fn test_independent_stores_have_independent_batches() {
        let a = HashStore::open_in_memory().unwrap();
        let b = HashStore::open_in_memory().unwrap();
        a.save(record(0));

        assert_eq!(a.pending(), 1);
        assert_eq!(b.pending(), 0);
        assert_eq!(b.flush(), 0);
        assert_eq!(a.flush(), 1);
    }

    #[test]
    fn test_with_batch_size_keeps_pending() {
        let store = HashStore::open_in_memory().unwrap();
        store.save(record(0));
        let store = store.with_batch_size(2);

        assert_eq!(store.batch_size(), 2);
        assert_eq!(store.pending(), 1);
        assert_eq!(store.save(record(1)), 2);
    }
}
