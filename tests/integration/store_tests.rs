use gen_readme::scanner::ContentHash;
use gen_readme::store::{EventKind, FileRecord, HashStore};
use std::fs;
use tempfile::tempdir;

fn record(n: usize) -> FileRecord {
    FileRecord::new(
        format!("/notes/file{n}.md"),
        ContentHash::of_bytes(n.to_string().as_bytes()),
        n as f64,
    )
}

#[test]
fn test_batch_threshold_and_final_flush() {
    let dir = tempdir().unwrap();
    let store = HashStore::open(&dir.path().join("hashes.db"))
        .unwrap()
        .with_batch_size(3);

    let written: Vec<usize> = (0..5).map(|n| store.save(record(n))).collect();
    assert_eq!(written, vec![0, 0, 3, 0, 0]);
    assert_eq!(store.pending(), 2);
    assert_eq!(store.record_count().unwrap(), 3);

    assert_eq!(store.flush(), 2);
    assert_eq!(store.pending(), 0);
    assert_eq!(store.record_count().unwrap(), 5);
    assert_eq!(store.flush(), 0);
}

#[test]
fn test_pending_records_flushed_on_drop() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("hashes.db");
    {
        let store = HashStore::open(&db).unwrap().with_batch_size(10);
        store.save(record(1));
        store.save(record(2));
        assert_eq!(store.record_count().unwrap(), 0);
    }
    let store = HashStore::open(&db).unwrap();
    assert_eq!(store.record_count().unwrap(), 2);
}

#[test]
fn test_records_persist_across_reopen() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("nested").join("hashes.db");
    {
        let store = HashStore::open(&db).unwrap();
        store.save(record(7));
        store.flush();
    }
    assert!(db.exists());

    let store = HashStore::open(&db).unwrap();
    let all = store.load_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(
        all.get("/notes/file7.md"),
        Some(&ContentHash::of_bytes(b"7"))
    );
    assert_eq!(store.path(), Some(db.as_path()));
}

#[test]
fn test_save_replaces_existing_record() {
    let store = HashStore::open_in_memory().unwrap().with_batch_size(1);
    store.save(FileRecord::new("/notes/a.md", ContentHash::of_bytes(b"v1"), 1.0));
    store.save(FileRecord::new("/notes/a.md", ContentHash::of_bytes(b"v2"), 2.0));

    assert_eq!(store.record_count().unwrap(), 1);
    let stored = store.get("/notes/a.md").unwrap().unwrap();
    assert_eq!(stored.hash, ContentHash::of_bytes(b"v2"));
    assert_eq!(stored.modified, 2.0);
}

#[test]
fn test_skipped_files_and_events() {
    let store = HashStore::open_in_memory().unwrap();
    store
        .record_skipped("/notes/locked.md", "Permission denied")
        .unwrap();
    store
        .record_skipped("/notes/locked.md", "Permission denied again")
        .unwrap();
    store.record_event(EventKind::Info, "first").unwrap();
    store.record_event(EventKind::Warning, "second").unwrap();
    store.record_event(EventKind::Error, "third").unwrap();

    let skipped = store.skipped_files().unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].reason, "Permission denied again");

    let events = store.recent_events(2).unwrap();
    let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["second", "third"]);

    assert_eq!(store.clear_skipped().unwrap(), 1);
    assert!(store.skipped_files().unwrap().is_empty());
}

#[test]
fn test_remove_records() {
    let store = HashStore::open_in_memory().unwrap().with_batch_size(1);
    for n in 0..3 {
        store.save(record(n));
    }

    let removed = store
        .remove(&["/notes/file0.md", "/notes/file2.md", "/notes/missing.md"][..])
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(store.record_count().unwrap(), 1);
}

#[test]
fn test_open_on_corrupt_file_fails() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("hashes.db");
    fs::write(&db, vec![0xAB; 4096]).unwrap();

    assert!(HashStore::open(&db).is_err());
}

#[test]
fn test_stale_marks_persist_across_reopen() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("hashes.db");
    {
        let store = HashStore::open(&db).unwrap().with_batch_size(1);
        store.save(record(1));
        store.save(record(2));
        assert_eq!(store.mark_stale(&["/notes/file1.md"][..]).unwrap(), 1);
    }

    let store = HashStore::open(&db).unwrap().with_batch_size(1);
    assert!(store.stale_paths().unwrap().contains("/notes/file1.md"));
    assert_eq!(store.record_count().unwrap(), 2);

    store.save(record(1));
    assert!(store.stale_paths().unwrap().is_empty());
}
