use gen_readme::detect::{ChangeDetector, DetectorConfig};
use gen_readme::scanner::path_utils::path_key;
use gen_readme::scanner::{FileMeta, ScanError, Walker, WalkerConfig};
use gen_readme::store::HashStore;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

fn scan(root: &Path) -> Result<Vec<FileMeta>, ScanError> {
    Walker::new(root, WalkerConfig::default())?.scan()
}

fn open_detector(db: &Path) -> ChangeDetector {
    let store = Arc::new(HashStore::open(db).unwrap());
    ChangeDetector::new(store, DetectorConfig::default().with_workers(2))
}

#[test]
fn test_incremental_runs_across_store_reopen() {
    let notes = tempdir().unwrap();
    let data = tempdir().unwrap();
    let db = data.path().join("file_hashes.db");
    let a = notes.path().join("a.md");
    let b = notes.path().join("b.md");
    fs::write(&a, "alpha").unwrap();
    fs::write(&b, "beta").unwrap();

    // First run: everything is new
    {
        let detector = open_detector(&db);
        let detection = detector
            .detect_changes(notes.path(), &HashMap::new(), scan)
            .unwrap();
        assert_eq!(detection.changed, vec![a.clone(), b.clone()]);
        assert_eq!(detection.stats.new_files, 2);
        detector.store().flush();
    }

    // Second run against the persisted hashes: nothing changed
    {
        let detector = open_detector(&db);
        let prior = detector.store().load_all().unwrap();
        assert_eq!(prior.len(), 2);

        let detection = detector.detect_changes(notes.path(), &prior, scan).unwrap();
        assert!(detection.is_empty());
        assert_eq!(detection.stats.unchanged, 2);
        detector.store().flush();
    }

    // Content edit is reported
    fs::write(&a, "alpha, revised").unwrap();
    {
        let detector = open_detector(&db);
        let prior = detector.store().load_all().unwrap();
        let detection = detector.detect_changes(notes.path(), &prior, scan).unwrap();
        assert_eq!(detection.changed, vec![a.clone()]);
        assert_eq!(detection.stats.modified_files, 1);
        detector.store().flush();
    }
}

#[test]
fn test_mtime_only_change_is_not_reported() {
    let notes = tempdir().unwrap();
    let path = notes.path().join("a.md");
    fs::write(&path, "alpha").unwrap();

    let store = Arc::new(HashStore::open_in_memory().unwrap());
    let detector = ChangeDetector::new(Arc::clone(&store), DetectorConfig::default());
    detector
        .detect_changes(notes.path(), &HashMap::new(), scan)
        .unwrap();
    store.flush();
    let before = store.get(&path_key(&path)).unwrap().unwrap();

    let later = SystemTime::now() + Duration::from_secs(3600);
    filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(later)).unwrap();

    let prior = store.load_all().unwrap();
    let detection = detector.detect_changes(notes.path(), &prior, scan).unwrap();
    store.flush();

    assert!(detection.is_empty());
    let after = store.get(&path_key(&path)).unwrap().unwrap();
    assert_eq!(before.hash, after.hash);
    assert!(after.modified > before.modified);
}

#[test]
fn test_deleted_file_keeps_its_record() {
    let notes = tempdir().unwrap();
    let a = notes.path().join("a.md");
    let b = notes.path().join("b.md");
    fs::write(&a, "alpha").unwrap();
    fs::write(&b, "beta").unwrap();

    let store = Arc::new(HashStore::open_in_memory().unwrap());
    let detector = ChangeDetector::new(Arc::clone(&store), DetectorConfig::default());
    detector
        .detect_changes(notes.path(), &HashMap::new(), scan)
        .unwrap();
    store.flush();

    fs::remove_file(&b).unwrap();
    let prior = store.load_all().unwrap();
    let detection = detector.detect_changes(notes.path(), &prior, scan).unwrap();
    store.flush();

    assert!(detection.changed.is_empty());
    assert_eq!(detection.stats.scanned, 1);
    assert!(!detection.current.contains_key(&path_key(&b)));
    assert!(store.get(&path_key(&b)).unwrap().is_some());
}

#[test]
fn test_excluded_directories_are_not_hashed() {
    let notes = tempdir().unwrap();
    fs::create_dir_all(notes.path().join("venv").join("lib")).unwrap();
    fs::create_dir(notes.path().join("rust")).unwrap();
    fs::write(notes.path().join("venv").join("lib").join("x.py"), "x").unwrap();
    fs::write(notes.path().join("rust").join("ownership.md"), "own").unwrap();
    fs::write(notes.path().join(".hidden.md"), "secret").unwrap();

    let config = WalkerConfig::new(vec!["venv".to_string()], -1, 2);
    let detector = ChangeDetector::new(
        Arc::new(HashStore::open_in_memory().unwrap()),
        DetectorConfig::default(),
    );
    let detection = detector
        .detect_changes(notes.path(), &HashMap::new(), |root| {
            Walker::new(root, config)?.scan()
        })
        .unwrap();

    assert_eq!(
        detection.changed,
        vec![notes.path().join("rust").join("ownership.md")]
    );
}

#[test]
fn test_depth_limit_restricts_detection() {
    let notes = tempdir().unwrap();
    fs::create_dir(notes.path().join("sub")).unwrap();
    fs::write(notes.path().join("top.md"), "top").unwrap();
    fs::write(notes.path().join("sub").join("deep.md"), "deep").unwrap();

    let detector = ChangeDetector::new(
        Arc::new(HashStore::open_in_memory().unwrap()),
        DetectorConfig::default(),
    );
    let detection = detector
        .detect_changes(notes.path(), &HashMap::new(), |root| {
            Walker::new(root, WalkerConfig::new(Vec::new(), 0, 1))?.scan()
        })
        .unwrap();

    assert_eq!(detection.changed, vec![notes.path().join("top.md")]);
}
