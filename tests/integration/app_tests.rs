use clap::Parser;
use gen_readme::cli::Cli;
use gen_readme::config::{Config, ConfigError};
use gen_readme::error::ExitCode;
use gen_readme::run_app;
use gen_readme::store::HashStore;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn cli(args: &[&str]) -> Cli {
    Cli::parse_from(std::iter::once("gen-readme").chain(args.iter().copied()))
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_scan_command_end_to_end() {
    let notes = tempdir().unwrap();
    let data = tempdir().unwrap();
    let config_path = data.path().join("config.toml");
    let db = data.path().join("file_hashes.db");
    fs::write(&config_path, "workers = 2\n").unwrap();
    fs::write(notes.path().join("a.md"), "alpha").unwrap();
    fs::write(notes.path().join("b.md"), "beta").unwrap();

    let args = [
        "--quiet",
        "--config",
        path_str(&config_path),
        "scan",
        path_str(notes.path()),
        "--db",
        path_str(&db),
        "--no-progress",
    ];

    let code = run_app(cli(&args)).unwrap();
    assert_eq!(code, ExitCode::Success);
    let index = fs::read_to_string(notes.path().join("README.md")).unwrap();
    assert!(index.contains("- [A](a.md)"));
    assert!(index.contains("- [B](b.md)"));

    // Two notes plus the generated index
    let store = HashStore::open(&db).unwrap();
    assert_eq!(store.record_count().unwrap(), 3);
    drop(store);

    let code = run_app(cli(&args)).unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_scan_missing_root_maps_to_config_exit_code() {
    let data = tempdir().unwrap();
    let config_path = data.path().join("config.toml");
    fs::write(&config_path, "").unwrap();
    let missing = data.path().join("no-such-notes");

    let err = run_app(cli(&[
        "--quiet",
        "--config",
        path_str(&config_path),
        "scan",
        path_str(&missing),
        "--db",
        path_str(&data.path().join("file_hashes.db")),
    ]))
    .unwrap_err();

    assert_eq!(ExitCode::for_error(&err), ExitCode::ConfigError);
}

#[test]
fn test_missing_config_file_maps_to_config_exit_code() {
    let data = tempdir().unwrap();
    let err = run_app(cli(&[
        "--quiet",
        "--config",
        path_str(&data.path().join("absent.toml")),
        "scan",
        path_str(data.path()),
    ]))
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::NotFound(_))
    ));
    assert_eq!(ExitCode::for_error(&err), ExitCode::ConfigError);
}

#[test]
fn test_exclude_commands_edit_config_file() {
    let data = tempdir().unwrap();
    let config_path = data.path().join("config.toml");
    let config = path_str(&config_path);

    let code = run_app(cli(&["--quiet", "--config", config, "exclude", "add", "build"])).unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(Config::load_file(&config_path)
        .unwrap()
        .exclusions()
        .contains(&"build".to_string()));

    run_app(cli(&[
        "--quiet", "--config", config, "exclude", "modify", "build", "target",
    ]))
    .unwrap();
    let exclusions = Config::load_file(&config_path).unwrap().excluded_dirs;
    assert!(exclusions.contains(&"target".to_string()));
    assert!(!exclusions.contains(&"build".to_string()));

    run_app(cli(&["--quiet", "--config", config, "exclude", "remove", "target"])).unwrap();
    assert!(!Config::load_file(&config_path)
        .unwrap()
        .excluded_dirs
        .contains(&"target".to_string()));

    let code = run_app(cli(&["--quiet", "--config", config, "exclude", "list"])).unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_exclude_remove_unknown_pattern_fails() {
    let data = tempdir().unwrap();
    let config_path = data.path().join("config.toml");

    let err = run_app(cli(&[
        "--quiet",
        "--config",
        path_str(&config_path),
        "exclude",
        "remove",
        "vnev",
    ]))
    .unwrap_err();

    assert!(err.to_string().contains("did you mean 'venv'?"));
    assert_eq!(ExitCode::for_error(&err), ExitCode::ConfigError);
}

#[test]
fn test_report_command() {
    let data = tempdir().unwrap();
    let db = data.path().join("file_hashes.db");

    // Missing database is not an error
    let code = run_app(cli(&["--quiet", "report", "--db", path_str(&db)])).unwrap();
    assert_eq!(code, ExitCode::Success);

    {
        let store = HashStore::open(&db).unwrap();
        store.record_skipped("/notes/x.md", "Permission denied").unwrap();
    }

    let code = run_app(cli(&[
        "--quiet",
        "report",
        "--db",
        path_str(&db),
        "--output",
        "json",
        "--clear-skipped",
    ]))
    .unwrap();
    assert_eq!(code, ExitCode::Success);

    let store = HashStore::open(&db).unwrap();
    assert!(store.skipped_files().unwrap().is_empty());
}
