use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use gen_readme::cli::Cli;
use gen_readme::config::{Config, ConfigError, StalePolicy, ENV_PREFIX};
use gen_readme::readme::RootLayout;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

use clap::Parser;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config.excluded_dirs, vec![".git", ".config", "venv"]);
    assert_eq!(config.batch_size, 1000);
    assert_eq!(config.max_depth, -1);
    assert_eq!(config.index_file_name, "README.md");
    assert_eq!(config.stale_policy, StalePolicy::Keep);
}

#[test]
fn test_config_load_from_env() {
    std::env::set_var("GEN_README_MAX_DEPTH", "3");

    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed(ENV_PREFIX));
    let config: Config = figment.extract().unwrap();

    assert_eq!(config.max_depth, 3);

    std::env::remove_var("GEN_README_MAX_DEPTH");
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
excluded_dirs = [".git", "node_modules", "*/drafts"]
workers = 8
batch_size = 250
max_depth = 2
default_folder = "/home/me/notes"
stale_policy = "prune"
root_layout = "categories"
"#;
    fs::write(&config_path, toml_content).unwrap();

    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&config_path));
    let config: Config = figment.extract().unwrap();

    assert_eq!(config.excluded_dirs, vec![".git", "node_modules", "*/drafts"]);
    assert_eq!(config.workers, 8);
    assert_eq!(config.batch_size, 250);
    assert_eq!(config.max_depth, 2);
    assert_eq!(config.default_folder, Some(PathBuf::from("/home/me/notes")));
    assert_eq!(config.stale_policy, StalePolicy::Prune);
    assert_eq!(config.root_layout, RootLayout::Categories);
    // Unset keys keep their defaults
    assert_eq!(config.index_file_name, "README.md");
}

#[test]
fn test_config_load_rejects_invalid_values() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "batch_size = 0\n").unwrap();

    let err = Config::load(Some(&config_path)).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBatchSize));
}

#[test]
fn test_config_load_rejects_bad_pattern() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "excluded_dirs = [\"[unclosed\"]\n").unwrap();

    let err = Config::load(Some(&config_path)).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidPattern(_)));
}

#[test]
fn test_config_load_wrong_type() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "workers = \"many\"\n").unwrap();

    let err = Config::load(Some(&config_path)).unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn test_cli_overrides_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "workers = 8\nmax_depth = 2\n").unwrap();

    let mut config = Config::load(Some(&config_path)).unwrap();
    let cli = Cli::parse_from([
        "gen-readme",
        "scan",
        "--workers",
        "3",
        "--depth",
        "-1",
        "-e",
        "build",
        "--prune-stale",
    ]);
    let gen_readme::cli::Commands::Scan(args) = cli.command else {
        panic!("expected scan command");
    };
    args.apply(&mut config);

    assert_eq!(config.workers, 3);
    assert_eq!(config.max_depth, -1);
    assert!(config.excluded_dirs.contains(&"build".to_string()));
    assert_eq!(config.stale_policy, StalePolicy::Prune);
}

#[test]
fn test_exclusion_edits_round_trip_through_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("nested").join("config.toml");

    let mut config = Config::load_file(&config_path).unwrap();
    config.add_exclusion("node_modules").unwrap();
    config.save(&config_path).unwrap();

    let mut reloaded = Config::load_file(&config_path).unwrap();
    assert!(reloaded.exclusions().contains(&"node_modules".to_string()));

    let err = reloaded.add_exclusion("node_modules").unwrap_err();
    assert!(matches!(err, ConfigError::DuplicatePattern(_)));

    let err = reloaded.remove_exclusion("node_module").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Pattern not found: node_module (did you mean 'node_modules'?)"
    );
}
