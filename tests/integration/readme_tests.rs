use gen_readme::config::Config;
use gen_readme::pipeline::Pipeline;
use gen_readme::readme::{parse_marker, ReadmeGenerator, ReadmeOutcome, RootLayout};
use gen_readme::scanner::ExcludeRules;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn config_with_db(data: &TempDir) -> Config {
    Config {
        database: Some(data.path().join("file_hashes.db")),
        workers: 2,
        ..Default::default()
    }
}

fn outcome_for(summary: &gen_readme::pipeline::RunSummary, dir: &Path) -> Option<ReadmeOutcome> {
    summary
        .readmes
        .iter()
        .find(|r| r.path == dir.join("README.md"))
        .map(|r| r.outcome)
}

#[test]
fn test_deep_change_refreshes_every_ancestor() {
    let notes = tempdir().unwrap();
    let data = tempdir().unwrap();
    let deep = notes.path().join("lang").join("rust");
    fs::create_dir_all(&deep).unwrap();
    fs::write(deep.join("ownership.md"), "own").unwrap();
    fs::write(notes.path().join("todo.md"), "todo").unwrap();

    let pipeline = Pipeline::new(notes.path(), config_with_db(&data)).unwrap();
    let first = pipeline.run().unwrap();
    assert_eq!(first.metrics.readme_created, 3);

    let root = pipeline.root().to_path_buf();
    let deep = root.join("lang").join("rust");
    fs::write(deep.join("lifetimes.md"), "lt").unwrap();
    let second = pipeline.run().unwrap();

    assert_eq!(second.changed, vec![deep.join("lifetimes.md")]);
    assert_eq!(outcome_for(&second, &deep), Some(ReadmeOutcome::Updated));
    // Ancestor listings did not change, so their files are left alone
    assert_eq!(outcome_for(&second, &root.join("lang")), Some(ReadmeOutcome::Unchanged));
    assert_eq!(outcome_for(&second, &root), Some(ReadmeOutcome::Unchanged));

    let index = fs::read_to_string(deep.join("README.md")).unwrap();
    assert!(index.contains("- [Lifetimes](lifetimes.md)"));
    assert!(index.contains("- [Ownership](ownership.md)"));
    assert!(index.contains(">This directory contains 2 files as of"));
}

#[test]
fn test_root_listing_links_subdirectories() {
    let notes = tempdir().unwrap();
    let data = tempdir().unwrap();
    fs::create_dir(notes.path().join("async-rust")).unwrap();
    fs::write(notes.path().join("async-rust").join("tokio.md"), "rt").unwrap();
    fs::create_dir(notes.path().join("venv")).unwrap();
    fs::write(notes.path().join("venv").join("site.py"), "py").unwrap();

    let pipeline = Pipeline::new(notes.path(), config_with_db(&data)).unwrap();
    let summary = pipeline.run().unwrap();

    assert_eq!(summary.changed.len(), 1);
    let index = fs::read_to_string(pipeline.root().join("README.md")).unwrap();
    assert!(index.contains("## Subdirectories"));
    assert!(index.contains("- [Async rust](./async-rust)"));
    assert!(!index.contains("venv"));
    assert!(!pipeline.root().join("venv").join("README.md").exists());
}

#[test]
fn test_custom_template_placeholders() {
    let notes = tempdir().unwrap();
    let data = tempdir().unwrap();
    let template = data.path().join("index.tmpl");
    fs::write(
        &template,
        "# {directory_name} ({file_count})\n\n{file_list}\n\nUpdated {date}\n",
    )
    .unwrap();
    let dir = notes.path().join("journal");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("day_one.md"), "1").unwrap();

    let mut config = config_with_db(&data);
    config.template = Some(template);
    let pipeline = Pipeline::new(notes.path(), config).unwrap();
    pipeline.run().unwrap();

    let index = fs::read_to_string(pipeline.root().join("journal").join("README.md")).unwrap();
    let mut lines = index.lines();
    assert!(lines.next().unwrap().starts_with("<!-- hash:"));
    assert_eq!(lines.next(), Some("# Journal (1)"));
    assert!(index.contains("- [Day one](day_one.md)"));
    assert!(index.contains("Updated "));
}

#[test]
fn test_categories_root_index() {
    let notes = tempdir().unwrap();
    let data = tempdir().unwrap();
    let layout = [
        ("git", "rebase-onto.md"),
        ("rust", "ownership.md"),
        ("rust", "traits.md"),
    ];
    for (category, note) in layout {
        let dir = notes.path().join(category);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(note), note).unwrap();
    }
    fs::create_dir(notes.path().join("assets")).unwrap();
    fs::write(notes.path().join("assets").join("logo.png"), "png").unwrap();

    let mut config = config_with_db(&data);
    config.root_layout = RootLayout::Categories;
    let pipeline = Pipeline::new(notes.path(), config).unwrap();
    pipeline.run().unwrap();

    let root = pipeline.root().to_path_buf();
    let index = fs::read_to_string(root.join("README.md")).unwrap();
    assert!(index.contains("_3 TILs and counting..._"));
    assert!(index.contains(
        "### Categories\n\n* [assets](#assets)\n* [git](#git)\n* [rust](#rust)\n"
    ));
    assert!(index.contains("### git\n\n- [Rebase onto](git/rebase-onto.md)\n"));
    assert!(index.contains("- [Ownership](rust/ownership.md)\n- [Traits](rust/traits.md)"));
    assert!(!index.contains("### assets"));

    // A note added in a category refreshes the count at the root
    fs::write(root.join("git").join("bisect.md"), "bisect").unwrap();
    let summary = pipeline.run().unwrap();
    assert_eq!(outcome_for(&summary, &root), Some(ReadmeOutcome::Updated));
    let index = fs::read_to_string(root.join("README.md")).unwrap();
    assert!(index.contains("_4 TILs and counting..._"));

    let rust_index = fs::read_to_string(root.join("rust").join("README.md")).unwrap();
    assert!(rust_index.contains("## Files"));
}

#[test]
fn test_hand_edited_index_is_rewritten() {
    let notes = tempdir().unwrap();
    fs::write(notes.path().join("a.md"), "alpha").unwrap();
    let generator =
        ReadmeGenerator::new(Arc::new(ExcludeRules::empty())).with_date("2024-05-01");

    let created = generator.generate(notes.path()).unwrap();
    assert_eq!(created.outcome, ReadmeOutcome::Created);
    assert!(created.content_hash.is_some());

    let index = notes.path().join("README.md");
    fs::write(&index, "# my own notes\n").unwrap();
    assert!(parse_marker(&fs::read_to_string(&index).unwrap()).is_none());

    let rewritten = generator.generate(notes.path()).unwrap();
    assert_eq!(rewritten.outcome, ReadmeOutcome::Updated);
    assert!(fs::read_to_string(&index).unwrap().contains("- [A](a.md)"));

    let settled = generator.generate(notes.path()).unwrap();
    assert_eq!(settled.outcome, ReadmeOutcome::Unchanged);
    assert!(settled.content_hash.is_none());
}

#[test]
fn test_date_change_alone_does_not_rewrite() {
    let notes = tempdir().unwrap();
    fs::write(notes.path().join("a.md"), "alpha").unwrap();
    let rules = Arc::new(ExcludeRules::empty());

    ReadmeGenerator::new(Arc::clone(&rules))
        .with_date("2024-05-01")
        .generate(notes.path())
        .unwrap();
    let next_day = ReadmeGenerator::new(rules)
        .with_date("2024-05-02")
        .generate(notes.path())
        .unwrap();

    assert_eq!(next_day.outcome, ReadmeOutcome::Unchanged);
    let index = fs::read_to_string(notes.path().join("README.md")).unwrap();
    assert!(index.contains("as of 2024-05-01"));
}
