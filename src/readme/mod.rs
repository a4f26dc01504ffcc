//! Index file generation.
//!
//! Given the changed paths from a detection pass, this module works out
//! which directories are affected and rewrites their index files
//! (`README.md` by default).
//!
//! A directory is affected when a changed file lives in it or anywhere
//! below it, up to the scan root. Index files never make their own
//! directory affected, otherwise every run would trigger the next one.
//!
//! Each generated file starts with a digest of the directory listing; an
//! existing file with the same digest is left alone.
//!
//! With [`RootLayout::Categories`] the root index lists categories and
//! their notes instead (see [`categories`]).

pub mod categories;
pub mod listing;
pub mod template;

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::scanner::path_utils::is_within;
use crate::scanner::{ContentHash, ExcludeRules};

pub use categories::{Category, CategoryIndex};
pub use listing::{display_title, DirectoryListing};
pub use template::{parse_marker, Template};

/// Default index file name.
pub const DEFAULT_INDEX_FILE: &str = "README.md";

/// Errors from index file generation.
#[derive(thiserror::Error, Debug)]
pub enum ReadmeError {
    /// Reading a directory or writing an index file failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The custom template could not be read.
    #[error("Cannot read template {path}: {source}")]
    Template {
        /// Template path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Layout of the root index file.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RootLayout {
    /// Same listing as every other directory
    #[default]
    Listing,
    /// Category links, per-category note lists and a note count
    Categories,
}

/// What happened to one index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadmeOutcome {
    /// No index file existed
    Created,
    /// The listing changed and the file was rewritten
    Updated,
    /// The listing digest matched and the file was left alone
    Unchanged,
}

/// Result of generating one index file.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedReadme {
    /// Path of the index file
    pub path: PathBuf,
    /// What happened
    pub outcome: ReadmeOutcome,
    /// Digest of the written content, absent when nothing was written
    #[serde(skip)]
    pub content_hash: Option<ContentHash>,
}

/// Writes index files.
#[derive(Debug, Clone)]
pub struct ReadmeGenerator {
    rules: Arc<ExcludeRules>,
    index_file_name: String,
    template: Template,
    date: String,
    dry_run: bool,
    categories_root: Option<PathBuf>,
}

impl ReadmeGenerator {
    /// Create a generator using today's local date.
    #[must_use]
    pub fn new(rules: Arc<ExcludeRules>) -> Self {
        Self {
            rules,
            index_file_name: DEFAULT_INDEX_FILE.to_string(),
            template: Template::Builtin,
            date: chrono::Local::now().format("%Y-%m-%d").to_string(),
            dry_run: false,
            categories_root: None,
        }
    }

    /// Set the index file name.
    #[must_use]
    pub fn with_index_file_name(mut self, name: impl Into<String>) -> Self {
        self.index_file_name = name.into();
        self
    }

    /// Set the template.
    #[must_use]
    pub fn with_template(mut self, template: Template) -> Self {
        self.template = template;
        self
    }

    /// Override the date written into index files.
    #[must_use]
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    /// Report outcomes without writing anything.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Choose the layout of the index file in `root`.
    #[must_use]
    pub fn with_root_layout(mut self, root: &Path, layout: RootLayout) -> Self {
        self.categories_root = match layout {
            RootLayout::Listing => None,
            RootLayout::Categories => Some(root.to_path_buf()),
        };
        self
    }

    /// The index file name.
    #[must_use]
    pub fn index_file_name(&self) -> &str {
        &self.index_file_name
    }

    /// Directories whose index files need regenerating, sorted.
    #[must_use]
    pub fn affected_directories(&self, root: &Path, changed: &[PathBuf]) -> Vec<PathBuf> {
        affected_directories(root, changed, &self.index_file_name)
    }

    /// Generate the index file for `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ReadmeError::Io`] if the directory cannot be listed or the
    /// file cannot be written.
    pub fn generate(&self, dir: &Path) -> Result<GeneratedReadme, ReadmeError> {
        let listing = DirectoryListing::read(dir, &self.rules, &self.index_file_name)?;
        let categories = match self.categories_root {
            Some(ref root) if root == dir => Some(CategoryIndex::read(
                &listing,
                &self.rules,
                &self.index_file_name,
            )?),
            _ => None,
        };
        let digest = match categories {
            Some(ref c) => {
                listing.digest(&format!("{}{}", self.template.source(), c.digest_input()))
            }
            None => listing.digest(self.template.source()),
        };
        let path = dir.join(&self.index_file_name);

        let outcome = match fs::read_to_string(&path) {
            Ok(existing) if parse_marker(&existing) == Some(digest) => ReadmeOutcome::Unchanged,
            Ok(_) => ReadmeOutcome::Updated,
            Err(e) if e.kind() == io::ErrorKind::NotFound => ReadmeOutcome::Created,
            // Unreadable (e.g. not UTF-8): overwrite it
            Err(e) => {
                log::debug!("Cannot read {}: {}", path.display(), e);
                ReadmeOutcome::Updated
            }
        };

        if outcome == ReadmeOutcome::Unchanged || self.dry_run {
            log::debug!("{}: {:?}", path.display(), outcome);
            return Ok(GeneratedReadme {
                path,
                outcome,
                content_hash: None,
            });
        }

        let content = match categories {
            Some(ref c) => self.template.render_root(&listing, c, &digest, &self.date),
            None => self.template.render(&listing, &digest, &self.date),
        };
        write_file(&path, content.as_bytes())?;
        log::info!(
            "{} {}",
            if outcome == ReadmeOutcome::Created { "Created" } else { "Updated" },
            path.display()
        );

        Ok(GeneratedReadme {
            path,
            outcome,
            content_hash: Some(ContentHash::of_bytes(content.as_bytes())),
        })
    }
}

fn write_file(path: &Path, content: &[u8]) -> Result<(), ReadmeError> {
    let io_err = |source| ReadmeError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).map_err(io_err)?;
    file.write_all(content).map_err(io_err)?;
    Ok(())
}

/// Directories affected by `changed`: the parent of every changed file and
/// all of its ancestors up to and including `root`.
///
/// Changed files named `index_file_name` and paths outside `root` are
/// ignored.
#[must_use]
pub fn affected_directories(root: &Path, changed: &[PathBuf], index_file_name: &str) -> Vec<PathBuf> {
    let mut dirs = BTreeSet::new();

    for path in changed {
        if path.file_name().is_some_and(|n| n == index_file_name) {
            continue;
        }

        let mut current = path.parent();
        while let Some(dir) = current {
            if !is_within(dir, root) || !dirs.insert(dir.to_path_buf()) {
                break;
            }
            if dir == root {
                break;
            }
            current = dir.parent();
        }
    }

    dirs.into_iter().collect()
}
