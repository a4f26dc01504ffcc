//! Directory listings rendered into index files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::scanner::path_utils::is_hidden_name;
use crate::scanner::{ContentHash, ExcludeRules};

use super::ReadmeError;

/// The visible entries of one directory, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    /// The directory that was listed
    pub dir: PathBuf,
    /// Regular files, excluding hidden files and the index file
    pub files: Vec<String>,
    /// Subdirectories, excluding hidden and excluded ones
    pub subdirs: Vec<String>,
}

impl DirectoryListing {
    /// List `dir`, leaving out hidden entries, excluded directories and
    /// `index_file_name` itself.
    ///
    /// Symbolic links and entries whose names are not valid UTF-8 are
    /// omitted.
    ///
    /// # Errors
    ///
    /// Returns [`ReadmeError::Io`] if the directory cannot be read.
    pub fn read(
        dir: &Path,
        rules: &ExcludeRules,
        index_file_name: &str,
    ) -> Result<Self, ReadmeError> {
        let io_err = |source| ReadmeError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut listing = Self {
            dir: dir.to_path_buf(),
            ..Default::default()
        };

        for entry in fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let name = entry.file_name();
            if is_hidden_name(&name) {
                continue;
            }
            let Some(name) = name.to_str().map(str::to_owned) else {
                log::debug!("Skipping non UTF-8 entry in {}", dir.display());
                continue;
            };

            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    log::debug!("Cannot stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            if file_type.is_dir() {
                if !rules.is_excluded(&entry.path()) {
                    listing.subdirs.push(name);
                }
            } else if file_type.is_file() && name != index_file_name {
                listing.files.push(name);
            }
        }

        listing.files.sort();
        listing.subdirs.sort();
        Ok(listing)
    }

    /// Number of listed files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Heading for the index file, derived from the directory name.
    #[must_use]
    pub fn title(&self) -> String {
        self.dir
            .file_name()
            .and_then(|n| n.to_str())
            .map_or_else(|| "README".to_string(), display_title)
    }

    /// Digest of the listing plus the template source.
    ///
    /// The date is deliberately not part of it, so an unchanged listing
    /// keeps its existing index file.
    #[must_use]
    pub fn digest(&self, template_source: &str) -> ContentHash {
        let mut buf = String::new();
        buf.push_str(template_source);
        for file in &self.files {
            buf.push_str("\nf:");
            buf.push_str(file);
        }
        for subdir in &self.subdirs {
            buf.push_str("\nd:");
            buf.push_str(subdir);
        }
        ContentHash::of_bytes(buf.as_bytes())
    }
}

/// Human title for a file or directory name.
///
/// `-` and `_` become spaces, a trailing `.md` is dropped and the first
/// letter is upper-cased.
#[must_use]
pub fn display_title(name: &str) -> String {
    let stem = name.strip_suffix(".md").unwrap_or(name);
    let spaced = stem.replace(['-', '_'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Markdown link target for a file name.
#[must_use]
pub fn link_target(name: &str) -> String {
    name.replace(' ', "%20")
}
