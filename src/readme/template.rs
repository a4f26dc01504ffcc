//! Index file rendering.
//!
//! The built-in layout:
//!
//! ```text
//! <!-- hash:<listing digest> -->
//! # Rust
//!
//! >This directory contains 2 files as of 2024-05-01
//!
//! ---
//!
//! ## Files
//!
//! - [Ownership](ownership.md)
//!
//! ## Subdirectories
//!
//! - [Async](./async)
//! ```
//!
//! The root index in the `categories` layout:
//!
//! ```text
//! <!-- hash:<listing digest> -->
//! # Notes
//!
//! _3 TILs and counting..._
//!
//! ---
//!
//! ### Categories
//!
//! * [rust](#rust)
//!
//! ---
//!
//! ### rust
//!
//! - [Ownership](rust/ownership.md)
//! ```
//!
//! A custom template is plain text with `{directory_name}`, `{file_list}`,
//! `{subdir_list}`, `{file_count}` and `{date}` placeholders, plus
//! `{category_list}`, `{category_details}` and `{note_count}` which are only
//! filled in for a categories root and are empty elsewhere. Placeholders are
//! substituted in one pass, so braces inside file names are never expanded.
//! The digest marker is always written on the first line.

use std::fs;
use std::path::Path;

use crate::scanner::ContentHash;

use super::categories::CategoryIndex;
use super::listing::{display_title, link_target, DirectoryListing};
use super::ReadmeError;

const MARKER_PREFIX: &str = "<!-- hash:";
const MARKER_SUFFIX: &str = " -->";

/// Index file template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Template {
    /// The built-in layout
    #[default]
    Builtin,
    /// User-supplied text with placeholders
    Custom(String),
}

impl Template {
    /// Load a custom template from a file.
    ///
    /// # Errors
    ///
    /// Returns [`ReadmeError::Template`] if the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, ReadmeError> {
        let text = fs::read_to_string(path).map_err(|source| ReadmeError::Template {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::Custom(text))
    }

    /// Text that feeds the listing digest, so editing the template
    /// regenerates every affected index file.
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::Builtin => "",
            Self::Custom(text) => text,
        }
    }

    /// Render the index file for `listing`.
    #[must_use]
    pub fn render(&self, listing: &DirectoryListing, digest: &ContentHash, date: &str) -> String {
        self.render_with(listing, None, digest, date)
    }

    /// Render the root index in the categories layout.
    #[must_use]
    pub fn render_root(
        &self,
        listing: &DirectoryListing,
        categories: &CategoryIndex,
        digest: &ContentHash,
        date: &str,
    ) -> String {
        self.render_with(listing, Some(categories), digest, date)
    }

    fn render_with(
        &self,
        listing: &DirectoryListing,
        categories: Option<&CategoryIndex>,
        digest: &ContentHash,
        date: &str,
    ) -> String {
        let mut out = marker_line(digest);
        out.push('\n');

        match (self, categories) {
            (Self::Builtin, Some(categories)) => {
                out.push_str(&format!("# {}\n\n", listing.title()));
                out.push_str(&format!(
                    "_{} TILs and counting..._\n\n",
                    categories.note_count()
                ));
                out.push_str("---\n\n### Categories\n\n");
                out.push_str(&categories.links());
                let details = categories.details();
                if !details.is_empty() {
                    out.push_str("\n---\n\n");
                    out.push_str(&details);
                }
            }
            (Self::Builtin, None) => {
                out.push_str(&format!("# {}\n\n", listing.title()));
                out.push_str(&format!(
                    ">This directory contains {} files as of {}\n\n",
                    listing.file_count(),
                    date
                ));
                out.push_str("---\n\n## Files\n\n");
                out.push_str(&file_list(listing));
                if !listing.subdirs.is_empty() {
                    out.push_str("\n## Subdirectories\n\n");
                    out.push_str(&subdir_list(listing));
                }
            }
            (Self::Custom(text), categories) => {
                let title = listing.title();
                let files = file_list(listing);
                let subdirs = subdir_list(listing);
                let file_count = listing.file_count().to_string();
                let (links, details, note_count) = match categories {
                    Some(c) => (c.links(), c.details(), c.note_count().to_string()),
                    None => Default::default(),
                };
                let rendered = fill_placeholders(
                    text,
                    &[
                        ("directory_name", title.as_str()),
                        ("file_list", files.trim_end()),
                        ("subdir_list", subdirs.trim_end()),
                        ("file_count", file_count.as_str()),
                        ("date", date),
                        ("category_list", links.trim_end()),
                        ("category_details", details.trim_end()),
                        ("note_count", note_count.as_str()),
                    ],
                );
                out.push_str(&rendered);
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
        }

        out
    }
}

/// Replace every `{key}` in `text` with its value, scanning left to right.
/// Substituted values are never rescanned; unknown keys are kept verbatim.
fn fill_placeholders(text: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = values.iter().find_map(|&(key, value)| {
            tail.strip_prefix(key)?
                .strip_prefix('}')
                .map(|after| (value, after))
        });
        match hit {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn file_list(listing: &DirectoryListing) -> String {
    listing
        .files
        .iter()
        .map(|f| format!("- [{}]({})\n", display_title(f), link_target(f)))
        .collect()
}

fn subdir_list(listing: &DirectoryListing) -> String {
    listing
        .subdirs
        .iter()
        .map(|d| format!("- [{}](./{})\n", display_title(d), link_target(d)))
        .collect()
}

/// The first-line digest marker.
#[must_use]
pub fn marker_line(digest: &ContentHash) -> String {
    format!("{MARKER_PREFIX}{digest}{MARKER_SUFFIX}")
}

/// Read the digest marker from existing index file content.
///
/// Returns `None` for files without a well-formed marker, including files
/// written by hand.
#[must_use]
pub fn parse_marker(content: &str) -> Option<ContentHash> {
    content
        .lines()
        .next()?
        .trim()
        .strip_prefix(MARKER_PREFIX)?
        .strip_suffix(MARKER_SUFFIX)?
        .parse()
        .ok()
}
