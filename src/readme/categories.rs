//! Category index for the root of a notes repository.
//!
//! With the `categories` root layout, every visible subdirectory of the root
//! is a category and every Markdown file directly inside it is a note. The
//! root index then links each category and lists its notes instead of the
//! plain directory listing.

use super::listing::{display_title, link_target, DirectoryListing};
use super::ReadmeError;
use crate::scanner::ExcludeRules;

/// Extension of files counted as notes.
pub const NOTE_EXTENSION: &str = ".md";

/// One category: a subdirectory of the root and its notes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Category {
    /// Directory name
    pub name: String,
    /// Markdown files in the directory, sorted, excluding the index file
    pub notes: Vec<String>,
}

impl Category {
    /// In-page anchor of the category heading.
    ///
    /// Lower-cased, spaces become `-`, and anything other than letters,
    /// digits, `-` and `_` is dropped.
    #[must_use]
    pub fn anchor(&self) -> String {
        self.name
            .to_lowercase()
            .chars()
            .filter_map(|c| match c {
                ' ' => Some('-'),
                c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
                _ => None,
            })
            .collect()
    }
}

/// All categories below the root, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryIndex {
    /// Categories in name order
    pub categories: Vec<Category>,
}

impl CategoryIndex {
    /// Build the index from the root listing.
    ///
    /// # Errors
    ///
    /// Returns [`ReadmeError::Io`] if a category directory cannot be read.
    pub fn read(
        root: &DirectoryListing,
        rules: &ExcludeRules,
        index_file_name: &str,
    ) -> Result<Self, ReadmeError> {
        let mut categories = Vec::with_capacity(root.subdirs.len());
        for name in &root.subdirs {
            let listing = DirectoryListing::read(&root.dir.join(name), rules, index_file_name)?;
            let notes = listing
                .files
                .into_iter()
                .filter(|f| f.ends_with(NOTE_EXTENSION))
                .collect();
            categories.push(Category {
                name: name.clone(),
                notes,
            });
        }
        Ok(Self { categories })
    }

    /// Total number of notes across all categories.
    #[must_use]
    pub fn note_count(&self) -> usize {
        self.categories.iter().map(|c| c.notes.len()).sum()
    }

    /// One `* [name](#anchor)` line per category.
    #[must_use]
    pub fn links(&self) -> String {
        self.categories
            .iter()
            .map(|c| format!("* [{}](#{})\n", c.name, c.anchor()))
            .collect()
    }

    /// A `### name` section per category with notes, each note linked
    /// relative to the root.
    #[must_use]
    pub fn details(&self) -> String {
        let mut out = String::new();
        for category in self.categories.iter().filter(|c| !c.notes.is_empty()) {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("### {}\n\n", category.name));
            for note in &category.notes {
                out.push_str(&format!(
                    "- [{}]({}/{})\n",
                    display_title(note),
                    link_target(&category.name),
                    link_target(note)
                ));
            }
        }
        out
    }

    /// Text appended to the root digest so note changes in any category
    /// regenerate the root index.
    #[must_use]
    pub fn digest_input(&self) -> String {
        let mut buf = String::new();
        for category in &self.categories {
            buf.push_str("\nc:");
            buf.push_str(&category.name);
            for note in &category.notes {
                buf.push_str("\nn:");
                buf.push_str(note);
            }
        }
        buf
    }
}
