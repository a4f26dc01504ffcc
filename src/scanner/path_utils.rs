//! Path helpers shared by the scanner, the hash store and the README generator.
//!
//! Store keys are NFC-normalized path strings. macOS reports NFD names while
//! most other systems use NFC, so the same note would otherwise be stored
//! under two different keys after syncing the notes folder between machines:
//!
//! - NFC: `café.md` - 'é' is U+00E9 (single code point)
//! - NFD: `café.md` - 'e' U+0065 + combining acute accent U+0301
//!
//! # Example
//!
//! ```
//! use gen_readme::scanner::path_utils::path_key;
//! use std::path::Path;
//!
//! assert_eq!(
//!     path_key(Path::new("café.md")),
//!     path_key(Path::new("cafe\u{0301}.md")),
//! );
//! ```

use std::ffi::OsStr;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use unicode_normalization::UnicodeNormalization;

/// Prefix marking hidden files and directories.
pub const HIDDEN_PREFIX: char = '.';

/// Normalize a path string to NFC (Composed) form.
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}

/// Create the hash store key for a path.
///
/// Lossy for paths that are not valid UTF-8, so two such names can share a
/// key. The change detector skips those files instead of storing them; keys
/// for them only appear in the skipped-files table.
#[must_use]
pub fn path_key(path: &Path) -> String {
    normalize_path_str(&path.to_string_lossy())
}

/// Check if a file or directory name is hidden.
#[must_use]
pub fn is_hidden_name(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with(HIDDEN_PREFIX)
}

/// Convert a modification time into floating-point epoch seconds.
///
/// Times before the epoch are returned as negative values.
#[must_use]
pub fn epoch_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Whether `path` lies at or below `root`.
#[must_use]
pub fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}
