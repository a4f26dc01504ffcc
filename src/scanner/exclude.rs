//! Glob-based directory exclusion rules.
//!
//! Patterns use shell glob syntax (`*`, `?`, `[...]`, `{a,b}`). A `*` also
//! crosses path separators, so `*/drafts` excludes a `drafts` directory at
//! any depth. Each pattern is tested against the full directory path and
//! against the bare directory name, which lets short entries such as `venv`
//! or `.git` work without a leading wildcard.

use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use super::ScanError;

/// Compiled set of exclusion patterns.
#[derive(Debug, Clone)]
pub struct ExcludeRules {
    patterns: Vec<String>,
    set: GlobSet,
}

impl ExcludeRules {
    /// Compile the given patterns.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidPattern`] for the first malformed pattern.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ScanError> {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            let glob = GlobBuilder::new(pattern)
                .literal_separator(false)
                .build()
                .map_err(|source| ScanError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })?;
            builder.add(glob);
            kept.push(pattern.to_string());
        }

        let set = builder.build().map_err(|source| ScanError::InvalidPattern {
            pattern: kept.join(", "),
            source,
        })?;

        Ok(Self {
            patterns: kept,
            set,
        })
    }

    /// Rules that exclude nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    /// The patterns this rule set was compiled from.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns `true` if no patterns are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Check whether a directory should be excluded.
    #[must_use]
    pub fn is_excluded(&self, dir: &Path) -> bool {
        if self.set.is_empty() {
            return false;
        }
        if self.set.is_match(dir) {
            return true;
        }
        dir.file_name()
            .is_some_and(|name| self.set.is_match(Path::new(name)))
    }
}

impl Default for ExcludeRules {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rules_exclude_nothing() {
        let rules = ExcludeRules::empty();
        assert!(rules.is_empty());
        assert!(!rules.is_excluded(Path::new("/notes/venv")));
    }

    #[test]
    fn test_bare_name_pattern() {
        let rules = ExcludeRules::new(&["venv"]).unwrap();
        assert!(rules.is_excluded(Path::new("/notes/python/venv")));
        assert!(!rules.is_excluded(Path::new("/notes/python/venv2")));
    }

    #[test]
    fn test_wildcard_crosses_separators() {
        let rules = ExcludeRules::new(&["*/tmp"]).unwrap();
        assert!(rules.is_excluded(Path::new("/notes/tmp")));
        assert!(rules.is_excluded(Path::new("/notes/a/b/tmp")));
        assert!(!rules.is_excluded(Path::new("/notes/tmpfiles")));
    }

    #[test]
    fn test_full_path_pattern() {
        let rules = ExcludeRules::new(&["/notes/archive*"]).unwrap();
        assert!(rules.is_excluded(Path::new("/notes/archive")));
        assert!(rules.is_excluded(Path::new("/notes/archive-2023")));
        assert!(!rules.is_excluded(Path::new("/other/archive")));
    }

    #[test]
    fn test_blank_patterns_ignored() {
        let rules = ExcludeRules::new(&["", "  "]).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_malformed_pattern_fails_fast() {
        let err = ExcludeRules::new(&["ok", "[unclosed"]).unwrap_err();
        match err {
            ScanError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "[unclosed"),
            other => panic!("Expected InvalidPattern, got {:?}", other),
        }
    }

    #[test]
    fn test_patterns_are_preserved() {
        let rules = ExcludeRules::new(&[".git", " node_modules "]).unwrap();
        assert_eq!(rules.patterns(), &[".git".to_string(), "node_modules".to_string()]);
    }
}
