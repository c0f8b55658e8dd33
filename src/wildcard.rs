//! Expands report path patterns into concrete files.
//!
//! Patterns use `*` (any run of characters within one path segment), `?`
//! (exactly one character within a segment) and `**` (zero or more whole
//! segments). Relative patterns are resolved against a base directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::error::{CovmergeError, Result};

/// `*` and `?` stay within one segment; only `**` crosses separators.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Lists the files matching a wildcard pattern.
#[derive(Debug, Clone)]
pub struct WildcardPatternFileProvider {
    base_dir: PathBuf,
}

impl WildcardPatternFileProvider {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Every file matching `pattern`.
    ///
    /// A pattern without wildcards is a single existence check. Otherwise the
    /// longest wildcard-free leading path is walked and each file's path
    /// relative to it is matched against the remaining segments.
    pub fn list_files(&self, pattern: &str) -> Result<BTreeSet<PathBuf>> {
        let normalized = pattern.trim().replace('\\', "/");

        let Some(split_at) = first_wildcard_offset(&normalized) else {
            let file = self.resolve(&normalized);
            let mut files = BTreeSet::new();
            if file.is_file() {
                files.insert(file);
            }
            return Ok(files);
        };

        let (literal, rest) = normalized.split_at(split_at);
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        if segments.iter().any(|s| *s == "." || *s == "..") {
            return Err(CovmergeError::WildcardPattern(format!(
                "'{pattern}' cannot contain '.' or '..' after the first wildcard"
            )));
        }
        let matcher = segments_pattern(&segments)?;

        let root = self.resolve(literal);
        let mut files = BTreeSet::new();
        if !root.is_dir() {
            log::debug!("Pattern root '{}' is not a directory", root.display());
            return Ok(files);
        }

        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::debug!("Skipping unreadable entry under '{}': {e}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            if matcher.matches_with(&relative, MATCH_OPTIONS) {
                files.insert(entry.path().to_path_buf());
            }
        }
        Ok(files)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() || path.has_root() {
            path.to_path_buf()
        } else if path.as_os_str().is_empty() {
            self.base_dir.clone()
        } else {
            self.base_dir.join(path)
        }
    }
}

fn has_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?'])
}

/// Byte offset at which the first segment containing a wildcard starts.
fn first_wildcard_offset(pattern: &str) -> Option<usize> {
    let mut offset = 0;
    for segment in pattern.split('/') {
        if has_wildcard(segment) {
            return Some(offset);
        }
        offset += segment.len() + 1;
    }
    None
}

/// Compile the segments after the walk root into one glob pattern.
/// Only `*`, `?` and `**` are special; brackets match themselves.
fn segments_pattern(segments: &[&str]) -> Result<Pattern> {
    let escaped: Vec<String> = segments
        .iter()
        .map(|segment| {
            segment
                .chars()
                .map(|c| match c {
                    '[' => "[[]".to_string(),
                    ']' => "[]]".to_string(),
                    c => c.to_string(),
                })
                .collect()
        })
        .collect();
    let joined = escaped.join("/");
    Pattern::new(&joined).map_err(|e| {
        CovmergeError::WildcardPattern(format!("'{}': {}", segments.join("/"), e.msg))
    })
}
