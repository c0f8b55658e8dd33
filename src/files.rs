//! Maps paths recorded inside coverage reports onto files indexed by the
//! current analysis.
//!
//! A recorded path is usable as-is when it is absolute and names an indexed
//! file of the expected language (compared case-insensitively, with either
//! separator). Paths produced by builds with deterministic source paths
//! (`/_/src/Foo.cs`) are instead resolved by matching their trailing
//! components against the index; ambiguous matches are never guessed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::error::{CovmergeError, Result};

/// Leading `/_/` or `/_1/` segment used by deterministic builds.
static DETERMINISTIC_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[/\\]_\d*[/\\]").unwrap());

/// Windows drive-letter root such as `C:\`.
static DRIVE_ROOT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z]:[/\\]").unwrap());

/// Language keys known to the built-in index and their file extensions.
pub const LANGUAGES: &[(&str, &str)] = &[("cs", "cs"), ("vbnet", "vb")];

/// A source file known to the analysis, with its language key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    pub path: PathBuf,
    pub language: String,
}

/// The set of files the host analysis has indexed.
pub trait SourceIndex {
    /// Paths of every indexed file carrying `language`.
    fn files_with_language(&self, language: &str) -> Vec<&Path>;
}

/// In-memory source index.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    files: Vec<IndexedFile>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<PathBuf>, language: &str) {
        self.files.push(IndexedFile {
            path: path.into(),
            language: language.to_string(),
        });
    }

    /// Walk `root` and index every file whose extension maps to a known
    /// language.
    pub fn scan(root: &Path) -> Result<Self> {
        let root = std::path::absolute(root).map_err(|e| CovmergeError::io(root, e))?;
        let mut index = FileIndex::new();
        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&root).to_path_buf();
                CovmergeError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(language) = language_of(entry.path()) {
                index.add(entry.path(), language);
            }
        }
        log::debug!("Indexed {} source files under '{}'", index.len(), root.display());
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl SourceIndex for FileIndex {
    fn files_with_language(&self, language: &str) -> Vec<&Path> {
        self.files
            .iter()
            .filter(|f| f.language == language)
            .map(|f| f.path.as_path())
            .collect()
    }
}

/// Language key for a source file, based on its extension.
pub fn language_of(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    LANGUAGES
        .iter()
        .find(|(_, e)| *e == ext)
        .map(|(language, _)| *language)
}

/// Path resolution against a snapshot of the indexed files of one language.
#[derive(Debug, Clone)]
pub struct FileService {
    language: String,
    by_key: HashMap<String, PathBuf>,
    by_components: Vec<(Vec<String>, PathBuf)>,
}

impl FileService {
    pub fn new(index: &dyn SourceIndex, language: &str) -> Self {
        let mut by_key = HashMap::new();
        let mut by_components = Vec::new();
        for path in index.files_with_language(language) {
            let key = normalize(&path.to_string_lossy());
            by_components.push((components(&key), path.to_path_buf()));
            by_key.insert(key, path.to_path_buf());
        }
        Self {
            language: language.to_string(),
            by_key,
            by_components,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// True when `path`, taken as absolute, is an indexed file of our language.
    pub fn is_supported_absolute(&self, path: &str) -> bool {
        self.indexed(path).is_some()
    }

    /// True when `path` starts with a deterministic source path sentinel.
    pub fn is_deterministic_source_path(path: &str) -> bool {
        DETERMINISTIC_PREFIX.is_match(path)
    }

    /// Resolve `raw` by matching its trailing components against the index.
    /// Returns `None` when nothing or more than one file matches.
    pub fn absolute_path(&self, raw: &str) -> Option<PathBuf> {
        let stripped = DETERMINISTIC_PREFIX.replace(raw, "");
        let target = components(&normalize(&stripped));
        if target.is_empty() {
            log::debug!("Cannot resolve empty path '{raw}'");
            return None;
        }

        let matches: Vec<&PathBuf> = self
            .by_components
            .iter()
            .filter(|(components, _)| components.ends_with(&target))
            .map(|(_, path)| path)
            .collect();

        match matches.as_slice() {
            [] => {
                log::debug!("Did not find any indexed file matching '{raw}'");
                None
            }
            [single] => {
                log::debug!("Resolved '{raw}' to '{}'", single.display());
                Some((*single).clone())
            }
            _ => {
                log::debug!(
                    "Found {} indexed files matching '{raw}'; skipping this coverage entry",
                    matches.len()
                );
                None
            }
        }
    }

    /// The indexed file a recorded report path refers to, if any.
    pub fn resolve(&self, raw: &str) -> Option<PathBuf> {
        if let Some(path) = self.indexed(raw) {
            return Some(path.to_path_buf());
        }
        if Self::is_deterministic_source_path(raw) {
            return self.absolute_path(raw);
        }
        log::debug!(
            "Skipping '{raw}': not indexed or not a '{}' file",
            self.language
        );
        None
    }

    fn indexed(&self, path: &str) -> Option<&Path> {
        if !is_absolute(path) {
            return None;
        }
        self.by_key.get(&normalize(path)).map(PathBuf::as_path)
    }
}

fn is_absolute(path: &str) -> bool {
    Path::new(path).is_absolute()
        || path.starts_with('/')
        || path.starts_with('\\')
        || DRIVE_ROOT.is_match(path)
}

/// Lowercase and use `/` separators, so lookups ignore case and OS.
fn normalize(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

fn components(normalized: &str) -> Vec<String> {
    normalized
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(paths: &[&str]) -> FileService {
        let mut index = FileIndex::new();
        for path in paths {
            index.add(*path, "cs");
        }
        index.add("/project/src/Other.vb", "vbnet");
        FileService::new(&index, "cs")
    }

    #[test]
    fn test_supported_absolute_ignores_case_and_separator() {
        let files = service(&["/project/src/Foo.cs"]);
        assert!(files.is_supported_absolute("/project/src/Foo.cs"));
        assert!(files.is_supported_absolute("/PROJECT/src/foo.CS"));
        assert!(files.is_supported_absolute("\\project\\src\\Foo.cs"));
        assert!(!files.is_supported_absolute("project/src/Foo.cs"));
        assert!(!files.is_supported_absolute("/project/src/Bar.cs"));
    }

    #[test]
    fn test_other_language_is_not_supported() {
        let files = service(&["/project/src/Foo.cs"]);
        assert!(!files.is_supported_absolute("/project/src/Other.vb"));
    }

    #[test]
    fn test_resolve_returns_indexed_casing() {
        let files = service(&["/project/src/Foo.cs"]);
        assert_eq!(
            files.resolve("/project/SRC/foo.cs"),
            Some(PathBuf::from("/project/src/Foo.cs"))
        );
    }

    #[test]
    fn test_deterministic_prefix_detection() {
        assert!(FileService::is_deterministic_source_path("/_/src/Foo.cs"));
        assert!(FileService::is_deterministic_source_path("/_1/src/Foo.cs"));
        assert!(FileService::is_deterministic_source_path("\\_\\src\\Foo.cs"));
        assert!(!FileService::is_deterministic_source_path("/src/_/Foo.cs"));
        assert!(!FileService::is_deterministic_source_path("/_x/Foo.cs"));
    }

    #[test]
    fn test_deterministic_path_resolves_single_match() {
        let files = service(&["/work/project/src/Foo.cs", "/work/project/src/Bar.cs"]);
        assert_eq!(
            files.resolve("/_/src/Foo.cs"),
            Some(PathBuf::from("/work/project/src/Foo.cs"))
        );
    }

    #[test]
    fn test_suffix_match_is_component_wise() {
        let files = service(&["/work/project/src/MyFoo.cs"]);
        assert_eq!(files.absolute_path("/_/Foo.cs"), None);
    }

    #[test]
    fn test_ambiguous_match_is_unresolved() {
        let files = service(&["/work/a/src/Foo.cs", "/work/b/src/Foo.cs"]);
        assert_eq!(files.absolute_path("/_/src/Foo.cs"), None);
        assert_eq!(
            files.absolute_path("/_/a/src/Foo.cs"),
            Some(PathBuf::from("/work/a/src/Foo.cs"))
        );
    }

    #[test]
    fn test_no_match_is_unresolved() {
        let files = service(&["/work/project/src/Foo.cs"]);
        assert_eq!(files.absolute_path("/_/src/Missing.cs"), None);
        assert_eq!(files.absolute_path("/_/"), None);
    }

    #[test]
    fn test_relative_non_deterministic_path_is_skipped() {
        let files = service(&["/work/project/src/Foo.cs"]);
        assert_eq!(files.resolve("src/Foo.cs"), None);
    }

    #[test]
    fn test_language_of() {
        assert_eq!(language_of(Path::new("Foo.cs")), Some("cs"));
        assert_eq!(language_of(Path::new("Foo.VB")), Some("vbnet"));
        assert_eq!(language_of(Path::new("Foo.txt")), None);
    }

    #[test]
    fn test_scan_indexes_known_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/sub")).unwrap();
        std::fs::write(dir.path().join("src/Foo.cs"), "").unwrap();
        std::fs::write(dir.path().join("src/sub/Bar.vb"), "").unwrap();
        std::fs::write(dir.path().join("src/readme.md"), "").unwrap();

        let index = FileIndex::scan(dir.path()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.files_with_language("cs").len(), 1);
        assert_eq!(index.files_with_language("vbnet").len(), 1);
    }
}
