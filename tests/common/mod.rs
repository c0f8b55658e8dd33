#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use covmerge::files::{FileIndex, FileService};

/// Path of a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// A C# file service over the given (virtual) source paths.
pub fn file_service(paths: &[&str]) -> FileService {
    let mut index = FileIndex::new();
    for path in paths {
        index.add(*path, "cs");
    }
    FileService::new(&index, "cs")
}

/// Write `content` to `dir/relative`, creating parent directories.
pub fn write(dir: &Path, relative: &str, content: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}
