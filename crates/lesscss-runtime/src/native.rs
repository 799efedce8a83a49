/*
 * native.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * FileSystemReader: reads stylesheet locations from the local filesystem.
 *
 * Relative locations are tried against each base directory in order; if none
 * matches, the location is tried as-is (relative to the process working
 * directory, or absolute).
 */

use std::io;
use std::path::{Path, PathBuf};

use crate::traits::{FileReader, ReaderError, ReaderResult};

/// Reader backed by `std::fs`, resolving locations against base directories.
#[derive(Debug, Clone)]
pub struct FileSystemReader {
    base_dirs: Vec<PathBuf>,
}

impl FileSystemReader {
    /// Create a reader resolving against a single base directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dirs: vec![base_dir.into()],
        }
    }

    /// Create a reader resolving against several base directories, in order.
    pub fn with_base_dirs(base_dirs: Vec<PathBuf>) -> Self {
        Self { base_dirs }
    }

    /// Create a reader resolving against the process working directory.
    pub fn current_dir() -> Self {
        Self::new(".")
    }

    /// The directories used to resolve relative locations.
    pub fn base_dirs(&self) -> &[PathBuf] {
        &self.base_dirs
    }

    fn resolve(&self, location: &str) -> Option<PathBuf> {
        if location.is_empty() {
            return None;
        }
        let relative = location.trim_start_matches(['/', '\\']);
        for dir in &self.base_dirs {
            let candidate = dir.join(relative);
            tracing::trace!(location, dir = %dir.display(), "resolving relative to base dir");
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        let direct = Path::new(location);
        direct.is_file().then(|| direct.to_path_buf())
    }
}

impl Default for FileSystemReader {
    fn default() -> Self {
        Self::current_dir()
    }
}

impl FileReader for FileSystemReader {
    fn read_bytes(&self, path: &str) -> ReaderResult<Option<Vec<u8>>> {
        let Some(file) = self.resolve(path) else {
            return Ok(None);
        };
        match std::fs::read(&file) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ReaderError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_relative_to_base_dir() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp.path().join("mixins")).unwrap();
        std::fs::write(temp.path().join("mixins/a.less"), "#a { color: red; }").unwrap();

        let reader = FileSystemReader::new(temp.path());

        assert_eq!(
            reader.read("mixins/a.less").unwrap().as_deref(),
            Some("#a { color: red; }")
        );
        assert_eq!(reader.read("mixins/missing.less").unwrap(), None);
    }

    #[test]
    fn test_tries_base_dirs_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join("a.less"), "first").unwrap();
        std::fs::write(second.path().join("a.less"), "second").unwrap();
        std::fs::write(second.path().join("b.less"), "only-second").unwrap();

        let reader = FileSystemReader::with_base_dirs(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);

        assert_eq!(reader.read("a.less").unwrap().as_deref(), Some("first"));
        assert_eq!(reader.read("b.less").unwrap().as_deref(), Some("only-second"));
    }

    #[test]
    fn test_falls_back_to_absolute_location() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("abs.less");
        std::fs::write(&file, "abs").unwrap();

        let reader = FileSystemReader::new("/nonexistent-base-dir");
        let location = file.to_string_lossy().to_string();

        assert_eq!(reader.read(&location).unwrap().as_deref(), Some("abs"));
    }

    #[test]
    fn test_empty_location_is_absent() {
        let reader = FileSystemReader::current_dir();
        assert_eq!(reader.read("").unwrap(), None);
    }

    #[test]
    fn test_directories_are_not_files() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp.path().join("dir.less")).unwrap();

        let reader = FileSystemReader::new(temp.path());
        assert_eq!(reader.read_bytes("dir.less").unwrap(), None);
    }
}
