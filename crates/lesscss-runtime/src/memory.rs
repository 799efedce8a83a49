//! In-memory file reader.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Serves stylesheets from a map keyed by normalized location. Useful for
//! embedding stylesheets in a binary and for tests.

use std::collections::HashMap;

use crate::path;
use crate::traits::{FileReader, ReaderResult};

/// A reader over an in-memory set of files.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryReader {
    /// Create an empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file and return the reader (builder style).
    pub fn with_file(mut self, location: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(location, contents);
        self
    }

    /// Add or replace a file.
    pub fn insert(&mut self, location: &str, contents: impl Into<Vec<u8>>) {
        self.files.insert(path::normalize(location), contents.into());
    }

    /// Number of files held.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the reader holds no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileReader for MemoryReader {
    fn read_bytes(&self, location: &str) -> ReaderResult<Option<Vec<u8>>> {
        Ok(self.files.get(&path::normalize(location)).cloned())
    }
}
