/*
 * tracking.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Reader decorators.
 *
 * - CombiningReader: delegates to a list of readers, first hit wins
 * - TrackingReader: wraps any reader and records the locations it served
 */

use std::sync::Mutex;

use crate::traits::{FileReader, ReaderResult};

/// A reader that delegates to several readers and returns the first hit.
pub struct CombiningReader {
    readers: Vec<Box<dyn FileReader>>,
}

impl CombiningReader {
    /// Create a combining reader. Readers are consulted in the given order.
    pub fn new(readers: Vec<Box<dyn FileReader>>) -> Self {
        Self { readers }
    }

    /// Append another reader (lowest priority).
    pub fn push(&mut self, reader: impl FileReader + 'static) {
        self.readers.push(Box::new(reader));
    }
}

impl std::fmt::Debug for CombiningReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombiningReader")
            .field("readers", &self.readers.len())
            .finish()
    }
}

impl FileReader for CombiningReader {
    fn read_bytes(&self, path: &str) -> ReaderResult<Option<Vec<u8>>> {
        for reader in &self.readers {
            if let Some(bytes) = reader.read_bytes(path)? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }

    fn read(&self, path: &str) -> ReaderResult<Option<String>> {
        for reader in &self.readers {
            if let Some(content) = reader.read(path)? {
                return Ok(Some(content));
            }
        }
        Ok(None)
    }
}

/// A reader that records every location it successfully served.
///
/// Locations are recorded in normalized form, once each, in first-read
/// order. The compile orchestrator uses this to report the dependency set of
/// a compilation.
pub struct TrackingReader<R> {
    inner: R,
    imports: Mutex<Vec<String>>,
}

impl<R: FileReader> TrackingReader<R> {
    /// Wrap `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            imports: Mutex::new(Vec::new()),
        }
    }

    /// Locations served so far.
    pub fn imports(&self) -> Vec<String> {
        self.imports
            .lock()
            .map(|imports| imports.clone())
            .unwrap_or_default()
    }

    /// Consume the tracker, returning the recorded locations.
    pub fn into_imports(self) -> Vec<String> {
        self.imports.into_inner().unwrap_or_default()
    }

    fn record(&self, path: &str) {
        let normalized = self.inner.normalize(path);
        if let Ok(mut imports) = self.imports.lock() {
            if !imports.contains(&normalized) {
                imports.push(normalized);
            }
        }
    }
}

impl<R: FileReader> FileReader for TrackingReader<R> {
    fn read_bytes(&self, path: &str) -> ReaderResult<Option<Vec<u8>>> {
        tracing::debug!(path, "reading resource bytes");
        let result = self.inner.read_bytes(path)?;
        if result.is_some() {
            self.record(path);
        }
        Ok(result)
    }

    fn read(&self, path: &str) -> ReaderResult<Option<String>> {
        tracing::debug!(path, "reading @import");
        let result = self.inner.read(path)?;
        if result.is_some() {
            self.record(path);
        }
        Ok(result)
    }

    fn normalize(&self, path: &str) -> String {
        self.inner.normalize(path)
    }
}
