/*
 * traits.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Defines the FileReader trait and its error type.
 *
 * A FileReader answers "give me the content at this location" for the
 * import loader. Absence is a normal answer (`Ok(None)`), not an error.
 */

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Result type for reader operations
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Errors that can occur while reading a stylesheet resource
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Underlying I/O failure for a location that exists
    #[error("I/O error while reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The resource exists but is not valid UTF-8
    #[error("'{path}' is not valid UTF-8")]
    InvalidUtf8 { path: String },
}

/// Trait defining how stylesheet sources and binary assets are located.
///
/// Locations are plain `/`-separated strings as produced by the file
/// context resolver; implementations decide how to map them onto storage.
///
/// # Absence vs. failure
///
/// `Ok(None)` means "not found". `Err(_)` means the location could not be
/// read for another reason. The compile orchestrator treats both the same
/// way (an import-not-found diagnostic), but readers should still report
/// the difference so it can be logged.
pub trait FileReader: Send + Sync {
    /// Read the raw bytes at `path`.
    ///
    /// Used for binary assets such as images inlined with `data-uri()`.
    fn read_bytes(&self, path: &str) -> ReaderResult<Option<Vec<u8>>>;

    /// Read the content at `path` as UTF-8 text.
    ///
    /// Default implementation reads bytes and converts to string.
    fn read(&self, path: &str) -> ReaderResult<Option<String>> {
        match self.read_bytes(path)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| ReaderError::InvalidUtf8 {
                    path: path.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Normalize a location into the canonical form used as an identity key.
    ///
    /// Default implementation collapses `.` and `..` segments.
    fn normalize(&self, path: &str) -> String {
        crate::path::normalize(path)
    }
}

impl<T: FileReader + ?Sized> FileReader for &T {
    fn read_bytes(&self, path: &str) -> ReaderResult<Option<Vec<u8>>> {
        (**self).read_bytes(path)
    }

    fn read(&self, path: &str) -> ReaderResult<Option<String>> {
        (**self).read(path)
    }

    fn normalize(&self, path: &str) -> String {
        (**self).normalize(path)
    }
}

impl<T: FileReader + ?Sized> FileReader for Box<T> {
    fn read_bytes(&self, path: &str) -> ReaderResult<Option<Vec<u8>>> {
        (**self).read_bytes(path)
    }

    fn read(&self, path: &str) -> ReaderResult<Option<String>> {
        (**self).read(path)
    }

    fn normalize(&self, path: &str) -> String {
        (**self).normalize(path)
    }
}

impl<T: FileReader + ?Sized> FileReader for Arc<T> {
    fn read_bytes(&self, path: &str) -> ReaderResult<Option<Vec<u8>>> {
        (**self).read_bytes(path)
    }

    fn read(&self, path: &str) -> ReaderResult<Option<String>> {
        (**self).read(path)
    }

    fn normalize(&self, path: &str) -> String {
        (**self).normalize(path)
    }
}
