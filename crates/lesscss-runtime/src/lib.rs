/*
 * lesscss-runtime
 * Copyright (c) 2025 Posit, PBC
 *
 * Collaborators used by the lesscss compile orchestrator.
 *
 * This crate provides a trait-based abstraction for the file access a
 * stylesheet compilation needs, so the orchestrator never touches the
 * filesystem directly:
 *
 * - FileSystemReader: resolves locations against one or more base directories
 * - MemoryReader: serves stylesheets from an in-memory map
 * - CombiningReader: tries several readers in order
 * - TrackingReader: records every location read (decorator pattern)
 *
 * It also hosts the CSS minifier used for the `minify` option.
 */

mod memory;
mod minify;
mod native;
pub mod path;
mod tracking;
mod traits;

pub use traits::{FileReader, ReaderError, ReaderResult};

pub use memory::MemoryReader;
pub use native::FileSystemReader;
pub use tracking::{CombiningReader, TrackingReader};

pub use minify::{GrassMinifier, Minifier, MinifyError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_reader_behind_trait_object() {
        let reader = MemoryReader::new().with_file("a.less", "#a { color: red; }");
        let dyn_reader: &dyn FileReader = &reader;

        assert_eq!(
            dyn_reader.read("a.less").unwrap().as_deref(),
            Some("#a { color: red; }")
        );
        assert_eq!(dyn_reader.read("b.less").unwrap(), None);
    }

    #[test]
    fn test_tracking_reader_over_combining_reader() {
        let first = MemoryReader::new().with_file("a.less", "a");
        let second = MemoryReader::new().with_file("b.less", "b");
        let combined = CombiningReader::new(vec![Box::new(first), Box::new(second)]);
        let tracking = TrackingReader::new(combined);

        assert!(tracking.read("b.less").unwrap().is_some());
        assert!(tracking.read("c.less").unwrap().is_none());
        assert_eq!(tracking.imports(), vec!["b.less".to_string()]);
    }
}
