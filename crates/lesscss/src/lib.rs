//! LESS stylesheet import resolution and compilation orchestration.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! This crate provides:
//! - Options translation from typed or loosely-typed JSON options
//! - Per-file contexts for resolving nested imports and rebasing URLs
//! - The import loader and the compile orchestrator
//! - A unified diagnostic for every kind of failure
//! - The `StylesheetEngine` seam and a built-in engine
//!
//! File access goes through the `FileReader` trait from `lesscss-runtime`,
//! re-exported here.

pub mod compile;
pub mod context;
pub mod diagnostic;
pub mod engine;
pub mod loader;
pub mod options;

pub use compile::{CompileResult, Compiler, compile};
pub use context::FileContext;
pub use diagnostic::{CompileDiagnostic, DiagnosticKind, ParseFailure, RawFailure};
pub use engine::{
    Environment, ImportHook, ImportOutcome, ImportRequest, InlineEngine, Rendered, StylesheetEngine,
};
pub use loader::{LoadedImport, load};
pub use options::{CompilationOptions, LineNumbers, Options, OptionsSource};

pub use lesscss_runtime::path;
pub use lesscss_runtime::{
    CombiningReader, FileReader, FileSystemReader, GrassMinifier, MemoryReader, Minifier,
    MinifyError, ReaderError, ReaderResult, TrackingReader,
};
