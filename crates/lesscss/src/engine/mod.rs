//! The stylesheet engine seam.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! The compile orchestrator does not parse stylesheets itself. It drives a
//! [`StylesheetEngine`], which parses one file at a time and asks the
//! orchestrator for each `@import` it meets through an [`ImportHook`]. The
//! hook answers synchronously with the parsed tree of the imported file (or
//! a diagnostic), so the whole import graph is evaluated depth-first on one
//! call stack.

pub mod inline;

use lesscss_runtime::FileReader;

use crate::context::FileContext;
use crate::diagnostic::{CompileDiagnostic, RawFailure};
use crate::options::CompilationOptions;

pub use inline::InlineEngine;

/// Everything an engine needs to parse one file.
pub struct Environment<'a> {
    options: &'a CompilationOptions,
    context: FileContext,
    reader: &'a dyn FileReader,
}

impl<'a> Environment<'a> {
    pub fn new(
        options: &'a CompilationOptions,
        context: FileContext,
        reader: &'a dyn FileReader,
    ) -> Self {
        Self {
            options,
            context,
            reader,
        }
    }

    pub fn options(&self) -> &CompilationOptions {
        self.options
    }

    /// Context of the file being parsed.
    pub fn context(&self) -> &FileContext {
        &self.context
    }

    /// Read a binary resource referenced from the current file.
    ///
    /// `path` is resolved against the current directory. Reader failures are
    /// reported as absent.
    pub fn read_bytes(&self, path: &str) -> Option<Vec<u8>> {
        let href = self.context.resolve(path);
        match self.reader.read_bytes(&href) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(path = %href, error = %e, "resource read failed");
                None
            }
        }
    }
}

/// A single `@import` request raised by an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    /// Path as declared, with any extension the engine adds
    pub path: String,
    /// Line of the import statement in the importing file
    pub line: Option<usize>,
    /// Skip the import if the file was already imported
    pub once: bool,
    /// A missing file is skipped instead of failing the compilation
    pub optional: bool,
}

impl ImportRequest {
    /// A default request: imported once, required.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line: None,
            once: true,
            optional: false,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Import the file again even if it was already imported.
    pub fn multiple(mut self) -> Self {
        self.once = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// The answer to an [`ImportRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome<T> {
    /// The file was loaded and parsed.
    Imported { filename: String, tree: T },
    /// Nothing to include: already imported, or optional and missing.
    Skipped,
}

/// Import resolution exposed to engines, implemented by the orchestrator.
pub trait ImportHook<T> {
    /// Load and parse the file named by `request`, relative to `current`.
    ///
    /// An error aborts the whole compilation; engines should return it
    /// unchanged as [`RawFailure::Aborted`].
    fn resolve_import(
        &mut self,
        request: &ImportRequest,
        current: &FileContext,
    ) -> Result<ImportOutcome<T>, CompileDiagnostic>;
}

/// Output of a successful render.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rendered {
    pub css: String,
    pub source_map: Option<String>,
}

/// A stylesheet parser and renderer.
///
/// One engine instance can serve any number of sequential compilations; it
/// keeps no state between calls.
pub trait StylesheetEngine {
    /// Parsed form of one stylesheet, including its inlined imports.
    type Tree;

    /// Parse `source`, calling `hook` for each import.
    fn parse(
        &self,
        source: &str,
        env: &Environment<'_>,
        hook: &mut dyn ImportHook<Self::Tree>,
    ) -> Result<Self::Tree, RawFailure>;

    /// Render a parsed tree to CSS.
    fn render(
        &self,
        tree: &Self::Tree,
        options: &CompilationOptions,
    ) -> Result<Rendered, RawFailure>;
}
