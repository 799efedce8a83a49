//! A small import-inlining stylesheet engine.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! `InlineEngine` understands the parts of LESS that matter for import
//! resolution and asset rebasing:
//!
//! - `@import` statements with options (`css`, `less`, `reference`,
//!   `multiple`, `once`, `optional`) and media queries
//! - variable declarations and `@name` / `@{name}` references; variables are
//!   global, the last definition wins
//! - `~"..."` escapes
//! - relative `url()` rebasing by rootpath and `data-uri()` inlining
//! - `compress` whitespace collapsing and line number annotations
//!
//! Everything else (nesting, mixins, operations, functions, guards) passes
//! through to the output unchanged.

mod parser;
mod render;
mod urls;

use crate::diagnostic::RawFailure;
use crate::engine::{Environment, ImportHook, Rendered, StylesheetEngine};
use crate::options::CompilationOptions;

/// Default extension appended to extensionless import paths.
pub const DEFAULT_EXTENSION: &str = "less";

/// Parsed form of one stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stylesheet {
    pub filename: String,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Verbatim CSS text. `line` is set for text that starts a top-level
    /// statement.
    Css { text: String, line: Option<usize> },
    /// A variable declaration, removed from the output.
    Variable { name: String, value: String },
    /// A plain CSS `@import`, hoisted to the top of the output.
    CssImport(String),
    /// An inlined stylesheet.
    Import {
        sheet: Stylesheet,
        media: Option<String>,
        /// Contributes variables but no output
        reference: bool,
    },
}

/// The built-in stylesheet engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineEngine {
    extension: String,
}

impl Default for InlineEngine {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl InlineEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `extension` (without the dot) for extensionless imports.
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl StylesheetEngine for InlineEngine {
    type Tree = Stylesheet;

    fn parse(
        &self,
        source: &str,
        env: &Environment<'_>,
        hook: &mut dyn ImportHook<Stylesheet>,
    ) -> Result<Stylesheet, RawFailure> {
        parser::parse(self, source, env, hook)
    }

    fn render(
        &self,
        tree: &Stylesheet,
        options: &CompilationOptions,
    ) -> Result<Rendered, RawFailure> {
        render::render(tree, options)
    }
}
