//! Compile orchestration.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! This module drives one compilation from source text to CSS:
//!
//! 1. Normalize the caller's options (done by [`OptionsSource`])
//! 2. Build the root [`FileContext`]
//! 3. Parse the source with the engine; each `@import` the engine meets is
//!    loaded (done by [`crate::loader`]) and parsed recursively, depth-first
//! 4. Render the tree, unless only dependencies were requested
//! 5. Minify, if requested
//!
//! The first failure anywhere in the import tree aborts the compilation and
//! becomes the result's only diagnostic.
//!
//! # Example
//!
//! ```rust
//! use lesscss::{MemoryReader, Options, compile};
//!
//! let reader = MemoryReader::new().with_file("a.less", "#y { color: blue; }");
//! let result = compile(
//!     "@import \"a\";\n#x { color: red; }",
//!     &Options::default(),
//!     "main.less",
//!     &reader,
//! );
//!
//! assert_eq!(result.css.as_deref(), Some("#y { color: blue; }\n#x { color: red; }\n"));
//! assert_eq!(result.imports, vec!["a.less".to_string()]);
//! ```

use std::collections::HashSet;

use lesscss_runtime::{FileReader, GrassMinifier, Minifier, TrackingReader};

use crate::context::FileContext;
use crate::diagnostic::{CompileDiagnostic, DiagnosticKind, RawFailure, format};
use crate::engine::{
    Environment, ImportHook, ImportOutcome, ImportRequest, InlineEngine, Rendered, StylesheetEngine,
};
use crate::loader;
use crate::options::{CompilationOptions, OptionsSource};

/// The outcome of one compilation.
///
/// Exactly one of `css` and `diagnostic` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileResult {
    /// Generated CSS; empty when only dependencies were requested
    pub css: Option<String>,
    pub source_map: Option<String>,
    pub diagnostic: Option<CompileDiagnostic>,
    /// Distinct normalized paths read through the file reader, in first-read
    /// order. Populated on failure too, up to the point of failure.
    pub imports: Vec<String>,
}

impl CompileResult {
    fn success(rendered: Rendered, imports: Vec<String>) -> Self {
        Self {
            css: Some(rendered.css),
            source_map: rendered.source_map,
            diagnostic: None,
            imports,
        }
    }

    fn failure(diagnostic: CompileDiagnostic, imports: Vec<String>) -> Self {
        Self {
            css: None,
            source_map: None,
            diagnostic: Some(diagnostic),
            imports,
        }
    }

    pub fn is_success(&self) -> bool {
        self.diagnostic.is_none()
    }

    /// The CSS, or the diagnostic as an error.
    pub fn into_result(self) -> Result<String, CompileDiagnostic> {
        match self.diagnostic {
            Some(diagnostic) => Err(diagnostic),
            None => Ok(self.css.unwrap_or_default()),
        }
    }
}

/// A stylesheet compiler: an engine plus a minifier.
///
/// A compiler keeps no state between calls, so one instance can run any
/// number of sequential compilations.
pub struct Compiler<E = InlineEngine> {
    engine: E,
    minifier: Box<dyn Minifier>,
}

impl Default for Compiler<InlineEngine> {
    fn default() -> Self {
        Self::with_engine(InlineEngine::default())
    }
}

impl Compiler<InlineEngine> {
    /// A compiler using the built-in engine and the grass minifier.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E: StylesheetEngine> Compiler<E> {
    /// A compiler using `engine` and the grass minifier.
    pub fn with_engine(engine: E) -> Self {
        Self {
            engine,
            minifier: Box::new(GrassMinifier),
        }
    }

    /// Replace the minifier used for the `minify` option.
    pub fn minifier(mut self, minifier: impl Minifier + 'static) -> Self {
        self.minifier = Box::new(minifier);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Compile `source`.
    ///
    /// # Arguments
    ///
    /// * `source` - Stylesheet text of the entry file
    /// * `options` - Any options representation; see [`OptionsSource`]
    /// * `source_name` - Path of the entry file, used to resolve its imports
    /// * `reader` - Where imported files and `data-uri()` resources come from
    ///
    /// # Returns
    ///
    /// A [`CompileResult`]. Failures are reported in its `diagnostic` field,
    /// never as a panic.
    pub fn compile(
        &self,
        source: &str,
        options: &impl OptionsSource,
        source_name: &str,
        reader: &dyn FileReader,
    ) -> CompileResult {
        let options = options.to_compilation_options(source_name);
        let reader = TrackingReader::new(reader);

        let outcome = self.run(source, &options, &reader);
        let imports = reader.into_imports();

        match outcome {
            Ok(rendered) => {
                tracing::debug!(
                    file = %options.source_filename,
                    imports = imports.len(),
                    "compiled stylesheet"
                );
                CompileResult::success(rendered, imports)
            }
            Err(diagnostic) => {
                tracing::debug!(
                    file = %options.source_filename,
                    kind = ?diagnostic.kind,
                    message = %diagnostic.message,
                    "compilation failed"
                );
                CompileResult::failure(diagnostic, imports)
            }
        }
    }

    fn run(
        &self,
        source: &str,
        options: &CompilationOptions,
        reader: &dyn FileReader,
    ) -> Result<Rendered, CompileDiagnostic> {
        let root = FileContext::root(options);
        tracing::debug!(file = %root.filename(), "compiling stylesheet");

        let mut resolver = ImportResolver::new(&self.engine, options, reader, &root);
        let env = Environment::new(options, root, reader);
        let tree = self
            .engine
            .parse(source, &env, &mut resolver)
            .map_err(format)?;

        if options.dependencies_only {
            return Ok(Rendered::default());
        }

        let mut rendered = self.engine.render(&tree, options).map_err(format)?;
        if options.minify {
            rendered.css = self.minifier.minify(&rendered.css).map_err(|e| {
                format(RawFailure::Minify {
                    message: e.to_string(),
                })
            })?;
        }
        Ok(rendered)
    }
}

/// Compile `source` with the built-in engine.
///
/// See [`Compiler::compile`].
pub fn compile(
    source: &str,
    options: &impl OptionsSource,
    source_name: &str,
    reader: &dyn FileReader,
) -> CompileResult {
    Compiler::default().compile(source, options, source_name, reader)
}

/// Services the engine's import requests for one compilation.
struct ImportResolver<'a, E> {
    engine: &'a E,
    options: &'a CompilationOptions,
    reader: &'a dyn FileReader,
    /// Files being parsed, outermost first
    in_progress: Vec<String>,
    imported: HashSet<String>,
}

impl<'a, E: StylesheetEngine> ImportResolver<'a, E> {
    fn new(
        engine: &'a E,
        options: &'a CompilationOptions,
        reader: &'a dyn FileReader,
        root: &FileContext,
    ) -> Self {
        let root_key = reader.normalize(root.filename());
        Self {
            engine,
            options,
            reader,
            in_progress: vec![root_key.clone()],
            imported: HashSet::from([root_key]),
        }
    }

    /// Decide whether `key` may be loaded: `Err` for a cycle, `Some(Skipped)`
    /// for a repeated import-once request, `None` to go ahead.
    fn admit(
        &self,
        key: &str,
        request: &ImportRequest,
        current: &FileContext,
    ) -> Result<Option<ImportOutcome<E::Tree>>, CompileDiagnostic> {
        if let Some(start) = self.in_progress.iter().position(|p| p == key) {
            let mut chain = self.in_progress[start..].to_vec();
            chain.push(key.to_string());
            return Err(format(RawFailure::Cycle {
                chain,
                filename: Some(current.filename().to_string()),
                line: request.line,
            }));
        }
        if request.once && self.imported.contains(key) {
            tracing::debug!(path = %key, "skipping already imported file");
            return Ok(Some(ImportOutcome::Skipped));
        }
        Ok(None)
    }
}

impl<E: StylesheetEngine> ImportHook<E::Tree> for ImportResolver<'_, E> {
    fn resolve_import(
        &mut self,
        request: &ImportRequest,
        current: &FileContext,
    ) -> Result<ImportOutcome<E::Tree>, CompileDiagnostic> {
        let direct_key = self.reader.normalize(&current.resolve(&request.path));
        if let Some(outcome) = self.admit(&direct_key, request, current)? {
            return Ok(outcome);
        }

        let loaded = match loader::load_request(current, request, self.reader) {
            Ok(loaded) => loaded,
            Err(diagnostic)
                if request.optional && diagnostic.kind == DiagnosticKind::ImportNotFound =>
            {
                tracing::debug!(path = %request.path, "skipping missing optional import");
                return Ok(ImportOutcome::Skipped);
            }
            Err(diagnostic) => return Err(diagnostic),
        };

        let key = self.reader.normalize(loaded.context.filename());
        if key != direct_key {
            if let Some(outcome) = self.admit(&key, request, current)? {
                return Ok(outcome);
            }
        }

        tracing::debug!(path = %key, from = %current.filename(), "importing");
        self.imported.insert(key.clone());
        self.in_progress.push(key);

        let engine = self.engine;
        let env = Environment::new(self.options, loaded.context.clone(), self.reader);
        let parsed = engine.parse(&loaded.content, &env, self);
        self.in_progress.pop();

        Ok(ImportOutcome::Imported {
            filename: loaded.context.filename().to_string(),
            tree: parsed.map_err(format)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use lesscss_runtime::{MemoryReader, MinifyError};

    struct RejectingMinifier;

    impl Minifier for RejectingMinifier {
        fn minify(&self, _css: &str) -> Result<String, MinifyError> {
            Err(MinifyError::Grass("unexpected end of input".to_string()))
        }
    }

    #[test]
    fn test_nested_imports_resolve_relative_to_importer() {
        let reader = MemoryReader::new()
            .with_file("css/parts/a.less", "@import \"b\";\n#a { color: red; }")
            .with_file("css/parts/b.less", "#b { color: blue; }");

        let result = compile(
            "@import \"parts/a\";",
            &Options::default(),
            "css/main.less",
            &reader,
        );

        assert_eq!(
            result.css.as_deref(),
            Some("#b { color: blue; }\n#a { color: red; }\n")
        );
        assert_eq!(
            result.imports,
            vec![
                "css/parts/a.less".to_string(),
                "css/parts/b.less".to_string()
            ]
        );
    }

    #[test]
    fn test_import_once_and_multiple() {
        let reader = MemoryReader::new().with_file("a.less", "#a {}");

        let once = compile(
            "@import \"a\";\n@import \"a\";",
            &Options::default(),
            "main.less",
            &reader,
        );
        assert_eq!(once.css.as_deref(), Some("#a {}\n"));

        let multiple = compile(
            "@import \"a\";\n@import (multiple) \"a\";",
            &Options::default(),
            "main.less",
            &reader,
        );
        assert_eq!(multiple.css.as_deref(), Some("#a {}\n#a {}\n"));
    }

    #[test]
    fn test_cycle_is_diagnosed() {
        let reader = MemoryReader::new()
            .with_file("a.less", "@import \"b\";")
            .with_file("b.less", "\n@import \"a\";");

        let result = compile("@import \"a\";", &Options::default(), "main.less", &reader);

        let diagnostic = result.diagnostic.unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::ImportCycle);
        assert_eq!(
            diagnostic.message,
            "import cycle detected: a.less -> b.less -> a.less"
        );
        assert_eq!(diagnostic.filename.as_deref(), Some("b.less"));
        assert_eq!(diagnostic.line, Some(2));
        assert_eq!(result.css, None);
    }

    #[test]
    fn test_self_import_of_root_is_cycle() {
        let result = compile(
            "@import \"main\";",
            &Options::default(),
            "main.less",
            &MemoryReader::new(),
        );
        assert_eq!(result.diagnostic.unwrap().kind, DiagnosticKind::ImportCycle);
    }

    #[test]
    fn test_optional_missing_import_is_skipped() {
        let result = compile(
            "@import (optional) \"missing\";\n#x { color: red; }",
            &Options::default(),
            "main.less",
            &MemoryReader::new(),
        );
        assert_eq!(result.css.as_deref(), Some("#x { color: red; }\n"));
    }

    #[test]
    fn test_parse_error_in_import_reports_imported_file() {
        let reader = MemoryReader::new().with_file("theme/a.less", "#a {\n  color: red;\n");

        let result = compile(
            "@import \"theme/a\";",
            &Options::default(),
            "main.less",
            &reader,
        );

        let diagnostic = result.diagnostic.unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::ParseError);
        assert_eq!(diagnostic.filename.as_deref(), Some("theme/a.less"));
        assert_eq!(diagnostic.line, Some(1));
        assert_eq!(
            diagnostic.source_extract,
            vec!["#a {".to_string(), "  color: red;".to_string()]
        );
        assert_eq!(result.imports, vec!["theme/a.less".to_string()]);
    }

    #[test]
    fn test_rootpath_rebases_imported_urls() {
        let reader = MemoryReader::new()
            .with_file("theme/a.less", "#a { background: url(img/bg.png); }");
        let options = Options {
            root_path: "/static/".to_string(),
            ..Default::default()
        };

        let result = compile("@import \"theme/a\";", &options, "main.less", &reader);

        assert_eq!(
            result.css.as_deref(),
            Some("#a { background: url(/static/theme/img/bg.png); }\n")
        );
    }

    #[test]
    fn test_minify_failure_is_parse_error() {
        let compiler = Compiler::new().minifier(RejectingMinifier);
        let options = Options {
            minify: true,
            ..Default::default()
        };

        let result = compiler.compile(
            "#x { color: red; }",
            &options,
            "main.less",
            &MemoryReader::new(),
        );

        let diagnostic = result.diagnostic.unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::ParseError);
        assert_eq!(
            diagnostic.message,
            "minification failed: unexpected end of input"
        );
    }

    #[test]
    fn test_into_result() {
        let ok = compile(
            "#x {}",
            &Options::default(),
            "main.less",
            &MemoryReader::new(),
        );
        assert!(ok.is_success());
        assert_eq!(ok.into_result().unwrap(), "#x {}\n");

        let err = compile(
            "@import \"nope\";",
            &Options::default(),
            "main.less",
            &MemoryReader::new(),
        );
        assert!(!err.is_success());
        assert_eq!(
            err.into_result().unwrap_err().kind,
            DiagnosticKind::ImportNotFound
        );
    }
}
