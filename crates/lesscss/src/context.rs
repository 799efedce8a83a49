//! Per-file resolution state.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! A [`FileContext`] records where the file being parsed lives and how asset
//! URLs declared in it must be re-based. The root context comes from the
//! compilation options; every import derives a fresh child context, so the
//! values are never shared mutably between nested parses.

use lesscss_runtime::path;
use serde::Serialize;

use crate::options::CompilationOptions;

/// Resolution state for one file in the import graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileContext {
    current_directory: String,
    filename: String,
    root_filename: String,
    rootpath: Option<String>,
    entry_path: String,
    relative_urls: bool,
}

impl FileContext {
    /// Build the context of the entry stylesheet.
    pub fn root(options: &CompilationOptions) -> Self {
        let filename = options.source_filename.clone();
        Self {
            current_directory: path::directory_of(&filename),
            root_filename: filename.clone(),
            entry_path: filename.clone(),
            filename,
            rootpath: options.root_path.clone(),
            relative_urls: options.relative_urls,
        }
    }

    /// Resolve `import_path` against this file's directory.
    ///
    /// Absolute paths and URLs are returned verbatim.
    pub fn resolve(&self, import_path: &str) -> String {
        if path::is_absolute(import_path) {
            import_path.to_string()
        } else {
            path::join(&self.current_directory, import_path)
        }
    }

    /// Derive the context of the file imported as `import_path`.
    pub fn derive(&self, import_path: &str) -> FileContext {
        self.child_at(self.resolve(import_path), import_path)
    }

    /// Derive a child context for a file already resolved to `href`.
    ///
    /// `import_path` is the path as declared in the importing file; only its
    /// directory component contributes to the child's rootpath.
    pub(crate) fn child_at(&self, href: String, import_path: &str) -> FileContext {
        let rootpath = if self.relative_urls && !path::is_absolute(import_path) {
            match path::directory_of(import_path).as_str() {
                "" => self.rootpath.clone(),
                dir => Some(format!("{}{}", self.rootpath.as_deref().unwrap_or(""), dir)),
            }
        } else {
            self.rootpath.clone()
        };

        FileContext {
            current_directory: path::directory_of(&href),
            filename: href,
            root_filename: self.root_filename.clone(),
            rootpath,
            entry_path: self.entry_path.clone(),
            relative_urls: self.relative_urls,
        }
    }

    /// Directory used to resolve the next relative import; `""` or ends with `/`.
    pub fn current_directory(&self) -> &str {
        &self.current_directory
    }

    /// Resolved path of this file.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Filename of the entry stylesheet, constant across the tree.
    pub fn root_filename(&self) -> &str {
        &self.root_filename
    }

    /// Prefix for generated URLs, if any.
    pub fn rootpath(&self) -> Option<&str> {
        self.rootpath.as_deref()
    }

    pub fn entry_path(&self) -> &str {
        &self.entry_path
    }

    pub fn relative_urls(&self) -> bool {
        self.relative_urls
    }

    /// Whether this is the entry stylesheet's own context.
    pub fn is_root(&self) -> bool {
        self.filename == self.root_filename
    }
}
