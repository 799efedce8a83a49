//! Import loading.
//!
//! Copyright (c) 2025 Posit, PBC

use lesscss_runtime::{FileReader, path};

use crate::context::FileContext;
use crate::diagnostic::{CompileDiagnostic, RawFailure, format};
use crate::engine::ImportRequest;

/// Content of an imported file together with its derived context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImport {
    pub content: String,
    pub context: FileContext,
}

/// Load the file imported as `import_path` from the file described by
/// `context`.
pub fn load(
    context: &FileContext,
    import_path: &str,
    reader: &dyn FileReader,
) -> Result<LoadedImport, CompileDiagnostic> {
    load_request(context, &ImportRequest::new(import_path), reader)
}

/// Load the file named by `request`.
///
/// The direct lookup resolves against the importing file's directory. If it
/// misses, one retry resolves against the entry stylesheet's directory.
/// A reader error counts as a miss.
pub fn load_request(
    context: &FileContext,
    request: &ImportRequest,
    reader: &dyn FileReader,
) -> Result<LoadedImport, CompileDiagnostic> {
    let child = context.derive(&request.path);
    if let Some(content) = read(reader, child.filename()) {
        return Ok(LoadedImport {
            content,
            context: child,
        });
    }

    if let Some(fallback) = entry_relative(context, &request.path, child.filename()) {
        if let Some(content) = read(reader, fallback.filename()) {
            tracing::debug!(
                import = %request.path,
                path = %fallback.filename(),
                "import resolved against entry directory"
            );
            return Ok(LoadedImport {
                content,
                context: fallback,
            });
        }
    }

    Err(format(RawFailure::NotFound {
        path: child.filename().to_string(),
        filename: Some(context.filename().to_string()),
        line: request.line,
    }))
}

/// The context for resolving `import_path` against the entry directory, when
/// that differs from the direct lookup `href`.
fn entry_relative(context: &FileContext, import_path: &str, href: &str) -> Option<FileContext> {
    if path::is_absolute(import_path) {
        return None;
    }
    let alternate = path::join(&path::directory_of(context.entry_path()), import_path);
    if alternate == href {
        return None;
    }
    Some(context.child_at(alternate, import_path))
}

fn read(reader: &dyn FileReader, href: &str) -> Option<String> {
    match reader.read(href) {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!(path = %href, error = %e, "import read failed");
            None
        }
    }
}
