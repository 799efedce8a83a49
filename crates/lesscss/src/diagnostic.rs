//! Compile diagnostics.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Every failure of a compilation, whichever layer it comes from, ends up as a
//! single [`CompileDiagnostic`]. Raw failures are described by [`RawFailure`]
//! and converted exactly once, by [`format`], at the point where they occur.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of a compile diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Malformed stylesheet syntax or semantics, reported by the engine.
    /// Minifier failures are folded into this kind as well.
    ParseError,
    /// The file reader had nothing for a required import.
    ImportNotFound,
    /// An import chain re-entered a file that was still being compiled.
    ImportCycle,
}

impl DiagnosticKind {
    fn label(self) -> &'static str {
        match self {
            DiagnosticKind::ParseError => "less parse exception",
            DiagnosticKind::ImportNotFound => "less import error",
            DiagnosticKind::ImportCycle => "less import cycle",
        }
    }
}

/// The structured outcome of a failed compilation.
///
/// Built once, at the first fatal failure; never merged from several errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileDiagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// File in which the failure was detected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// 1-based line within `filename`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Source lines around the failure, in source order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_extract: Vec<String>,
}

impl CompileDiagnostic {
    /// Create a diagnostic with no location.
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            filename: None,
            line: None,
            source_extract: Vec::new(),
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Renders in the traditional lessc error shape:
///
/// ```text
/// less parse exception: <message>
/// in <filename> at line <line>
/// extract
/// <extract lines>
/// ```
impl fmt::Display for CompileDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)?;
        if let Some(filename) = &self.filename {
            write!(f, "\nin {}", filename)?;
            if let Some(line) = self.line {
                write!(f, " at line {}", line)?;
            }
        }
        if !self.source_extract.is_empty() {
            write!(f, "\nextract")?;
            for line in &self.source_extract {
                write!(f, "\n{}", line)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for CompileDiagnostic {}

/// A failure as reported by the stylesheet engine's parser.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParseFailure {
    pub message: String,
    pub filename: Option<String>,
    pub line: Option<usize>,
    /// Lines around the failure. `None` marks a line that does not exist
    /// (e.g. the line before line 1).
    pub extract: Vec<Option<String>>,
}

impl ParseFailure {
    /// Create a failure with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Locate the failure at `line` of `source` (1-based), capturing the
    /// previous, current and next lines as the extract.
    pub fn at(mut self, filename: impl Into<String>, source: &str, line: usize) -> Self {
        let lines: Vec<&str> = source.lines().collect();
        let get = |n: usize| {
            n.checked_sub(1)
                .and_then(|index| lines.get(index))
                .map(|l| (*l).to_string())
        };
        self.filename = Some(filename.into());
        self.line = Some(line);
        self.extract = vec![get(line.saturating_sub(1)), get(line), get(line + 1)];
        self
    }
}

/// Every way a compilation can fail, before formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFailure {
    /// Parser-originated failure.
    Parse(ParseFailure),
    /// The file reader had nothing at `path`.
    NotFound {
        path: String,
        /// The importing file
        filename: Option<String>,
        /// Line of the import statement in the importing file
        line: Option<usize>,
    },
    /// `chain` ends with the file that closes the cycle.
    Cycle {
        chain: Vec<String>,
        filename: Option<String>,
        line: Option<usize>,
    },
    /// The minifier rejected the rendered CSS.
    Minify { message: String },
    /// A diagnostic raised deeper in the import tree, passed through unchanged.
    Aborted(CompileDiagnostic),
}

/// Convert a raw failure into the unified diagnostic shape.
///
/// Extract lines keep their order; absent and blank lines are dropped.
pub fn format(raw: RawFailure) -> CompileDiagnostic {
    match raw {
        RawFailure::Parse(failure) => CompileDiagnostic {
            kind: DiagnosticKind::ParseError,
            message: failure.message,
            filename: failure.filename,
            line: failure.line,
            source_extract: failure
                .extract
                .into_iter()
                .flatten()
                .filter(|line| !line.trim().is_empty())
                .collect(),
        },
        RawFailure::NotFound {
            path,
            filename,
            line,
        } => CompileDiagnostic {
            kind: DiagnosticKind::ImportNotFound,
            message: format!("'{}' wasn't found", path),
            filename,
            line,
            source_extract: Vec::new(),
        },
        RawFailure::Cycle {
            chain,
            filename,
            line,
        } => CompileDiagnostic {
            kind: DiagnosticKind::ImportCycle,
            message: format!("import cycle detected: {}", chain.join(" -> ")),
            filename,
            line,
            source_extract: Vec::new(),
        },
        RawFailure::Minify { message } => CompileDiagnostic::new(
            DiagnosticKind::ParseError,
            format!("minification failed: {}", message),
        ),
        RawFailure::Aborted(diagnostic) => diagnostic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_failure_extract_skips_holes_and_blanks() {
        let failure = ParseFailure {
            message: "unexpected `}`".to_string(),
            filename: Some("main.less".to_string()),
            line: Some(1),
            extract: vec![
                None,
                Some("#x { color: red; }}".to_string()),
                Some("   ".to_string()),
                Some("#y {}".to_string()),
            ],
        };

        let diagnostic = format(RawFailure::Parse(failure));

        assert_eq!(diagnostic.kind, DiagnosticKind::ParseError);
        assert_eq!(diagnostic.filename.as_deref(), Some("main.less"));
        assert_eq!(diagnostic.line, Some(1));
        assert_eq!(
            diagnostic.source_extract,
            vec!["#x { color: red; }}".to_string(), "#y {}".to_string()]
        );
    }

    #[test]
    fn test_parse_failure_at_captures_surrounding_lines() {
        let source = "a {\n  color: red;\n";
        let failure = ParseFailure::new("missing closing `}`").at("main.less", source, 1);

        assert_eq!(failure.line, Some(1));
        assert_eq!(
            failure.extract,
            vec![
                None,
                Some("a {".to_string()),
                Some("  color: red;".to_string())
            ]
        );
    }

    #[test]
    fn test_not_found_names_the_path() {
        let diagnostic = format(RawFailure::NotFound {
            path: "css/missing.less".to_string(),
            filename: Some("main.less".to_string()),
            line: Some(3),
        });

        assert_eq!(diagnostic.kind, DiagnosticKind::ImportNotFound);
        assert_eq!(diagnostic.message, "'css/missing.less' wasn't found");
        assert!(diagnostic.source_extract.is_empty());
    }

    #[test]
    fn test_cycle_lists_chain() {
        let diagnostic = format(RawFailure::Cycle {
            chain: vec!["a.less".into(), "b.less".into(), "a.less".into()],
            filename: Some("b.less".into()),
            line: Some(1),
        });

        assert_eq!(diagnostic.kind, DiagnosticKind::ImportCycle);
        assert!(diagnostic.message.contains("a.less -> b.less -> a.less"));
    }

    #[test]
    fn test_minify_folds_into_parse_error() {
        let diagnostic = format(RawFailure::Minify {
            message: "expected \"}\"".to_string(),
        });
        assert_eq!(diagnostic.kind, DiagnosticKind::ParseError);
        assert!(diagnostic.message.starts_with("minification failed"));
        assert_eq!(diagnostic.filename, None);
    }

    #[test]
    fn test_aborted_passes_through() {
        let inner = CompileDiagnostic::new(DiagnosticKind::ImportNotFound, "'x.less' wasn't found");
        assert_eq!(format(RawFailure::Aborted(inner.clone())), inner);
    }

    #[test]
    fn test_display_full() {
        let diagnostic = format(RawFailure::Parse(
            ParseFailure::new("missing closing `}`").at("main.less", "a {\n  color: red;\n", 1),
        ));

        insta::assert_snapshot!(diagnostic.to_string(), @r"
less parse exception: missing closing `}`
in main.less at line 1
extract
a {
  color: red;
");
    }

    #[test]
    fn test_display_without_location() {
        let diagnostic = CompileDiagnostic::new(DiagnosticKind::ImportCycle, "a -> a");
        assert_eq!(diagnostic.to_string(), "less import cycle: a -> a");
    }

    #[test]
    fn test_json_omits_empty_fields() {
        let diagnostic =
            CompileDiagnostic::new(DiagnosticKind::ImportNotFound, "'a.less' wasn't found");
        let json = diagnostic.to_json();

        assert_eq!(json["kind"], "ImportNotFound");
        assert!(json.get("filename").is_none());
        assert!(json.get("source_extract").is_none());
    }
}
