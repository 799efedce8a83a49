/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Statement scanner for the inline engine.
 *
 * The scanner walks the source once, tracking comments, strings, url() tokens
 * and brace depth, and splits it into CSS text, variable declarations and
 * @import statements. Imports are resolved through the hook after the whole
 * file has been scanned, in source order.
 */

use lesscss_runtime::path;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{InlineEngine, Node, Stylesheet, urls};
use crate::diagnostic::{ParseFailure, RawFailure};
use crate::engine::{Environment, ImportHook, ImportOutcome, ImportRequest};

static IMPORT_START: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^@import[\s("']"#).unwrap());

static VARIABLE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@([A-Za-z_][\w-]*)(?::|\s+:\s)").unwrap());

static IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)^@import\s*(?:\((?P<opts>[^)]*)\)\s*)?(?P<target>(?i:url)\(\s*(?:"(?P<u1>[^"]*)"|'(?P<u2>[^']*)'|(?P<u3>[^)"'\s]*))\s*\)|"(?P<q1>[^"]*)"|'(?P<q2>[^']*)')\s*(?P<media>.*?)\s*$"#,
    )
    .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Css { text: String, line: Option<usize> },
    Variable { name: String, value: String },
    Import { statement: String, line: usize },
}

pub(super) fn parse(
    engine: &InlineEngine,
    source: &str,
    env: &Environment<'_>,
    hook: &mut dyn ImportHook<Stylesheet>,
) -> Result<Stylesheet, RawFailure> {
    let filename = env.context().filename().to_string();
    let items = Scanner::new(source, &filename)
        .scan()
        .map_err(RawFailure::Parse)?;

    let mut nodes = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Item::Css { text, line } => nodes.push(Node::Css {
                text: urls::rewrite(&text, env),
                line,
            }),
            Item::Variable { name, value } => nodes.push(Node::Variable {
                name,
                value: urls::rewrite(&value, env),
            }),
            Item::Import { statement, line } => {
                let fail = |message: String| {
                    RawFailure::Parse(ParseFailure::new(message).at(&filename, source, line))
                };
                if let Some(node) = import(engine, &statement, line, env, hook, fail)? {
                    nodes.push(node);
                }
            }
        }
    }

    Ok(Stylesheet { filename, nodes })
}

#[derive(Debug, Default)]
struct ImportFlags {
    css: bool,
    less: bool,
    reference: bool,
    multiple: bool,
    optional: bool,
}

fn import(
    engine: &InlineEngine,
    statement: &str,
    line: usize,
    env: &Environment<'_>,
    hook: &mut dyn ImportHook<Stylesheet>,
    fail: impl Fn(String) -> RawFailure,
) -> Result<Option<Node>, RawFailure> {
    let caps = IMPORT
        .captures(statement)
        .ok_or_else(|| fail("malformed @import statement".to_string()))?;

    let mut flags = ImportFlags::default();
    if let Some(opts) = caps.name("opts") {
        let options = opts.as_str().split(',').map(str::trim);
        for option in options.filter(|o| !o.is_empty()) {
            match option {
                "css" => flags.css = true,
                "less" => flags.less = true,
                "reference" => flags.reference = true,
                "multiple" => flags.multiple = true,
                "once" => flags.multiple = false,
                "optional" => flags.optional = true,
                other => return Err(fail(format!("unrecognized import option '{}'", other))),
            }
        }
    }

    let target = caps.name("target").map_or("", |m| m.as_str());
    let raw_path = ["u1", "u2", "u3", "q1", "q2"]
        .iter()
        .find_map(|name| caps.name(name))
        .map_or("", |m| m.as_str())
        .trim();
    let media = caps
        .name("media")
        .map(|m| m.as_str().trim())
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    if raw_path.is_empty() {
        return Err(fail("empty @import path".to_string()));
    }

    let extension = path::extension(raw_path);
    let plain_css =
        flags.css || (!flags.less && (extension == Some("css") || path::has_scheme(raw_path)));
    if plain_css {
        let text = match &media {
            Some(media) => format!("@import {} {};", target, media),
            None => format!("@import {};", target),
        };
        return Ok(Some(Node::CssImport(urls::rebase_urls(
            &text,
            env.context().rootpath(),
        ))));
    }

    let import_path = match extension {
        Some(_) => raw_path.to_string(),
        None => format!("{}.{}", raw_path, engine.extension()),
    };
    let mut request = ImportRequest::new(import_path).at_line(line);
    if flags.multiple {
        request = request.multiple();
    }
    if flags.optional {
        request = request.optional();
    }

    match hook.resolve_import(&request, env.context()) {
        Ok(ImportOutcome::Imported { tree, .. }) => Ok(Some(Node::Import {
            sheet: tree,
            media,
            reference: flags.reference,
        })),
        Ok(ImportOutcome::Skipped) => Ok(None),
        Err(diagnostic) => Err(RawFailure::Aborted(diagnostic)),
    }
}

struct Scanner<'s> {
    source: &'s str,
    bytes: &'s [u8],
    filename: &'s str,
    pos: usize,
    line: usize,
    /// Lines of the currently open braces
    open: Vec<usize>,
    statement_start: bool,
    chunk: usize,
    chunk_line: usize,
    chunk_top_level: bool,
    items: Vec<Item>,
}

impl<'s> Scanner<'s> {
    fn new(source: &'s str, filename: &'s str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            filename,
            pos: 0,
            line: 1,
            open: Vec::new(),
            statement_start: true,
            chunk: 0,
            chunk_line: 1,
            chunk_top_level: true,
            items: Vec::new(),
        }
    }

    fn scan(mut self) -> Result<Vec<Item>, ParseFailure> {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment()?,
                b'/' if self.peek(1) == Some(b'/') => self.drop_line_comment(),
                quote @ (b'"' | b'\'') => {
                    self.skip_string(quote)?;
                    self.statement_start = false;
                }
                b'{' => {
                    self.open.push(self.line);
                    self.pos += 1;
                    self.statement_start = true;
                }
                b'}' => {
                    if self.open.pop().is_none() {
                        return Err(self.fail("unexpected `}`", self.line));
                    }
                    self.pos += 1;
                    self.statement_start = true;
                    if self.open.is_empty() {
                        self.flush(self.pos);
                        self.restart();
                    }
                }
                b';' => {
                    self.pos += 1;
                    self.statement_start = true;
                    if self.open.is_empty() {
                        self.flush(self.pos);
                        self.restart();
                    }
                }
                b'@' if self.statement_start => self.at_keyword()?,
                b if b.is_ascii_whitespace() => self.pos += 1,
                _ if self.at_url() => {
                    self.skip_url()?;
                    self.statement_start = false;
                }
                _ => {
                    self.pos += 1;
                    self.statement_start = false;
                }
            }
        }

        if let Some(&line) = self.open.last() {
            return Err(self.fail("missing closing `}`", line));
        }
        self.flush(self.pos);
        Ok(self.items)
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn fail(&self, message: &str, line: usize) -> ParseFailure {
        ParseFailure::new(message).at(self.filename, self.source, line)
    }

    /// Move to `target`, counting the newlines passed over.
    fn advance_to(&mut self, target: usize) {
        self.line += self.source[self.pos..target].matches('\n').count();
        self.pos = target;
    }

    fn skip_block_comment(&mut self) -> Result<(), ParseFailure> {
        let start_line = self.line;
        match self.source[self.pos + 2..].find("*/") {
            Some(offset) => {
                self.advance_to(self.pos + 2 + offset + 2);
                Ok(())
            }
            None => Err(self.fail("unterminated comment", start_line)),
        }
    }

    fn drop_line_comment(&mut self) {
        self.flush(self.pos);
        let end = self.source[self.pos..]
            .find('\n')
            .map_or(self.bytes.len(), |offset| self.pos + offset);
        self.pos = end;
        self.restart();
    }

    fn skip_string(&mut self, quote: u8) -> Result<(), ParseFailure> {
        let start_line = self.line;
        self.pos += 1;
        while let Some(b) = self.peek(0) {
            match b {
                b'\\' => {
                    if self.peek(1) == Some(b'\n') {
                        self.line += 1;
                    }
                    self.pos += 2;
                }
                b'\n' => break,
                b if b == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => self.pos += 1,
            }
        }
        Err(self.fail("unterminated string", start_line))
    }

    fn at_url(&self) -> bool {
        let preceded_by_ident = self.pos > 0 && {
            let prev = self.bytes[self.pos - 1];
            prev.is_ascii_alphanumeric() || prev == b'-' || prev == b'_'
        };
        !preceded_by_ident
            && self.bytes.len() >= self.pos + 4
            && self.bytes[self.pos..self.pos + 4].eq_ignore_ascii_case(b"url(")
    }

    fn skip_url(&mut self) -> Result<(), ParseFailure> {
        let start_line = self.line;
        self.pos += 4;
        while let Some(b) = self.peek(0) {
            match b {
                b')' => {
                    self.pos += 1;
                    return Ok(());
                }
                quote @ (b'"' | b'\'') => self.skip_string(quote)?,
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
        Err(self.fail("unterminated url()", start_line))
    }

    fn at_keyword(&mut self) -> Result<(), ParseFailure> {
        let rest = &self.source[self.pos..];
        let line = self.line;

        if IMPORT_START.is_match(rest) {
            if !self.open.is_empty() {
                return Err(self.fail("@import is only supported at the top level", line));
            }
            let end = match statement_end(self.bytes, self.pos) {
                Some((end, b';')) => end,
                _ => return Err(self.fail("missing `;` after @import", line)),
            };
            self.flush(self.pos);
            self.items.push(Item::Import {
                statement: self.source[self.pos..end].to_string(),
                line,
            });
            self.advance_to(end + 1);
        } else if let Some(caps) = VARIABLE_START.captures(rest) {
            let name = caps[1].to_string();
            let value_start = self.pos + caps[0].len();
            let end = match statement_end(self.bytes, value_start) {
                Some((end, b';')) => end + 1,
                Some((end, b'}')) => end,
                Some(_) => return Err(self.fail("unsupported variable value", line)),
                None => self.bytes.len(),
            };
            let value_end = if self.bytes.get(end.wrapping_sub(1)) == Some(&b';') {
                end - 1
            } else {
                end
            };
            self.flush(self.pos);
            self.items.push(Item::Variable {
                name,
                value: self.source[value_start..value_end].trim().to_string(),
            });
            self.advance_to(end);
        } else {
            self.pos += 1;
            self.statement_start = false;
            return Ok(());
        }

        self.statement_start = true;
        self.restart();
        Ok(())
    }

    /// Emit the pending CSS text up to `end`.
    fn flush(&mut self, end: usize) {
        let text = &self.source[self.chunk..end];
        let trimmed = text.trim_start();
        if trimmed.trim_end().is_empty() {
            return;
        }
        let leading = &text[..text.len() - trimmed.len()];
        let line = self.chunk_line + leading.matches('\n').count();
        self.items.push(Item::Css {
            text: text.to_string(),
            line: self.chunk_top_level.then_some(line),
        });
    }

    /// Start a new pending chunk at the current position.
    fn restart(&mut self) {
        self.chunk = self.pos;
        self.chunk_line = self.line;
        self.chunk_top_level = self.open.is_empty();
    }
}

/// Find the end of the statement starting at `from`: the index of the first
/// `;`, `{` or `}` outside strings, comments and parentheses, and that byte.
fn statement_end(bytes: &[u8], from: usize) -> Option<(usize, u8)> {
    let mut pos = from;
    let mut parens = 0usize;
    while pos < bytes.len() {
        match bytes[pos] {
            quote @ (b'"' | b'\'') => {
                pos += 1;
                while pos < bytes.len() && bytes[pos] != quote {
                    if bytes[pos] == b'\\' {
                        pos += 1;
                    }
                    pos += 1;
                }
                if pos >= bytes.len() {
                    return None;
                }
            }
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos += 2;
                while pos + 1 < bytes.len() && !(bytes[pos] == b'*' && bytes[pos + 1] == b'/') {
                    pos += 1;
                }
                pos += 1;
            }
            b'(' => parens += 1,
            b')' => parens = parens.saturating_sub(1),
            b @ (b';' | b'{' | b'}') if parens == 0 => return Some((pos, b)),
            _ => {}
        }
        pos += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FileContext;
    use crate::diagnostic::{CompileDiagnostic, DiagnosticKind};
    use crate::options::{CompilationOptions, Options, OptionsSource};
    use lesscss_runtime::MemoryReader;

    /// Hook that records requests and answers with empty stylesheets.
    #[derive(Default)]
    struct RecordingHook {
        requests: Vec<ImportRequest>,
        fail_with: Option<CompileDiagnostic>,
    }

    impl ImportHook<Stylesheet> for RecordingHook {
        fn resolve_import(
            &mut self,
            request: &ImportRequest,
            current: &FileContext,
        ) -> Result<ImportOutcome<Stylesheet>, CompileDiagnostic> {
            self.requests.push(request.clone());
            if let Some(diagnostic) = &self.fail_with {
                return Err(diagnostic.clone());
            }
            let filename = current.derive(&request.path).filename().to_string();
            Ok(ImportOutcome::Imported {
                filename: filename.clone(),
                tree: Stylesheet {
                    filename,
                    nodes: Vec::new(),
                },
            })
        }
    }

    fn options(root_path: &str) -> CompilationOptions {
        Options {
            root_path: root_path.to_string(),
            ..Default::default()
        }
        .to_compilation_options("main.less")
    }

    fn parse_with(source: &str, hook: &mut RecordingHook) -> Result<Stylesheet, RawFailure> {
        let options = options("");
        let reader = MemoryReader::new();
        let env = Environment::new(&options, FileContext::root(&options), &reader);
        parse(&InlineEngine::default(), source, &env, hook)
    }

    fn parse_failure(source: &str) -> ParseFailure {
        match parse_with(source, &mut RecordingHook::default()) {
            Err(RawFailure::Parse(failure)) => failure,
            other => panic!("expected parse failure, got {:?}", other),
        }
    }

    #[test]
    fn test_splits_top_level_statements() {
        let sheet = parse_with(
            "#a { color: red; }\n\n#b { color: blue; }\n",
            &mut RecordingHook::default(),
        )
        .unwrap();

        assert_eq!(
            sheet.nodes,
            vec![
                Node::Css {
                    text: "#a { color: red; }".to_string(),
                    line: Some(1)
                },
                Node::Css {
                    text: "\n\n#b { color: blue; }".to_string(),
                    line: Some(3)
                },
            ]
        );
    }

    #[test]
    fn test_import_request_gets_extension_and_line() {
        let mut hook = RecordingHook::default();
        parse_with("#x {}\n@import \"a\";\n@import 'b.less';", &mut hook).unwrap();

        assert_eq!(hook.requests.len(), 2);
        assert_eq!(hook.requests[0].path, "a.less");
        assert_eq!(hook.requests[0].line, Some(2));
        assert!(hook.requests[0].once);
        assert_eq!(hook.requests[1].path, "b.less");
    }

    #[test]
    fn test_import_options() {
        let mut hook = RecordingHook::default();
        let sheet = parse_with(
            "@import (reference, multiple) \"a\";\n@import (optional) url(b.less) screen;",
            &mut hook,
        )
        .unwrap();

        assert!(!hook.requests[0].once);
        assert!(hook.requests[1].optional);
        assert!(matches!(
            &sheet.nodes[0],
            Node::Import { reference: true, .. }
        ));
        assert!(matches!(
            &sheet.nodes[1],
            Node::Import { media: Some(media), reference: false, .. } if media == "screen"
        ));
    }

    #[test]
    fn test_css_imports_stay_plain() {
        let mut hook = RecordingHook::default();
        let sheet = parse_with(
            "@import \"print.css\" print;\n@import (css) 'theme';\n\
             @import url(http://fonts.example.com/x);",
            &mut hook,
        )
        .unwrap();

        assert!(hook.requests.is_empty());
        assert_eq!(
            sheet.nodes,
            vec![
                Node::CssImport("@import \"print.css\" print;".to_string()),
                Node::CssImport("@import 'theme';".to_string()),
                Node::CssImport("@import url(http://fonts.example.com/x);".to_string()),
            ]
        );
    }

    #[test]
    fn test_less_option_forces_import_of_css_file() {
        let mut hook = RecordingHook::default();
        parse_with("@import (less) \"legacy.css\";", &mut hook).unwrap();
        assert_eq!(hook.requests[0].path, "legacy.css");
    }

    #[test]
    fn test_hook_failure_is_passed_through() {
        let diagnostic =
            CompileDiagnostic::new(DiagnosticKind::ImportNotFound, "'a.less' wasn't found");
        let mut hook = RecordingHook {
            fail_with: Some(diagnostic.clone()),
            ..Default::default()
        };

        let result = parse_with("@import \"a\";", &mut hook);

        assert_eq!(result, Err(RawFailure::Aborted(diagnostic)));
    }

    #[test]
    fn test_variables_are_extracted() {
        let sheet = parse_with(
            "@brand: #f00;\n#x {\n  @pad : 2px;\n  color: @brand;\n}",
            &mut RecordingHook::default(),
        )
        .unwrap();

        let variables: Vec<_> = sheet
            .nodes
            .iter()
            .filter_map(|node| match node {
                Node::Variable { name, value } => Some((name.as_str(), value.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(variables, vec![("brand", "#f00"), ("pad", "2px")]);
    }

    #[test]
    fn test_at_rules_are_not_variables() {
        let sheet = parse_with(
            "@media screen { #x { color: red; } }\n@page :first { margin: 0; }",
            &mut RecordingHook::default(),
        )
        .unwrap();

        for node in &sheet.nodes {
            assert!(matches!(node, Node::Css { .. }));
        }
    }

    #[test]
    fn test_line_comments_are_dropped() {
        let sheet = parse_with(
            "// header\n#x { background: url(//cdn.example.com/a.png); } // trailing\n",
            &mut RecordingHook::default(),
        )
        .unwrap();

        let text: String = sheet
            .nodes
            .iter()
            .filter_map(|node| match node {
                Node::Css { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert!(!text.contains("header"));
        assert!(!text.contains("trailing"));
        assert!(text.contains("url(//cdn.example.com/a.png)"));
    }

    #[test]
    fn test_block_comments_and_strings_hide_braces() {
        let sheet = parse_with(
            "/* } */\n#x::after { content: \"}\"; }",
            &mut RecordingHook::default(),
        )
        .unwrap();
        assert_eq!(sheet.nodes.len(), 1);
    }

    #[test]
    fn test_unexpected_closing_brace() {
        let failure = parse_failure("#x { color: red; }\n}\n");
        assert_eq!(failure.message, "unexpected `}`");
        assert_eq!(failure.line, Some(2));
        assert_eq!(failure.filename.as_deref(), Some("main.less"));
    }

    #[test]
    fn test_missing_closing_brace_points_at_open() {
        let failure = parse_failure("#a {}\n#x {\n  color: red;\n");
        assert_eq!(failure.message, "missing closing `}`");
        assert_eq!(failure.line, Some(2));
        assert_eq!(failure.extract[1].as_deref(), Some("#x {"));
    }

    #[test]
    fn test_unterminated_string_and_comment() {
        assert_eq!(
            parse_failure("#x { content: \"oops; }\n").message,
            "unterminated string"
        );
        assert_eq!(parse_failure("#x {}\n/* never closed").line, Some(2));
    }

    #[test]
    fn test_import_errors() {
        assert_eq!(
            parse_failure("@import \"a\"").message,
            "missing `;` after @import"
        );
        assert_eq!(
            parse_failure("@import (inline) \"a\";").message,
            "unrecognized import option 'inline'"
        );
        assert_eq!(parse_failure("@import \"\";").message, "empty @import path");
        assert_eq!(
            parse_failure("#x {\n  @import \"a\";\n}").message,
            "@import is only supported at the top level"
        );
    }

    #[test]
    fn test_statement_end_skips_nested_tokens() {
        let source = br#"@a: url("x;y") /* ; */ (1;2);"#;
        assert_eq!(statement_end(source, 3), Some((source.len() - 1, b';')));
        assert_eq!(statement_end(b"@a: red }", 3), Some((8, b'}')));
        assert_eq!(statement_end(b"@a: red", 3), None);
    }
}
