/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Renders a parsed stylesheet tree to CSS.
 *
 * Variables are collected from the whole tree first, bracketed by the
 * option-supplied global (lowest precedence) and modify (highest precedence)
 * variables, then substituted while the tree is written out in order. Each
 * variable's value is resolved once and reused.
 */

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{Node, Stylesheet};
use crate::diagnostic::{ParseFailure, RawFailure};
use crate::engine::Rendered;
use crate::options::{CompilationOptions, LineNumbers};

/// Comments and quoted strings come first so bare `@name` references inside
/// them are left alone.
static VARIABLE_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"/\*[\s\S]*?\*/|"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|@\{([\w-]+)\}|@([\w-]+)"#)
        .unwrap()
});

static INTERPOLATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\{([\w-]+)\}").unwrap());

static ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"~"([^"]*)"|~'([^']*)'"#).unwrap());

pub(super) fn render(
    tree: &Stylesheet,
    options: &CompilationOptions,
) -> Result<Rendered, RawFailure> {
    let mut variables = Variables::default();
    for (name, value) in &options.global_vars {
        variables.define(name, value);
    }
    variables.collect(tree);
    for (name, value) in &options.modify_vars {
        variables.define(name, value);
    }

    let mut output = Output::default();
    let annotate = if options.compress {
        LineNumbers::None
    } else {
        options.dump_line_numbers
    };
    output.emit(tree, &variables, annotate)?;

    let mut css = String::new();
    for import in &output.imports {
        css.push_str(import);
        css.push('\n');
    }
    css.push_str(&output.body);

    let css = if options.compress {
        compress(&css)
    } else {
        tidy(&css)
    };
    Ok(Rendered {
        css,
        source_map: None,
    })
}

/// Variable definitions, resolved lazily and at most once per name.
#[derive(Debug, Default)]
struct Variables {
    values: HashMap<String, String>,
    resolved: RefCell<HashMap<String, String>>,
    resolving: RefCell<HashSet<String>>,
}

impl Variables {
    fn define(&mut self, name: &str, value: &str) {
        let name = name.trim().trim_start_matches('@');
        self.values
            .insert(name.to_string(), value.trim().to_string());
    }

    fn collect(&mut self, sheet: &Stylesheet) {
        for node in &sheet.nodes {
            match node {
                Node::Variable { name, value } => self.define(name, value),
                Node::Import { sheet, .. } => self.collect(sheet),
                Node::Css { .. } | Node::CssImport(_) => {}
            }
        }
    }

    /// Replace references to defined variables in `text`.
    fn substitute(&self, text: &str) -> Result<String, String> {
        let substituted = self.substitute_refs(text)?;
        Ok(ESCAPE
            .replace_all(&substituted, |caps: &Captures| {
                caps.get(1)
                    .or_else(|| caps.get(2))
                    .map_or(String::new(), |m| m.as_str().to_string())
            })
            .into_owned())
    }

    /// Inside strings only `@{name}` is expanded; comments are copied as is.
    fn substitute_refs(&self, text: &str) -> Result<String, String> {
        if !text.contains('@') {
            return Ok(text.to_string());
        }

        let mut error = None;
        let replaced = VARIABLE_REF.replace_all(text, |caps: &Captures| {
            if let Some(name) = caps.get(1) {
                self.expand(name.as_str(), &caps[0], true, &mut error)
            } else if let Some(name) = caps.get(2) {
                self.expand(name.as_str(), &caps[0], false, &mut error)
            } else if caps[0].starts_with("/*") {
                caps[0].to_string()
            } else {
                INTERPOLATION
                    .replace_all(&caps[0], |inner: &Captures| {
                        self.expand(&inner[1], &inner[0], true, &mut error)
                    })
                    .into_owned()
            }
        });

        match error {
            Some(e) => Err(e),
            None => Ok(replaced.into_owned()),
        }
    }

    fn expand(
        &self,
        name: &str,
        reference: &str,
        interpolated: bool,
        error: &mut Option<String>,
    ) -> String {
        if error.is_some() {
            return String::new();
        }
        match self.resolve(name) {
            Ok(None) => reference.to_string(),
            Ok(Some(value)) if interpolated => unquote(&value).to_string(),
            Ok(Some(value)) => value,
            Err(e) => {
                error.get_or_insert(e);
                String::new()
            }
        }
    }

    /// Fully substituted value of `name`, or `None` if it is not defined.
    fn resolve(&self, name: &str) -> Result<Option<String>, String> {
        let Some(value) = self.values.get(name) else {
            return Ok(None);
        };
        if let Some(done) = self.resolved.borrow().get(name) {
            return Ok(Some(done.clone()));
        }
        if self.resolving.borrow().contains(name) {
            return Err(format!("recursive variable definition for @{}", name));
        }

        self.resolving.borrow_mut().insert(name.to_string());
        let result = self.substitute_refs(value);
        self.resolving.borrow_mut().remove(name);

        let resolved = result?;
        self.resolved
            .borrow_mut()
            .insert(name.to_string(), resolved.clone());
        Ok(Some(resolved))
    }
}

/// Strip one level of matching quotes (and a `~` escape) from a value.
fn unquote(value: &str) -> &str {
    let value = value.strip_prefix('~').unwrap_or(value);
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[derive(Debug, Default)]
struct Output {
    imports: Vec<String>,
    body: String,
}

impl Output {
    fn emit(
        &mut self,
        sheet: &Stylesheet,
        variables: &Variables,
        annotate: LineNumbers,
    ) -> Result<(), RawFailure> {
        let fail = |message: String| {
            let mut failure = ParseFailure::new(message);
            failure.filename = Some(sheet.filename.clone());
            RawFailure::Parse(failure)
        };

        for node in &sheet.nodes {
            match node {
                Node::Css { text, line } => {
                    let text = variables.substitute(text).map_err(fail)?;
                    match line {
                        Some(line) => {
                            self.start_line();
                            line_annotation(&mut self.body, *line, &sheet.filename, annotate);
                            self.body.push_str(text.trim_start());
                        }
                        None => self.body.push_str(&text),
                    }
                }
                Node::Variable { .. } => {}
                Node::CssImport(text) => {
                    self.imports.push(variables.substitute(text).map_err(fail)?)
                }
                Node::Import {
                    reference: true, ..
                } => {}
                Node::Import {
                    sheet: child,
                    media: None,
                    ..
                } => self.emit(child, variables, annotate)?,
                Node::Import {
                    sheet: child,
                    media: Some(media),
                    ..
                } => {
                    let mut inner = Output::default();
                    inner.emit(child, variables, annotate)?;
                    self.imports.extend(inner.imports);
                    let body = inner.body.trim();
                    if !body.is_empty() {
                        let media = variables.substitute(media).map_err(fail)?;
                        self.start_line();
                        self.body
                            .push_str(&format!("@media {} {{\n{}\n}}", media, body));
                    }
                }
            }
        }
        Ok(())
    }

    fn start_line(&mut self) {
        if !self.body.is_empty() && !self.body.ends_with('\n') {
            self.body.push('\n');
        }
    }
}

fn line_annotation(out: &mut String, line: usize, filename: &str, mode: LineNumbers) {
    if mode.comments() {
        out.push_str(&format!("/* line {}, {} */\n", line, filename));
    }
    if mode.media_query() {
        let location = if lesscss_runtime::path::has_scheme(filename) {
            filename.to_string()
        } else {
            format!("file://{}", filename)
        };
        out.push_str(&format!(
            "@media -sass-debug-info{{filename{{font-family:{}}}line{{font-family:\\00003{}}}}}\n",
            debug_info_escape(&location),
            line
        ));
    }
}

fn debug_info_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() * 2);
    for c in value.chars() {
        match c {
            '.' | ':' | '/' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\\' => escaped.push_str("\\/"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Drop whitespace-only lines and end with a single newline.
fn tidy(css: &str) -> String {
    let mut out = css
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Characters that need no whitespace after them.
const TIGHT_AFTER: &[char] = &['{', '}', ';', ',', ':', '>', '('];
/// Characters that need no whitespace before them.
const TIGHT_BEFORE: &[char] = &['{', '}', ';', ',', '>', ')'];

/// Collapse whitespace and drop comments outside strings.
///
/// `/*! ... */` comments are kept.
fn compress(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut pending_space = false;
    let mut chars = css.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let keep = chars.peek() == Some(&'!');
                let mut comment = String::from("/*");
                let mut prev = '\0';
                for next in chars.by_ref() {
                    comment.push(next);
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                if keep {
                    push_token(&mut out, &comment, &mut pending_space);
                }
            }
            '"' | '\'' => {
                let mut string = String::from(c);
                let mut escaped = false;
                for next in chars.by_ref() {
                    string.push(next);
                    if escaped {
                        escaped = false;
                    } else if next == '\\' {
                        escaped = true;
                    } else if next == c {
                        break;
                    }
                }
                push_token(&mut out, &string, &mut pending_space);
            }
            c if c.is_whitespace() => pending_space = true,
            c => {
                let mut buf = [0u8; 4];
                push_token(&mut out, c.encode_utf8(&mut buf), &mut pending_space);
            }
        }
    }
    out
}

fn push_token(out: &mut String, token: &str, pending_space: &mut bool) {
    if std::mem::take(pending_space) {
        if let (Some(last), Some(first)) = (out.chars().last(), token.chars().next()) {
            if !TIGHT_AFTER.contains(&last) && !TIGHT_BEFORE.contains(&first) {
                out.push(' ');
            }
        }
    }
    if token == "}" && out.ends_with(';') {
        out.pop();
    }
    out.push_str(token);
}
