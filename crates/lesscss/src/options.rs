//! Options translation.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Callers hand options to the compiler in several shapes: the typed
//! [`Options`] struct, an already-normalized [`CompilationOptions`], or a
//! loosely-typed JSON bag whose field names differ between tool versions.
//! Each shape implements [`OptionsSource`], a total mapping onto one
//! immutable [`CompilationOptions`] snapshot.
//!
//! # JSON field names
//!
//! ```json
//! {
//!   "compress": true,
//!   "rootpath": "assets/",          // also "rootPath", "root_path"
//!   "optimization": 1,              // also "optimizationLevel"
//!   "dumpLineNumbers": "comments",  // "comments" | "mediaquery" | "all"
//!   "strictMath": "on",             // booleans may be "on"/"off"
//!   "globalVars": { "brand": "#f00" },
//!   "modifyVars": null              // null or {} means no overrides
//! }
//! ```
//!
//! Unknown keys are ignored, and values of the wrong type are treated as
//! absent, so the mapping never fails.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name used for the root stylesheet when the caller provides none.
pub const UNKNOWN_SOURCE_NAME: &str = "unknown";

/// Where to emit source line information in the generated CSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineNumbers {
    /// No line number output
    #[default]
    None,
    /// Line numbers in CSS comments
    Comments,
    /// Line numbers in a fake `@media -sass-debug-info` query
    MediaQuery,
    /// Both comments and media query
    All,
}

impl LineNumbers {
    /// Parse the option string used on the command line and in JSON.
    ///
    /// Blank input means [`LineNumbers::None`]; unknown input is `None`
    /// (the `Option`), letting callers decide whether to warn.
    pub fn from_option_str(value: &str) -> Option<Self> {
        match value.trim() {
            "" => Some(LineNumbers::None),
            "comments" => Some(LineNumbers::Comments),
            "mediaquery" => Some(LineNumbers::MediaQuery),
            "all" => Some(LineNumbers::All),
            _ => None,
        }
    }

    /// The option string, or `None` when line numbers are disabled.
    pub fn as_option_str(self) -> Option<&'static str> {
        match self {
            LineNumbers::None => None,
            LineNumbers::Comments => Some("comments"),
            LineNumbers::MediaQuery => Some("mediaquery"),
            LineNumbers::All => Some("all"),
        }
    }

    /// Whether CSS comments with line numbers are wanted.
    pub fn comments(self) -> bool {
        matches!(self, LineNumbers::Comments | LineNumbers::All)
    }

    /// Whether `-sass-debug-info` media queries are wanted.
    pub fn media_query(self) -> bool {
        matches!(self, LineNumbers::MediaQuery | LineNumbers::All)
    }
}

/// Host-facing compile options.
///
/// Defaults match lessc: `optimization_level` is 1 and `relative_urls` is
/// on. Every other flag is off and every string or map is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Remove some whitespace from the output
    pub compress: bool,
    pub lint: bool,
    pub silent: bool,
    pub strict_imports: bool,
    pub strict_math: bool,
    pub strict_units: bool,
    pub ie_compat: bool,
    pub javascript_enabled: bool,
    /// Lower numbers create fewer tree nodes
    pub optimization_level: i32,
    /// Prefix for rewritten URLs; blank means none
    pub root_path: String,
    /// Re-write relative URLs to the entry stylesheet
    pub relative_urls: bool,
    pub dump_line_numbers: LineNumbers,
    /// Run the minifier over the output
    pub minify: bool,
    /// Only evaluate imports, produce no CSS
    pub dependencies_only: bool,
    pub global_vars: BTreeMap<String, String>,
    pub modify_vars: BTreeMap<String, String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            compress: false,
            lint: false,
            silent: false,
            strict_imports: false,
            strict_math: false,
            strict_units: false,
            ie_compat: false,
            javascript_enabled: false,
            optimization_level: 1,
            root_path: String::new(),
            relative_urls: true,
            dump_line_numbers: LineNumbers::None,
            minify: false,
            dependencies_only: false,
            global_vars: BTreeMap::new(),
            modify_vars: BTreeMap::new(),
        }
    }
}

/// The normalized, immutable options snapshot for one compilation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompilationOptions {
    pub compress: bool,
    pub lint: bool,
    pub silent: bool,
    pub strict_imports: bool,
    pub strict_math: bool,
    pub strict_units: bool,
    pub ie_compat: bool,
    pub javascript_enabled: bool,
    pub optimization_level: i32,
    pub relative_urls: bool,
    /// Never `Some("")`: blank root paths are normalized to `None`
    pub root_path: Option<String>,
    pub dump_line_numbers: LineNumbers,
    pub minify: bool,
    pub dependencies_only: bool,
    pub source_filename: String,
    pub global_vars: BTreeMap<String, String>,
    pub modify_vars: BTreeMap<String, String>,
}

impl CompilationOptions {
    /// Normalize typed [`Options`] for the stylesheet named `source_name`.
    pub fn from_options(options: &Options, source_name: &str) -> Self {
        Self {
            compress: options.compress,
            lint: options.lint,
            silent: options.silent,
            strict_imports: options.strict_imports,
            strict_math: options.strict_math,
            strict_units: options.strict_units,
            ie_compat: options.ie_compat,
            javascript_enabled: options.javascript_enabled,
            optimization_level: options.optimization_level,
            relative_urls: options.relative_urls,
            root_path: non_blank(&options.root_path),
            dump_line_numbers: options.dump_line_numbers,
            minify: options.minify,
            dependencies_only: options.dependencies_only,
            source_filename: source_name_or_unknown(source_name),
            global_vars: options.global_vars.clone(),
            modify_vars: options.modify_vars.clone(),
        }
    }

    /// Translate a loosely-typed JSON options bag. Never fails.
    pub fn from_json(value: &Value, source_name: &str) -> Self {
        let bag = JsonBag(value.as_object());
        let defaults = Options::default();

        let options = Options {
            compress: bag.flag(&["compress"], defaults.compress),
            lint: bag.flag(&["lint"], defaults.lint),
            silent: bag.flag(&["silent"], defaults.silent),
            strict_imports: bag.flag(&["strictImports", "strict_imports"], defaults.strict_imports),
            strict_math: bag.flag(&["strictMath", "strict_math"], defaults.strict_math),
            strict_units: bag.flag(&["strictUnits", "strict_units"], defaults.strict_units),
            ie_compat: bag.flag(&["ieCompat", "ie_compat"], defaults.ie_compat),
            javascript_enabled: bag.flag(
                &["javascriptEnabled", "javaScriptEnabled", "javascript_enabled"],
                defaults.javascript_enabled,
            ),
            optimization_level: bag
                .integer(&["optimizationLevel", "optimization", "optimization_level"])
                .unwrap_or(defaults.optimization_level),
            root_path: bag
                .string(&["rootpath", "rootPath", "root_path"])
                .unwrap_or_default(),
            relative_urls: bag.flag(&["relativeUrls", "relative_urls"], defaults.relative_urls),
            dump_line_numbers: bag
                .string(&["dumpLineNumbers", "dump_line_numbers"])
                .map_or(LineNumbers::None, |value| line_numbers_or_warn(&value)),
            minify: bag.flag(&["minify"], defaults.minify),
            dependencies_only: bag.flag(
                &["dependenciesOnly", "dependencies_only", "depends"],
                defaults.dependencies_only,
            ),
            global_vars: bag.vars(&["globalVars", "global_vars"]),
            modify_vars: bag.vars(&["modifyVars", "modify_vars"]),
        };

        let source_name = if source_name.trim().is_empty() {
            bag.string(&["filename", "sourceFilename"]).unwrap_or_default()
        } else {
            source_name.to_string()
        };

        Self::from_options(&options, &source_name)
    }
}

/// Anything that can be normalized into [`CompilationOptions`].
pub trait OptionsSource {
    /// Produce the options snapshot for the stylesheet named `source_name`.
    fn to_compilation_options(&self, source_name: &str) -> CompilationOptions;
}

impl OptionsSource for Options {
    fn to_compilation_options(&self, source_name: &str) -> CompilationOptions {
        CompilationOptions::from_options(self, source_name)
    }
}

impl OptionsSource for CompilationOptions {
    fn to_compilation_options(&self, source_name: &str) -> CompilationOptions {
        let mut options = self.clone();
        if !source_name.trim().is_empty() {
            options.source_filename = source_name.to_string();
        }
        options
    }
}

impl OptionsSource for Value {
    fn to_compilation_options(&self, source_name: &str) -> CompilationOptions {
        CompilationOptions::from_json(self, source_name)
    }
}

impl<T: OptionsSource + ?Sized> OptionsSource for &T {
    fn to_compilation_options(&self, source_name: &str) -> CompilationOptions {
        (**self).to_compilation_options(source_name)
    }
}

fn non_blank(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn source_name_or_unknown(source_name: &str) -> String {
    if source_name.trim().is_empty() {
        UNKNOWN_SOURCE_NAME.to_string()
    } else {
        source_name.to_string()
    }
}

fn line_numbers_or_warn(value: &str) -> LineNumbers {
    LineNumbers::from_option_str(value).unwrap_or_else(|| {
        tracing::warn!(value, "ignoring unrecognized dumpLineNumbers option");
        LineNumbers::None
    })
}

/// Read-only view over a JSON object with alias-aware lookups.
struct JsonBag<'a>(Option<&'a serde_json::Map<String, Value>>);

impl JsonBag<'_> {
    fn get(&self, names: &[&str]) -> Option<&Value> {
        let map = self.0?;
        names
            .iter()
            .filter_map(|name| map.get(*name))
            .find(|value| !value.is_null())
    }

    fn flag(&self, names: &[&str], default: bool) -> bool {
        self.get(names).and_then(json_bool).unwrap_or(default)
    }

    fn integer(&self, names: &[&str]) -> Option<i32> {
        match self.get(names)? {
            Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn string(&self, names: &[&str]) -> Option<String> {
        match self.get(names)? {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn vars(&self, names: &[&str]) -> BTreeMap<String, String> {
        match self.get(names) {
            Some(Value::Object(map)) => map
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(name, value)| (name.clone(), json_scalar_string(value)))
                .collect(),
            _ => BTreeMap::new(),
        }
    }
}

fn json_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "yes" | "1" => Some(true),
            "off" | "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn json_scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
