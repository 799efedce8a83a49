//! URL rewriting: `data-uri()` inlining and rootpath rebasing.
//!
//! Copyright (c) 2025 Posit, PBC

use base64::prelude::*;
use lesscss_runtime::path;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::engine::Environment;

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\burl\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))\s*\)"#).unwrap()
});

static DATA_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"data-uri\(\s*(?:(?:"([^"]*)"|'([^']*)')\s*,\s*)?(?:"([^"]*)"|'([^']*)')\s*\)"#,
    )
    .unwrap()
});

/// Apply both rewrites to a fragment of the current file.
pub(super) fn rewrite(text: &str, env: &Environment<'_>) -> String {
    let inlined = inline_data_uris(text, env);
    rebase_urls(&inlined, env.context().rootpath())
}

/// Prefix relative `url()` references with `rootpath`.
pub(super) fn rebase_urls(text: &str, rootpath: Option<&str>) -> String {
    let Some(rootpath) = rootpath.filter(|r| !r.is_empty()) else {
        return text.to_string();
    };
    if !text.to_ascii_lowercase().contains("url(") {
        return text.to_string();
    }

    URL.replace_all(text, |caps: &Captures| {
        let (value, quote) = match (caps.get(1), caps.get(2), caps.get(3)) {
            (Some(m), _, _) => (m.as_str(), "\""),
            (_, Some(m), _) => (m.as_str(), "'"),
            (_, _, m) => (m.map_or("", |m| m.as_str()), ""),
        };
        if rebasable(value) {
            format!("url({q}{}{q})", rebase(rootpath, value), q = quote)
        } else {
            caps[0].to_string()
        }
    })
    .into_owned()
}

fn rebasable(url: &str) -> bool {
    !url.is_empty() && !path::is_absolute(url) && !url.starts_with('#') && !url.starts_with('@')
}

fn rebase(rootpath: &str, url: &str) -> String {
    let joined = format!("{}{}", rootpath, url);
    if path::has_scheme(&joined) {
        joined
    } else {
        path::normalize(&joined)
    }
}

/// Replace `data-uri()` calls with base64 `data:` URLs.
///
/// A resource that cannot be read degrades to a plain `url()`.
fn inline_data_uris(text: &str, env: &Environment<'_>) -> String {
    if !text.contains("data-uri(") {
        return text.to_string();
    }

    DATA_URI
        .replace_all(text, |caps: &Captures| {
            let file = caps.get(3).or_else(|| caps.get(4)).map_or("", |m| m.as_str());
            let mime = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().trim_end_matches(";base64").to_string());

            match env.read_bytes(file) {
                Some(bytes) => format!(
                    "url(\"data:{};base64,{}\")",
                    mime.unwrap_or_else(|| mime_type(file).to_string()),
                    BASE64_STANDARD.encode(bytes)
                ),
                None => {
                    tracing::warn!(
                        path = file,
                        file = env.context().filename(),
                        "data-uri resource not found, keeping url()"
                    );
                    format!("url(\"{}\")", file)
                }
            }
        })
        .into_owned()
}

fn mime_type(file: &str) -> &'static str {
    let extension = path::extension(file).map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("eot") => "application/vnd.ms-fontobject",
        Some("css") => "text/css",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FileContext;
    use crate::options::{Options, OptionsSource};
    use lesscss_runtime::MemoryReader;

    #[test]
    fn test_rebase_relative_urls() {
        let css = r#"a { background: url("img/a.png"), url('b.png'), url(c.png); }"#;

        assert_eq!(
            rebase_urls(css, Some("theme/")),
            r#"a { background: url("theme/img/a.png"), url('theme/b.png'), url(theme/c.png); }"#
        );
    }

    #[test]
    fn test_rebase_collapses_parent_segments() {
        assert_eq!(
            rebase_urls("url(../fonts/x.woff)", Some("parts/")),
            "url(fonts/x.woff)"
        );
    }

    #[test]
    fn test_absolute_and_special_urls_untouched() {
        let css = "url(/abs.png) url(http://x.com/a.png) url(data:image/png;base64,AA==) url(#svg) url(@{base}/a.png)";
        assert_eq!(rebase_urls(css, Some("theme/")), css);
    }

    #[test]
    fn test_no_rootpath_is_identity() {
        assert_eq!(rebase_urls("url(a.png)", None), "url(a.png)");
        assert_eq!(rebase_urls("url(a.png)", Some("")), "url(a.png)");
    }

    #[test]
    fn test_data_uri_inlines_resource() {
        let options = Options::default().to_compilation_options("css/main.less");
        let reader = MemoryReader::new().with_file("css/img/dot.png", vec![1u8, 2, 3]);
        let env = Environment::new(&options, FileContext::root(&options), &reader);

        let rewritten = rewrite("a { background: data-uri('img/dot.png'); }", &env);

        assert_eq!(rewritten, "a { background: url(\"data:image/png;base64,AQID\"); }");
    }

    #[test]
    fn test_data_uri_explicit_mime() {
        let options = Options::default().to_compilation_options("main.less");
        let reader = MemoryReader::new().with_file("x.bin", "hi");
        let env = Environment::new(&options, FileContext::root(&options), &reader);

        let rewritten = rewrite("data-uri(\"text/plain;base64\", \"x.bin\")", &env);

        assert_eq!(rewritten, "url(\"data:text/plain;base64,aGk=\")");
    }

    #[test]
    fn test_missing_data_uri_falls_back_to_rebased_url() {
        let options = Options {
            root_path: "r/".to_string(),
            ..Default::default()
        }
        .to_compilation_options("main.less");
        let reader = MemoryReader::new();
        let env = Environment::new(&options, FileContext::root(&options), &reader);

        assert_eq!(rewrite("data-uri('a.png')", &env), "url(\"r/a.png\")");
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(mime_type("a.SVG"), "image/svg+xml");
        assert_eq!(mime_type("font.woff2"), "font/woff2");
        assert_eq!(mime_type("noext"), "application/octet-stream");
    }
}
