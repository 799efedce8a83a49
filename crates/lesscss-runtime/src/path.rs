//! POSIX-style path helpers for stylesheet locations.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Stylesheet locations are strings, not `std::path::Path`s: they may be URLs,
//! they always use `/` in generated output, and they must resolve identically
//! on every platform. Both `/` and `\` are accepted as separators on input.

use once_cell::sync::Lazy;
use regex::Regex;

const SEPARATORS: [char; 2] = ['/', '\\'];

/// Matches a URL scheme prefix such as `http:` or `data:`.
static SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").unwrap());

/// Whether `path` carries a URL scheme prefix (`http:`, `data:`, `file:`...).
pub fn has_scheme(path: &str) -> bool {
    SCHEME.is_match(path)
}

/// Whether `path` is absolute: rooted at a separator or carrying a scheme.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with(SEPARATORS) || has_scheme(path)
}

/// Join `path` onto `base`, collapsing `.` and `..` segments.
///
/// - Empty and `.` segments are dropped.
/// - `..` pops the preceding segment.
/// - In an absolute result, `..` at the root is a no-op.
/// - In a relative result, a `..` with nothing left to pop is kept.
///
/// The result uses `/` separators and never has a trailing separator. When
/// `base` is a URL, its `scheme://host` prefix is kept and the rest is joined
/// as an absolute path.
///
/// # Example
///
/// ```
/// use lesscss_runtime::path::join;
///
/// assert_eq!(join("css/", "../img/a.png"), "img/a.png");
/// assert_eq!(join("/", "../a.less"), "/a.less");
/// assert_eq!(join("a/..", ""), "");
/// assert_eq!(
///     join("http://cdn.example.com/lib/", "vars.less"),
///     "http://cdn.example.com/lib/vars.less"
/// );
/// ```
pub fn join(base: &str, path: &str) -> String {
    if let Some((origin, rest)) = split_origin(base) {
        let rest = if rest.is_empty() { "/" } else { rest };
        return format!("{}{}", origin, join_segments(rest, path));
    }
    join_segments(base, path)
}

/// Split a URL into its `scheme://host` origin and the path after it.
fn split_origin(base: &str) -> Option<(&str, &str)> {
    if !has_scheme(base) {
        return None;
    }
    let authority = base.find("://")? + 3;
    let end = base[authority..]
        .find(SEPARATORS)
        .map_or(base.len(), |index| authority + index);
    Some(base.split_at(end))
}

fn join_segments(base: &str, path: &str) -> String {
    let absolute = if base.is_empty() {
        path.starts_with(SEPARATORS)
    } else {
        base.starts_with(SEPARATORS)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split(SEPARATORS).chain(path.split(SEPARATORS)) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            _ => segments.push(segment),
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Normalize a single location. Locations with a scheme are returned verbatim.
pub fn normalize(path: &str) -> String {
    if has_scheme(path) {
        path.to_string()
    } else {
        join("", path)
    }
}

/// Directory portion of `path` without the trailing separator (`""` if none).
pub fn dirname(path: &str) -> &str {
    match path.rfind(SEPARATORS) {
        Some(index) => &path[..index],
        None => "",
    }
}

/// Directory portion of `path` including the trailing separator (`""` if none).
pub fn directory_of(path: &str) -> String {
    match path.rfind(SEPARATORS) {
        Some(index) => path[..=index].to_string(),
        None => String::new(),
    }
}

/// Final segment of `path`.
pub fn basename(path: &str) -> &str {
    match path.rfind(SEPARATORS) {
        Some(index) => &path[index + 1..],
        None => path,
    }
}

/// Extension of the final segment, without the dot.
///
/// A leading dot (`.hidden`) is not treated as an extension.
pub fn extension(path: &str) -> Option<&str> {
    let name = basename(path);
    match name.rfind('.') {
        Some(index) if index > 0 && index + 1 < name.len() => Some(&name[index + 1..]),
        _ => None,
    }
}
