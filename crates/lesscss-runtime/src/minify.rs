//! CSS minification using the grass crate.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Plain CSS is valid SCSS, so grass can re-emit rendered stylesheet output in
//! its compressed style. This is the post-processing step behind the
//! `minify` compile option.

use grass::{Options, OutputStyle};
use thiserror::Error;

/// Errors raised by a [`Minifier`].
#[derive(Debug, Error)]
pub enum MinifyError {
    /// grass rejected the input
    #[error("{0}")]
    Grass(String),
}

/// A post-processor that shrinks rendered CSS.
pub trait Minifier: Send + Sync {
    /// Minify `css`, returning the compressed text.
    fn minify(&self, css: &str) -> Result<String, MinifyError>;
}

/// Minifier backed by grass's compressed output style.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrassMinifier;

impl Minifier for GrassMinifier {
    fn minify(&self, css: &str) -> Result<String, MinifyError> {
        let options = Options::default().style(OutputStyle::Compressed);
        grass::from_string(css.to_string(), &options).map_err(|e| MinifyError::Grass(e.to_string()))
    }
}
