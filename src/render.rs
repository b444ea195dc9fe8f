//! Document body rendering.
//!
//! The pipeline only needs one capability from a renderer: turn a body in a
//! given source format into an HTML fragment. [`MarkdownRenderer`] is the
//! production implementation; tests swap in their own.

use crate::naming::Format;
use pulldown_cmark::{Options, Parser, html as md_html};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("render failed: {0}")]
    Failed(String),
}

/// Converts a document body into an HTML fragment.
///
/// Implementations must be deterministic: identical input yields identical
/// output.
pub trait Renderer: Sync {
    fn render(&self, body: &str, format: Format) -> Result<String, RenderError>;
}

/// Markdown via pulldown-cmark; HTML bodies pass through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    fn options() -> Options {
        Options::ENABLE_TABLES | Options::ENABLE_FOOTNOTES | Options::ENABLE_STRIKETHROUGH
    }
}

impl Renderer for MarkdownRenderer {
    fn render(&self, body: &str, format: Format) -> Result<String, RenderError> {
        match format {
            Format::Markdown => {
                let parser = Parser::new_ext(body, Self::options());
                let mut html = String::with_capacity(body.len() * 3 / 2);
                md_html::push_html(&mut html, parser);
                Ok(html)
            }
            Format::Html => Ok(body.to_string()),
        }
    }
}
