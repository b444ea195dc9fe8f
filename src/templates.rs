//! Template composition.
//!
//! Rendered document bodies are wrapped in full HTML pages here, and listing
//! pages are built from their records. Templates are compile-time
//! [maud](https://maud.lambda.xyz/) functions selected by name, so there is no
//! template directory to ship and every interpolation is escaped unless it is
//! explicitly marked as pre-rendered HTML.
//!
//! ## Templates
//!
//! | Name | Used for | Needs |
//! |------|----------|-------|
//! | `article` | dated documents | `contents`, `page` |
//! | `presentation` | flat documents | `contents`, `page` |
//! | `index` | listing pages | `listing` |
//!
//! The stylesheet in `static/style.css` is inlined into every page.

use crate::config::SiteInfo;
use crate::listing::{ListingPage, ListingRecord};
use crate::metadata::Metadata;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use thiserror::Error;

const CSS: &str = include_str!("../static/style.css");

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
    #[error("template '{0}' needs listing variables")]
    MissingListing(String),
    #[error("template failed: {0}")]
    Failed(String),
}

/// Everything a template can see.
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    /// Rendered HTML body of the document. Empty for listing pages.
    pub contents: &'a str,
    /// Header fields of the document being composed.
    pub page: &'a Metadata,
    pub site: &'a SiteInfo,
    /// Present only when composing a listing page.
    pub listing: Option<&'a ListingPage>,
}

/// Produces a complete page from a named template and its variables.
pub trait Compositor: Sync {
    fn compose(&self, name: &str, vars: &TemplateVars) -> Result<String, ComposeError>;
}

/// Built-in maud templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaudCompositor;

impl Compositor for MaudCompositor {
    fn compose(&self, name: &str, vars: &TemplateVars) -> Result<String, ComposeError> {
        let markup = match name {
            "article" => render_article(vars),
            "presentation" => render_presentation(vars),
            "index" => {
                let listing = vars
                    .listing
                    .ok_or_else(|| ComposeError::MissingListing(name.to_string()))?;
                render_index(listing, vars.site)
            }
            other => return Err(ComposeError::UnknownTemplate(other.to_string())),
        };
        Ok(markup.into_string())
    }
}

// ============================================================================
// Shared layout
// ============================================================================

fn base_document(title: &str, body_class: Option<&str>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(CSS)) }
            }
            body class=[body_class] {
                (content)
            }
        }
    }
}

fn site_header(site: &SiteInfo) -> Markup {
    html! {
        header.site-header {
            a href="/" { (site.title) }
            @if !site.description.is_empty() {
                p.site-description { (site.description) }
            }
        }
    }
}

fn page_title(page: &Metadata, site: &SiteInfo) -> String {
    match &page.title {
        Some(title) => format!("{title} · {}", site.title),
        None => site.title.clone(),
    }
}

// ============================================================================
// Document templates
// ============================================================================

fn render_article(vars: &TemplateVars) -> Markup {
    let content = html! {
        (site_header(vars.site))
        main {
            article {
                @if let Some(title) = &vars.page.title {
                    h1 { (title) }
                }
                @if let Some(description) = &vars.page.description {
                    p.page-description { (description) }
                }
                (PreEscaped(vars.contents))
            }
        }
    };
    base_document(&page_title(vars.page, vars.site), Some("article"), content)
}

fn render_presentation(vars: &TemplateVars) -> Markup {
    let content = html! {
        main {
            @if let Some(title) = &vars.page.title {
                h1 { (title) }
            }
            (PreEscaped(vars.contents))
        }
    };
    base_document(
        &page_title(vars.page, vars.site),
        Some("presentation"),
        content,
    )
}

// ============================================================================
// Listing
// ============================================================================

fn render_index(listing: &ListingPage, site: &SiteInfo) -> Markup {
    let content = html! {
        (site_header(site))
        main {
            ul.listing {
                @for record in &listing.records {
                    (render_record(record))
                }
            }
            nav.pagination {
                @if let Some(prev) = listing.prev_href() {
                    a rel="prev" href=(prev) { "← Newer" }
                } @else {
                    span {}
                }
                @if let Some(next) = listing.next_href() {
                    a rel="next" href=(next) { "Older →" }
                }
            }
        }
    };
    base_document(&site.title, Some("index"), content)
}

fn render_record(record: &ListingRecord) -> Markup {
    let title = record.title.as_deref().unwrap_or(&record.source_name);
    html! {
        li {
            h2 { a href=(record.url) { (title) } }
            time.listing-date datetime=(record.date) { (record.date) }
            @if let Some(description) = &record.description {
                p { (description) }
            }
        }
    }
}
