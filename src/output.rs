//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! articles (3 documents, 1 asset)
//!     2023-01-05-hello.md → content/articles/2023/01/hello/index.html
//!     2023-01-05-hello/diagram.png → content/articles/2023/01/hello/diagram.png
//! presentations (1 document)
//!     intro.md → content/presentations/intro.html
//! Listing
//!     index.html (3 records)
//! Static
//!     1 file copied
//!
//! Built 4 documents, 1 asset, 1 listing page, 1 static file → build
//! ```
//!
//! ## Watch
//!
//! ```text
//! ==> Change in articles: rebuilding category
//! ```
//!
//! # Architecture
//!
//! Each event or result has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.
//!
//! Document and asset events arrive from parallel workers, so lines within a
//! category appear in completion order.

use crate::build::{BuildEvent, BuildSummary};
use crate::watch::Trigger;
use std::path::Path;

// ============================================================================
// Helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 document`, `2 documents`.
fn count(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

/// Paths are shown with forward slashes on every platform.
fn display_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// Build events
// ============================================================================

/// Format a single build progress event as display lines.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::CategoryStarted {
            name,
            documents,
            assets,
        } => {
            let header = if *assets == 0 {
                format!("{} ({})", name, count(*documents, "document"))
            } else {
                format!(
                    "{} ({}, {})",
                    name,
                    count(*documents, "document"),
                    count(*assets, "asset")
                )
            };
            vec![header]
        }
        BuildEvent::DocumentWritten { source, output, .. } => {
            vec![format!(
                "{}{} \u{2192} {}",
                indent(1),
                source,
                display_path(output)
            )]
        }
        BuildEvent::AssetCopied { source, output, .. } => {
            vec![format!(
                "{}{} \u{2192} {}",
                indent(1),
                display_path(source),
                display_path(output)
            )]
        }
        BuildEvent::ListingPageWritten { file, records } => {
            let mut lines = Vec::new();
            if file == "index.html" {
                lines.push("Listing".to_string());
            }
            lines.push(format!("{}{} ({})", indent(1), file, count(*records, "record")));
            lines
        }
        BuildEvent::StaticCopied { files } => {
            vec![
                "Static".to_string(),
                format!("{}{} copied", indent(1), count(*files, "file")),
            ]
        }
    }
}

/// Print a build event to stdout.
pub fn print_build_event(event: &BuildEvent) {
    for line in format_build_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Summaries
// ============================================================================

/// Format the closing line of a build.
pub fn format_build_summary(summary: &BuildSummary, output: &Path) -> Vec<String> {
    let mut parts = vec![
        count(summary.documents, "document"),
        count(summary.assets, "asset"),
    ];
    if summary.listing_pages > 0 {
        parts.push(count(summary.listing_pages, "listing page"));
    }
    parts.push(count(summary.static_files, "static file"));

    vec![
        String::new(),
        format!("Built {} \u{2192} {}", parts.join(", "), output.display()),
    ]
}

pub fn print_build_summary(summary: &BuildSummary, output: &Path) {
    for line in format_build_summary(summary, output) {
        println!("{}", line);
    }
}

/// Format the result of `check`.
pub fn format_check_summary(summary: &BuildSummary) -> Vec<String> {
    let mut lines = vec![
        format!("Documents: {}", summary.documents),
        format!("Assets: {}", summary.assets),
    ];
    if summary.listing_pages > 0 {
        lines.push(format!(
            "Listing: {} across {}",
            count(summary.listed, "record"),
            count(summary.listing_pages, "page")
        ));
    }
    lines
}

pub fn print_check_summary(summary: &BuildSummary) {
    for line in format_check_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Watch
// ============================================================================

/// Format the line announcing a rebuild.
pub fn format_trigger(trigger: &Trigger) -> String {
    match trigger {
        Trigger::Config => "==> config.toml changed: full rebuild".to_string(),
        Trigger::Category(name) => format!("==> Change in {name}: rebuilding category"),
        Trigger::Static => "==> Change in static: copying static files".to_string(),
    }
}

/// Format a failed rebuild. Watching continues afterwards.
pub fn format_watch_error(error: &dyn std::error::Error) -> Vec<String> {
    vec![
        format!("Error: {error}"),
        format!("{}Waiting for changes...", indent(1)),
    ]
}

// ============================================================================
// Tests
// ============================================================================
