//! # dated-press
//!
//! A static site builder for dated writing. Documents are named
//! `YYYY-MM-DD-slug.md` (or `.html`), carry an optional header block with
//! their title and description, and are published under
//! `YYYY/MM/slug/index.html` together with their co-located assets. Every
//! dated document also contributes one record to a paginated, newest-first
//! listing (`index.html`, `index2.html`, …).
//!
//! # Pipeline
//!
//! ```text
//! scan ──► per-document tasks (parallel) ──► join ──► accumulate ──► paginate ──► listing pages
//!             parse name → extract header → render → compose → write
//! ```
//!
//! Per-document work is independent and runs on a rayon pool. The listing is
//! built only after every task has returned: records are appended in discovery
//! order and sorted once, so the result does not depend on which task finished
//! first. A single failing document fails the whole build and nothing is
//! published.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | `YYYY-MM-DD-slug.ext` filename parser |
//! | [`metadata`] | YAML / TOML header block extraction |
//! | [`paths`] | Output paths and listing URLs derived from parsed names |
//! | [`listing`] | Listing accumulator and paginator |
//! | [`render`] | Document body rendering (Markdown via pulldown-cmark) |
//! | [`templates`] | Page composition with compile-time maud templates |
//! | [`scan`] | Discovery of documents and co-located assets per category |
//! | [`build`] | Orchestration, staging, and the drain-then-finalize barrier |
//! | [`config`] | `config.toml` loading, merging, and validation |
//! | [`watch`] | Filesystem watching and scoped rebuilds |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Names Are the Source of Truth
//!
//! Dates and URLs come from filenames alone, never from header fields. Two
//! builds of the same tree produce the same links, and renaming a file is the
//! only way to move a document.
//!
//! ## Collaborators Are Injected
//!
//! [`render::Renderer`] and [`templates::Compositor`] are traits. The CLI uses
//! [`render::MarkdownRenderer`] and [`templates::MaudCompositor`], constructed
//! once and passed to [`build::Site`]; tests substitute their own.
//!
//! ## Publish Whole or Not at All
//!
//! Builds are written to a staging directory next to the output and swapped
//! in only on success, so a failed build never leaves a half-written listing
//! behind.

pub mod build;
pub mod config;
pub mod listing;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod paths;
pub mod render;
pub mod scan;
pub mod templates;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
