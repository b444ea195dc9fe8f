//! Content discovery.
//!
//! Finds the documents and co-located assets of one category:
//!
//! ```text
//! content/articles/                      # category directory
//! ├── 2023-01-05-hello.md                # document (md or html, top level only)
//! ├── 2023-01-06-slides-recap.html       # document
//! ├── notes.txt                          # ignored: not a document extension
//! ├── .draft.md                          # ignored: hidden
//! └── 2023-01-05-hello/                  # asset directory (dated layout only)
//!     ├── diagram.png                    # asset: extension listed in config
//!     └── scratch.psd                    # ignored: extension not listed
//! ```
//!
//! Scanning only looks at names. Filenames are not parsed and files are not
//! read here; both happen per document during the build so that a bad name
//! is reported against the document that carries it.
//!
//! Results are sorted by path, which fixes the discovery order the listing
//! falls back on for documents sharing a date.

use crate::config::{CategoryConfig, Layout};
use crate::naming::Format;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A document found directly in a category directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Filename, e.g. `2023-01-05-hello.md`.
    pub name: String,
    pub path: PathBuf,
}

impl SourceDocument {
    /// Raw file contents. Read when the document is processed, not at scan time.
    pub fn bytes(&self) -> std::io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

/// A file inside an asset directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAsset {
    /// Path relative to the category directory, e.g. `2023-01-05-hello/diagram.png`.
    pub relative: PathBuf,
    pub path: PathBuf,
}

/// Everything discovered for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryScan {
    pub documents: Vec<SourceDocument>,
    pub assets: Vec<SourceAsset>,
}

impl CategoryScan {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.assets.is_empty()
    }
}

/// Scan `content_dir/name` according to the category's settings.
///
/// A missing category directory is an empty category, not an error.
pub fn scan_category(
    content_dir: &Path,
    name: &str,
    category: &CategoryConfig,
) -> Result<CategoryScan, ScanError> {
    let dir = content_dir.join(name);
    if !dir.is_dir() {
        return Ok(CategoryScan::default());
    }

    let documents = collect_documents(&dir)?;
    let assets = match category.layout {
        Layout::Dated => collect_assets(&dir, &category.assets)?,
        Layout::Flat => Vec::new(),
    };

    Ok(CategoryScan { documents, assets })
}

fn collect_documents(dir: &Path) -> Result<Vec<SourceDocument>, ScanError> {
    let mut documents = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) || !is_document(&name) {
            continue;
        }
        documents.push(SourceDocument {
            name,
            path: entry.path(),
        });
    }
    documents.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(documents)
}

fn collect_assets(dir: &Path, extensions: &[String]) -> Result<Vec<SourceAsset>, ScanError> {
    if extensions.is_empty() {
        return Ok(Vec::new());
    }

    let mut assets = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(&e.file_name().to_string_lossy()));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || !has_extension(entry.path(), extensions) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .to_path_buf();
        assets.push(SourceAsset {
            relative,
            path: entry.into_path(),
        });
    }
    assets.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(assets)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn is_document(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(Format::from_extension)
        .is_some()
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().map(|e| e.to_string_lossy()) else {
        return false;
    };
    extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(&ext))
}
