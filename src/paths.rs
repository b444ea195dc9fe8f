//! Output path derivation.
//!
//! Dated documents are flat in the source tree and nested in the output:
//!
//! ```text
//! content/articles/2023-01-05-hello.md          → articles/2023/01/hello/index.html
//! content/articles/2023-01-05-hello/diagram.png → articles/2023/01/hello/diagram.png
//! ```
//!
//! Only the dated directory component of an asset path is substituted;
//! deeper directories and the basename are kept as they are. Every function
//! here is pure: the same parsed name always yields the same path, which
//! keeps links stable across rebuilds.

use crate::naming::{self, DatedDir, DatedName, NameError};
use std::path::{Component, Path, PathBuf};

/// Output directory for a dated document, relative to its category.
pub fn dated_output_dir(name: &DatedName) -> PathBuf {
    dir_for(&name.date)
}

/// Output file for a dated document, relative to its category.
pub fn dated_document_path(name: &DatedName) -> PathBuf {
    dated_output_dir(name).join("index.html")
}

/// Public URL of a dated document: `/{YYYY}/{MM}/{slug}/`.
///
/// Depends only on the filename, never on document content.
pub fn listing_url(name: &DatedName) -> String {
    format!(
        "/{:04}/{:02}/{}/",
        name.year(),
        name.month(),
        name.slug()
    )
}

/// Output path for a co-located asset, relative to its category.
///
/// `relative` is the asset path relative to the category directory. Its
/// first component must be a dated directory (`YYYY-MM-DD-slug`).
pub fn asset_output_path(relative: &Path) -> Result<PathBuf, NameError> {
    let mut components = relative.components();
    let first = match components.next() {
        Some(Component::Normal(first)) => first.to_string_lossy(),
        _ => {
            return Err(NameError::UnparseableDir(
                relative.to_string_lossy().into_owned(),
            ));
        }
    };
    let rest = components.as_path();
    if rest.as_os_str().is_empty() {
        // A bare file at the category root has no dated directory to map.
        return Err(NameError::UnparseableDir(first.into_owned()));
    }
    let dated = naming::parse_dated_dir(&first)?;
    Ok(dir_for(&dated).join(rest))
}

/// Output file for a document in a flat category: `intro.md` → `intro.html`.
pub fn flat_document_path(file_name: &str) -> PathBuf {
    Path::new(file_name).with_extension("html")
}

fn dir_for(date: &DatedDir) -> PathBuf {
    PathBuf::from(format!("{:04}", date.year))
        .join(format!("{:02}", date.month))
        .join(&date.slug)
}
