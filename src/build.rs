//! Build orchestration.
//!
//! Turns a project root into a finished site:
//!
//! ```text
//! content/<category>/   →  scan  →  per-document tasks (rayon)  →  content/<category>/…
//!                                          │
//!                                          └─ ListingRecord per dated document
//!                                                  │  join barrier
//!                                                  ▼
//!                                   ListingAccumulator → paginate → index*.html
//! static/               →  copied verbatim  →  static/
//! ```
//!
//! ## Drain, then finalize
//!
//! Each document is processed by an independent task that reads, extracts,
//! renders, composes and writes it, then returns its listing record. Tasks
//! never touch shared state. The coordinator collects every result (the
//! parallel collect returns only once all tasks are done), appends the
//! records to the accumulator in discovery order, and only then paginates.
//! The first failing document aborts the build.
//!
//! ## Staging
//!
//! Everything is written to a sibling staging directory
//! (`build` → `.build.staging`) which replaces the output directory only when
//! the whole build succeeded. A failed build removes the staging directory and
//! leaves the previous output as it was, so a partial listing is never
//! published.
//!
//! Scoped rebuilds ([`Site::build_category`], [`Site::copy_static`]) stage
//! just their part and swap only that part into the existing output.

use crate::config::{self, CategoryConfig, ConfigError, Layout, SiteConfig};
use crate::listing::{self, ListingAccumulator, ListingRecord};
use crate::metadata::{self, Metadata, MetadataError};
use crate::naming::{self, Format, NameError};
use crate::paths;
use crate::render::{MarkdownRenderer, RenderError, Renderer};
use crate::scan::{self, CategoryScan, ScanError, SourceAsset, SourceDocument};
use crate::templates::{ComposeError, Compositor, MaudCompositor, TemplateVars};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

/// Template used for listing pages.
pub const LISTING_TEMPLATE: &str = "index";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("{}: {source}", .file.display())]
    Name { file: PathBuf, source: NameError },
    #[error("{}: could not read: {source}", .file.display())]
    Read {
        file: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: not valid UTF-8", .file.display())]
    Encoding { file: PathBuf },
    #[error("{}: {source}", .file.display())]
    Metadata {
        file: PathBuf,
        source: MetadataError,
    },
    #[error("{}: {source}", .file.display())]
    Render { file: PathBuf, source: RenderError },
    #[error("{}: {source}", .file.display())]
    Compose { file: PathBuf, source: ComposeError },
    #[error("copy {} → {}: {source}", .from.display(), .to.display())]
    AssetCopy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[error(
        "{} and {} both write {}",
        .first.display(),
        .second.display(),
        .output.display()
    )]
    OutputCollision {
        first: PathBuf,
        second: PathBuf,
        output: PathBuf,
    },
    #[error("Unknown category: {0}")]
    UnknownCategory(String),
    #[error("Refusing to use {} as output directory", .0.display())]
    InvalidOutput(PathBuf),
}

/// Progress reported while building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// A category was scanned and is about to be processed.
    CategoryStarted {
        name: String,
        documents: usize,
        assets: usize,
    },
    /// A document page was written. Paths are relative to the output root.
    DocumentWritten {
        category: String,
        source: String,
        output: PathBuf,
    },
    /// A co-located asset was copied. Paths are relative to the output root.
    AssetCopied {
        category: String,
        source: PathBuf,
        output: PathBuf,
    },
    /// A listing page was written.
    ListingPageWritten {
        file: String,
        records: usize,
    },
    /// The static directory was copied.
    StaticCopied { files: usize },
}

/// Counts for a finished build or check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub documents: usize,
    pub assets: usize,
    /// Records in the listing.
    pub listed: usize,
    pub listing_pages: usize,
    pub static_files: usize,
}

/// A project root, its configuration, and the collaborators used to build it.
pub struct Site<R = MarkdownRenderer, C = MaudCompositor> {
    config: SiteConfig,
    root: PathBuf,
    output: PathBuf,
    renderer: R,
    compositor: C,
}

impl Site {
    /// Load `config.toml` from `root` and use the built-in renderer and templates.
    pub fn load(root: &Path, output: &Path) -> Result<Self, BuildError> {
        let config = config::load_config(root)?;
        Ok(Self::with_parts(
            config,
            root,
            output,
            MarkdownRenderer,
            MaudCompositor,
        ))
    }
}

impl<R: Renderer, C: Compositor> Site<R, C> {
    pub fn with_parts(
        config: SiteConfig,
        root: &Path,
        output: &Path,
        renderer: R,
        compositor: C,
    ) -> Self {
        Self {
            config,
            root: root.to_path_buf(),
            output: output.to_path_buf(),
            renderer,
            compositor,
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn content_dir(&self) -> PathBuf {
        self.root.join("content")
    }

    pub fn static_dir(&self) -> PathBuf {
        self.root.join("static")
    }

    /// Re-read `config.toml`. On error the current config is kept.
    pub fn reload_config(&mut self) -> Result<(), BuildError> {
        self.config = config::load_config(&self.root)?;
        Ok(())
    }

    // ========================================================================
    // Full build
    // ========================================================================

    /// Build every category, the listing, and static files.
    ///
    /// The output directory is replaced only if everything succeeded.
    pub fn build_all(&self, events: Option<Sender<BuildEvent>>) -> Result<BuildSummary, BuildError> {
        let staging = self.prepare_staging()?;
        match self.build_all_into(&staging, events.as_ref()) {
            Ok(summary) => {
                replace_dir(&staging, &self.output)?;
                Ok(summary)
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                Err(e)
            }
        }
    }

    fn build_all_into(
        &self,
        staging: &Path,
        events: Option<&Sender<BuildEvent>>,
    ) -> Result<BuildSummary, BuildError> {
        let mut summary = BuildSummary::default();
        let mut accumulator = ListingAccumulator::new();

        for (name, category) in &self.config.categories {
            let built = self.build_category_into(staging, name, category, events)?;
            summary.documents += built.documents;
            summary.assets += built.assets;
            if self.config.listed_category() == Some(name.as_str()) {
                accumulator.extend(built.records);
            }
        }

        if self.config.listed_category().is_some() {
            summary.listed = accumulator.len();
            summary.listing_pages = self.write_listing(staging, accumulator, events)?;
        }

        summary.static_files = self.copy_static_into(staging, events)?;
        Ok(summary)
    }

    // ========================================================================
    // Scoped rebuilds
    // ========================================================================

    /// Rebuild one category, plus the listing when that category feeds it.
    ///
    /// Only `content/<name>` and the listing pages of the existing output are
    /// replaced; everything else is left alone.
    pub fn build_category(
        &self,
        name: &str,
        events: Option<Sender<BuildEvent>>,
    ) -> Result<BuildSummary, BuildError> {
        let category = self
            .config
            .categories
            .get(name)
            .ok_or_else(|| BuildError::UnknownCategory(name.to_string()))?;
        let listed = self.config.listed_category() == Some(name);

        let staging = self.prepare_staging()?;
        let result = self
            .build_category_into(&staging, name, category, events.as_ref())
            .and_then(|built| {
                let mut summary = BuildSummary {
                    documents: built.documents,
                    assets: built.assets,
                    ..BuildSummary::default()
                };
                if listed {
                    let mut accumulator = ListingAccumulator::new();
                    accumulator.extend(built.records);
                    summary.listed = accumulator.len();
                    summary.listing_pages =
                        self.write_listing(&staging, accumulator, events.as_ref())?;
                }
                Ok(summary)
            });

        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(e);
            }
        };

        fs::create_dir_all(&self.output)?;
        let category_rel = Path::new("content").join(name);
        replace_dir(&staging.join(&category_rel), &self.output.join(&category_rel))?;
        if listed {
            promote_listing(&staging, &self.output)?;
        }
        fs::remove_dir_all(&staging)?;
        Ok(summary)
    }

    /// Copy `static/` into the output's `static/`, replacing what was there.
    pub fn copy_static(&self, events: Option<Sender<BuildEvent>>) -> Result<usize, BuildError> {
        let staging = self.prepare_staging()?;
        let files = match self.copy_static_into(&staging, events.as_ref()) {
            Ok(files) => files,
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(e);
            }
        };
        fs::create_dir_all(&self.output)?;
        replace_dir(&staging.join("static"), &self.output.join("static"))?;
        fs::remove_dir_all(&staging)?;
        Ok(files)
    }

    // ========================================================================
    // Check
    // ========================================================================

    /// Scan every category and parse every name and header block without
    /// rendering or writing anything.
    pub fn check(&self) -> Result<BuildSummary, BuildError> {
        let mut summary = BuildSummary::default();
        for (name, category) in &self.config.categories {
            let scan = scan::scan_category(&self.content_dir(), name, category)?;
            let documents = plan_documents(&scan, category.layout)?;
            let assets = plan_assets(&scan)?;
            check_collisions(&Path::new("content").join(name), &documents, &assets)?;
            let records = documents
                .par_iter()
                .map(|planned| {
                    let text = read_text(planned.doc)?;
                    let extracted =
                        metadata::extract(&text).map_err(|source| BuildError::Metadata {
                            file: planned.doc.path.clone(),
                            source,
                        })?;
                    Ok(planned
                        .dated
                        .as_ref()
                        .map(|d| listing_record(d, &extracted.metadata)))
                })
                .collect::<Result<Vec<_>, BuildError>>()?;

            summary.documents += scan.documents.len();
            summary.assets += scan.assets.len();
            if self.config.listed_category() == Some(name.as_str()) {
                let listed = records.into_iter().flatten().count();
                summary.listed += listed;
                summary.listing_pages = listed.div_ceil(self.config.listing.page_size).max(1);
            }
        }
        Ok(summary)
    }

    // ========================================================================
    // Category processing
    // ========================================================================

    fn build_category_into(
        &self,
        staging: &Path,
        name: &str,
        category: &CategoryConfig,
        events: Option<&Sender<BuildEvent>>,
    ) -> Result<BuiltCategory, BuildError> {
        let scan: CategoryScan = scan::scan_category(&self.content_dir(), name, category)?;
        emit(
            events,
            BuildEvent::CategoryStarted {
                name: name.to_string(),
                documents: scan.documents.len(),
                assets: scan.assets.len(),
            },
        );

        let category_rel = Path::new("content").join(name);
        // Every output path is known before any task writes.
        let documents = plan_documents(&scan, category.layout)?;
        let assets = plan_assets(&scan)?;
        check_collisions(&category_rel, &documents, &assets)?;

        let out_dir = staging.join(&category_rel);
        if !scan.is_empty() {
            fs::create_dir_all(&out_dir)?;
        }

        let results = documents
            .par_iter()
            .map(|planned| {
                self.process_document(planned, name, category, &out_dir, &category_rel, events)
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        assets
            .par_iter()
            .map(|planned| copy_asset(planned, name, &out_dir, &category_rel, events))
            .collect::<Result<Vec<()>, BuildError>>()?;

        // Every task has returned; append in discovery order.
        Ok(BuiltCategory {
            documents: scan.documents.len(),
            assets: scan.assets.len(),
            records: results.into_iter().flatten().collect(),
        })
    }

    /// Read, extract, render, compose and write one document.
    ///
    /// Returns the listing record for dated documents.
    fn process_document(
        &self,
        planned: &PlannedDocument<'_>,
        category_name: &str,
        category: &CategoryConfig,
        out_dir: &Path,
        category_rel: &Path,
        events: Option<&Sender<BuildEvent>>,
    ) -> Result<Option<ListingRecord>, BuildError> {
        let doc = planned.doc;
        let text = read_text(doc)?;
        let extracted = metadata::extract(&text).map_err(|source| BuildError::Metadata {
            file: doc.path.clone(),
            source,
        })?;

        let contents = self
            .renderer
            .render(extracted.body, planned.format)
            .map_err(|source| BuildError::Render {
                file: doc.path.clone(),
                source,
            })?;

        let vars = TemplateVars {
            contents: &contents,
            page: &extracted.metadata,
            site: &self.config.site,
            listing: None,
        };
        let page = self
            .compositor
            .compose(&category.template, &vars)
            .map_err(|source| BuildError::Compose {
                file: doc.path.clone(),
                source,
            })?;

        let dest = out_dir.join(&planned.relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, page)?;

        emit(
            events,
            BuildEvent::DocumentWritten {
                category: category_name.to_string(),
                source: doc.name.clone(),
                output: category_rel.join(&planned.relative),
            },
        );

        Ok(planned
            .dated
            .as_ref()
            .map(|name| listing_record(name, &extracted.metadata)))
    }

    // ========================================================================
    // Listing
    // ========================================================================

    /// Finalize the accumulator and write every listing page into `dir`.
    fn write_listing(
        &self,
        dir: &Path,
        accumulator: ListingAccumulator,
        events: Option<&Sender<BuildEvent>>,
    ) -> Result<usize, BuildError> {
        let pages = listing::paginate(accumulator.finalize(), self.config.listing.page_size);
        let page_meta = Metadata::default();

        for page in &pages {
            let file = page.file_name();
            let vars = TemplateVars {
                contents: "",
                page: &page_meta,
                site: &self.config.site,
                listing: Some(page),
            };
            let html = self
                .compositor
                .compose(LISTING_TEMPLATE, &vars)
                .map_err(|source| BuildError::Compose {
                    file: PathBuf::from(&file),
                    source,
                })?;
            fs::create_dir_all(dir)?;
            fs::write(dir.join(&file), html)?;
            emit(
                events,
                BuildEvent::ListingPageWritten {
                    file,
                    records: page.records.len(),
                },
            );
        }
        Ok(pages.len())
    }

    // ========================================================================
    // Static files and staging
    // ========================================================================

    fn copy_static_into(
        &self,
        dest_root: &Path,
        events: Option<&Sender<BuildEvent>>,
    ) -> Result<usize, BuildError> {
        let src = self.static_dir();
        if !src.is_dir() {
            return Ok(0);
        }
        let dest = dest_root.join("static");
        fs::create_dir_all(&dest)?;

        let mut files = 0;
        for entry in WalkDir::new(&src).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| BuildError::Scan(ScanError::Walk(e)))?;
            let relative = entry.path().strip_prefix(&src).unwrap_or(entry.path());
            let target = dest.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else if entry.file_type().is_file() {
                fs::copy(entry.path(), &target).map_err(|source| BuildError::AssetCopy {
                    from: entry.path().to_path_buf(),
                    to: target.clone(),
                    source,
                })?;
                files += 1;
            }
        }
        emit(events, BuildEvent::StaticCopied { files });
        Ok(files)
    }

    /// Staging directory next to the output: `build` → `.build.staging`.
    pub fn staging_dir(&self) -> Result<PathBuf, BuildError> {
        let name = self
            .output
            .file_name()
            .ok_or_else(|| BuildError::InvalidOutput(self.output.clone()))?;
        if self.root.starts_with(&self.output) {
            return Err(BuildError::InvalidOutput(self.output.clone()));
        }
        Ok(self
            .output
            .with_file_name(format!(".{}.staging", name.to_string_lossy())))
    }

    fn prepare_staging(&self) -> Result<PathBuf, BuildError> {
        let staging = self.staging_dir()?;
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        Ok(staging)
    }
}

/// A document whose name is parsed and whose output path is decided.
struct PlannedDocument<'a> {
    doc: &'a SourceDocument,
    dated: Option<naming::DatedName>,
    format: Format,
    /// Output file relative to the category.
    relative: PathBuf,
}

/// An asset and its output path relative to the category.
struct PlannedAsset<'a> {
    asset: &'a SourceAsset,
    relative: PathBuf,
}

struct BuiltCategory {
    documents: usize,
    assets: usize,
    records: Vec<ListingRecord>,
}

fn emit(events: Option<&Sender<BuildEvent>>, event: BuildEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is listening.
        let _ = tx.send(event);
    }
}

fn plan_documents(scan: &CategoryScan, layout: Layout) -> Result<Vec<PlannedDocument<'_>>, BuildError> {
    scan.documents
        .iter()
        .map(|doc| {
            let (dated, format) = document_name(doc, layout)?;
            let relative = match &dated {
                Some(name) => paths::dated_document_path(name),
                None => paths::flat_document_path(&doc.name),
            };
            Ok(PlannedDocument {
                doc,
                dated,
                format,
                relative,
            })
        })
        .collect()
}

fn plan_assets(scan: &CategoryScan) -> Result<Vec<PlannedAsset<'_>>, BuildError> {
    scan.assets
        .iter()
        .map(|asset| {
            let relative =
                paths::asset_output_path(&asset.relative).map_err(|source| BuildError::Name {
                    file: asset.path.clone(),
                    source,
                })?;
            Ok(PlannedAsset { asset, relative })
        })
        .collect()
}

/// Fail when two sources of one category map to the same output file.
///
/// `2023-01-05-hello.md` and `2023-01-20-hello.md` both become
/// `2023/01/hello/index.html`, and `intro.md` and `intro.html` both become
/// `intro.html`. Sources are visited in discovery order, so `first` is stable.
fn check_collisions(
    category_rel: &Path,
    documents: &[PlannedDocument<'_>],
    assets: &[PlannedAsset<'_>],
) -> Result<(), BuildError> {
    let outputs = documents
        .iter()
        .map(|d| (d.relative.as_path(), d.doc.path.as_path()))
        .chain(
            assets
                .iter()
                .map(|a| (a.relative.as_path(), a.asset.path.as_path())),
        );
    let mut seen: HashMap<&Path, &Path> = HashMap::new();
    for (output, source) in outputs {
        if let Some(first) = seen.insert(output, source) {
            return Err(BuildError::OutputCollision {
                first: first.to_path_buf(),
                second: source.to_path_buf(),
                output: category_rel.join(output),
            });
        }
    }
    Ok(())
}

/// Parse a document's filename according to its category layout.
fn document_name(
    doc: &SourceDocument,
    layout: Layout,
) -> Result<(Option<naming::DatedName>, Format), BuildError> {
    let name_error = |source| BuildError::Name {
        file: doc.path.clone(),
        source,
    };
    match layout {
        Layout::Dated => {
            let name = naming::parse_dated_name(&doc.name).map_err(name_error)?;
            let format = name.format;
            Ok((Some(name), format))
        }
        Layout::Flat => {
            let format = Path::new(&doc.name)
                .extension()
                .and_then(|e| e.to_str())
                .and_then(Format::from_extension)
                .ok_or_else(|| name_error(NameError::Unparseable(doc.name.clone())))?;
            Ok((None, format))
        }
    }
}

fn read_text(doc: &SourceDocument) -> Result<String, BuildError> {
    let bytes = doc.bytes().map_err(|source| BuildError::Read {
        file: doc.path.clone(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| BuildError::Encoding {
        file: doc.path.clone(),
    })
}

fn listing_record(name: &naming::DatedName, meta: &Metadata) -> ListingRecord {
    ListingRecord::new(name, meta.title.clone(), meta.description.clone())
}

fn copy_asset(
    planned: &PlannedAsset<'_>,
    category: &str,
    out_dir: &Path,
    category_rel: &Path,
    events: Option<&Sender<BuildEvent>>,
) -> Result<(), BuildError> {
    let asset = planned.asset;
    let dest = out_dir.join(&planned.relative);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(&asset.path, &dest).map_err(|source| BuildError::AssetCopy {
        from: asset.path.clone(),
        to: dest.clone(),
        source,
    })?;
    emit(
        events,
        BuildEvent::AssetCopied {
            category: category.to_string(),
            source: asset.relative.clone(),
            output: category_rel.join(&planned.relative),
        },
    );
    Ok(())
}

/// Replace `to` with `from`. A missing `from` just removes `to`.
fn replace_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    if to.exists() {
        fs::remove_dir_all(to)?;
    }
    if !from.exists() {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(from, to)
}

/// Swap the staged listing pages into `output`, dropping stale ones.
fn promote_listing(staging: &Path, output: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(output)? {
        let entry = entry?;
        if entry.file_type()?.is_file()
            && listing::is_listing_file_name(&entry.file_name().to_string_lossy())
        {
            fs::remove_file(entry.path())?;
        }
    }
    for entry in fs::read_dir(staging)? {
        let entry = entry?;
        if entry.file_type()?.is_file()
            && listing::is_listing_file_name(&entry.file_name().to_string_lossy())
        {
            fs::rename(entry.path(), output.join(entry.file_name()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use std::sync::mpsc;
    use tempfile::TempDir;

    /// Fails any document whose rendered body contains the marker.
    struct FailingCompositor {
        marker: &'static str,
    }

    impl Compositor for FailingCompositor {
        fn compose(&self, name: &str, vars: &TemplateVars) -> Result<String, ComposeError> {
            if vars.contents.contains(self.marker) {
                return Err(ComposeError::Failed(format!("{name}: marker found")));
            }
            MaudCompositor.compose(name, vars)
        }
    }

    /// Echoes the body so tests can assert on exact output.
    struct EchoRenderer;

    impl Renderer for EchoRenderer {
        fn render(&self, body: &str, _format: Format) -> Result<String, RenderError> {
            Ok(body.to_string())
        }
    }

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn render(&self, _body: &str, _format: Format) -> Result<String, RenderError> {
            Err(RenderError::Failed("boom".to_string()))
        }
    }

    /// Plants a directory where an asset copy will land, so the copy fails.
    struct SquattingRenderer {
        squat: PathBuf,
    }

    impl Renderer for SquattingRenderer {
        fn render(&self, body: &str, format: Format) -> Result<String, RenderError> {
            fs::create_dir_all(&self.squat).map_err(|e| RenderError::Failed(e.to_string()))?;
            MarkdownRenderer.render(body, format)
        }
    }

    fn site_at(tmp: &TempDir) -> Site {
        Site::load(tmp.path(), &tmp.path().join("build")).unwrap()
    }

    fn article(tmp: &TempDir, file: &str, title: &str) {
        write_file(
            tmp.path(),
            &format!("content/articles/{file}"),
            &format!("---\ntitle: {title}\ndescription: about {title}\n---\nBody of {title}.\n"),
        );
    }

    // =========================================================================
    // Full build
    // =========================================================================

    #[test]
    fn builds_fixture_site() {
        let tmp = setup_fixtures();
        let site = site_at(&tmp);
        let summary = site.build_all(None).unwrap();

        let out = tmp.path().join("build");
        assert!(out.join("content/articles/2023/01/hello/index.html").is_file());
        assert!(out.join("content/articles/2023/01/hello/diagram.png").is_file());
        assert!(out.join("content/articles/2023/01/slides-recap/index.html").is_file());
        assert!(out.join("content/articles/2023/02/winter-notes/index.html").is_file());
        assert!(out.join("content/presentations/intro.html").is_file());
        assert!(out.join("static/styles/site.css").is_file());
        assert!(out.join("index.html").is_file());
        assert!(!out.join("index2.html").exists());

        assert_eq!(summary.documents, 4);
        assert_eq!(summary.assets, 1);
        assert_eq!(summary.listed, 3);
        assert_eq!(summary.listing_pages, 1);
        assert_eq!(summary.static_files, 1);
        assert!(!site.staging_dir().unwrap().exists());
    }

    #[test]
    fn header_block_does_not_reach_page() {
        let tmp = setup_fixtures();
        site_at(&tmp).build_all(None).unwrap();
        let html = read_output(&tmp, "content/articles/2023/01/hello/index.html");
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(!html.contains("title: Hello"));
    }

    #[test]
    fn listing_is_newest_first() {
        let tmp = setup_fixtures();
        site_at(&tmp).build_all(None).unwrap();
        let html = read_output(&tmp, "index.html");
        let winter = html.find("/2023/02/winter-notes/").unwrap();
        let recap = html.find("/2023/01/slides-recap/").unwrap();
        let hello = html.find("/2023/01/hello/").unwrap();
        assert!(winter < recap && recap < hello);
    }

    #[test]
    fn seven_articles_make_two_pages() {
        let tmp = TempDir::new().unwrap();
        for day in 1..=7 {
            article(&tmp, &format!("2023-03-{day:02}-post-{day}.md"), &format!("Post {day}"));
        }
        let summary = site_at(&tmp).build_all(None).unwrap();
        assert_eq!(summary.listing_pages, 2);

        let first = read_output(&tmp, "index.html");
        let second = read_output(&tmp, "index2.html");
        assert_eq!(first.matches("<li>").count(), 5);
        assert_eq!(second.matches("<li>").count(), 2);
        assert!(first.contains("Post 7"));
        assert!(second.contains("Post 1"));
        assert!(first.contains(r#"href="index2.html""#));
        assert!(!tmp.path().join("build/index3.html").exists());
    }

    #[test]
    fn empty_site_still_has_index() {
        let tmp = TempDir::new().unwrap();
        let summary = site_at(&tmp).build_all(None).unwrap();
        assert_eq!(summary.listing_pages, 1);
        assert_eq!(summary.listed, 0);
        assert!(tmp.path().join("build/index.html").is_file());
    }

    #[test]
    fn disabled_listing_writes_no_index() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "config.toml", "[listing]\ncategory = \"\"\n");
        article(&tmp, "2023-01-05-a.md", "A");
        let summary = site_at(&tmp).build_all(None).unwrap();
        assert_eq!(summary.listing_pages, 0);
        assert!(!tmp.path().join("build/index.html").exists());
        assert!(tmp.path().join("build/content/articles/2023/01/a/index.html").is_file());
    }

    #[test]
    fn rebuild_replaces_previous_output() {
        let tmp = setup_fixtures();
        let site = site_at(&tmp);
        site.build_all(None).unwrap();
        write_file(tmp.path(), "build/leftover.txt", "stale");
        site.build_all(None).unwrap();
        assert!(!tmp.path().join("build/leftover.txt").exists());
        assert!(tmp.path().join("build/index.html").is_file());
    }

    #[test]
    fn builds_are_deterministic() {
        let tmp = setup_fixtures();
        let site = site_at(&tmp);
        site.build_all(None).unwrap();
        let first = read_output(&tmp, "index.html");
        site.build_all(None).unwrap();
        assert_eq!(first, read_output(&tmp, "index.html"));
    }

    #[test]
    fn events_cover_every_output() {
        let tmp = setup_fixtures();
        let (tx, rx) = mpsc::channel();
        site_at(&tmp).build_all(Some(tx)).unwrap();
        let events: Vec<BuildEvent> = rx.into_iter().collect();

        let documents = events
            .iter()
            .filter(|e| matches!(e, BuildEvent::DocumentWritten { .. }))
            .count();
        assert_eq!(documents, 4);
        assert!(events.contains(&BuildEvent::AssetCopied {
            category: "articles".to_string(),
            source: Path::new("2023-01-05-hello").join("diagram.png"),
            output: Path::new("content/articles/2023/01/hello/diagram.png").to_path_buf(),
        }));
        assert!(events.contains(&BuildEvent::ListingPageWritten {
            file: "index.html".to_string(),
            records: 3,
        }));
        assert!(events.contains(&BuildEvent::StaticCopied { files: 1 }));
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn bad_filename_fails_build_and_keeps_previous_output() {
        let tmp = setup_fixtures();
        let site = site_at(&tmp);
        site.build_all(None).unwrap();
        let before = read_output(&tmp, "index.html");

        write_file(tmp.path(), "content/articles/hello.md", "no date");
        let err = site.build_all(None).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Name { ref file, source: NameError::Unparseable(_) }
                if file.ends_with("hello.md")
        ));
        assert_eq!(read_output(&tmp, "index.html"), before);
        assert!(!site.staging_dir().unwrap().exists());
    }

    #[test]
    fn failed_first_build_leaves_no_output() {
        let tmp = TempDir::new().unwrap();
        article(&tmp, "2023-01-05-a.md", "A");
        write_file(tmp.path(), "content/articles/2023-13-01-b.md", "bad month");
        let site = site_at(&tmp);
        assert!(matches!(
            site.build_all(None),
            Err(BuildError::Name {
                source: NameError::InvalidDate { .. },
                ..
            })
        ));
        assert!(!tmp.path().join("build").exists());
    }

    #[test]
    fn malformed_header_names_the_file() {
        let tmp = TempDir::new().unwrap();
        write_file(
            tmp.path(),
            "content/articles/2023-01-05-a.md",
            "---\ntitle: [oops\n---\nBody",
        );
        let err = site_at(&tmp).build_all(None).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Metadata { ref file, .. } if file.ends_with("2023-01-05-a.md")
        ));
        assert!(err.to_string().contains("2023-01-05-a.md"));
    }

    #[test]
    fn invalid_utf8_is_encoding_error() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("content/articles");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("2023-01-05-a.md"), [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(
            site_at(&tmp).build_all(None),
            Err(BuildError::Encoding { .. })
        ));
    }

    #[test]
    fn compose_failure_aborts_without_partial_listing() {
        let tmp = TempDir::new().unwrap();
        for day in 1..=6 {
            article(&tmp, &format!("2023-04-{day:02}-ok-{day}.md"), &format!("Ok {day}"));
        }
        write_file(
            tmp.path(),
            "content/articles/2023-04-10-broken.md",
            "---\ntitle: Broken\n---\nFAIL-HERE\n",
        );
        let site = Site::with_parts(
            config::load_config(tmp.path()).unwrap(),
            tmp.path(),
            &tmp.path().join("build"),
            MarkdownRenderer,
            FailingCompositor { marker: "FAIL-HERE" },
        );
        let err = site.build_all(None).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Compose { ref file, .. } if file.ends_with("2023-04-10-broken.md")
        ));
        assert!(!tmp.path().join("build").exists());
        assert!(!site.staging_dir().unwrap().exists());
    }

    #[test]
    fn render_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        article(&tmp, "2023-01-05-a.md", "A");
        let site = Site::with_parts(
            config::load_config(tmp.path()).unwrap(),
            tmp.path(),
            &tmp.path().join("build"),
            FailingRenderer,
            MaudCompositor,
        );
        assert!(matches!(
            site.build_all(None),
            Err(BuildError::Render { .. })
        ));
    }

    #[test]
    fn asset_outside_dated_directory_is_error() {
        let tmp = TempDir::new().unwrap();
        article(&tmp, "2023-01-05-a.md", "A");
        write_file(tmp.path(), "content/articles/images/logo.png", "png");
        assert!(matches!(
            site_at(&tmp).build_all(None),
            Err(BuildError::Name {
                source: NameError::UnparseableDir(_),
                ..
            })
        ));
    }

    #[test]
    fn same_slug_in_one_month_is_collision() {
        let tmp = TempDir::new().unwrap();
        article(&tmp, "2023-01-05-hello.md", "First");
        article(&tmp, "2023-01-20-hello.md", "Second");
        let err = site_at(&tmp).build_all(None).unwrap_err();
        match err {
            BuildError::OutputCollision {
                first,
                second,
                output,
            } => {
                assert!(first.ends_with("2023-01-05-hello.md"));
                assert!(second.ends_with("2023-01-20-hello.md"));
                assert_eq!(output, Path::new("content/articles/2023/01/hello/index.html"));
            }
            other => panic!("expected OutputCollision, got {other}"),
        }
        assert!(!tmp.path().join("build").exists());
    }

    #[test]
    fn flat_markdown_and_html_with_same_stem_collide() {
        let tmp = setup_fixtures();
        let site = site_at(&tmp);
        site.build_all(None).unwrap();
        let before = read_output(&tmp, "content/presentations/intro.html");

        write_file(tmp.path(), "content/presentations/intro.html", "<p>other</p>");
        let err = site.build_all(None).unwrap_err();
        assert!(matches!(
            err,
            BuildError::OutputCollision { ref output, .. }
                if output == Path::new("content/presentations/intro.html")
        ));
        assert!(err.to_string().contains("intro.md"));
        assert_eq!(read_output(&tmp, "content/presentations/intro.html"), before);
    }

    #[test]
    fn assets_from_two_dated_dirs_collide() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "content/articles/2023-01-05-a/pic.png", "one");
        write_file(tmp.path(), "content/articles/2023-01-09-a/pic.png", "two");
        assert!(matches!(
            site_at(&tmp).build_all(None),
            Err(BuildError::OutputCollision { ref output, .. })
                if output == Path::new("content/articles/2023/01/a/pic.png")
        ));
    }

    #[test]
    fn dot_slug_fails_instead_of_escaping_slug_dir() {
        let tmp = TempDir::new().unwrap();
        article(&tmp, "2023-02-01-...md", "Dots");
        assert!(matches!(
            site_at(&tmp).build_all(None),
            Err(BuildError::Name {
                source: NameError::Unparseable(_),
                ..
            })
        ));
        assert!(!tmp.path().join("build").exists());
    }

    #[test]
    fn asset_copy_failure_names_both_paths_and_keeps_output() {
        let tmp = setup_fixtures();
        site_at(&tmp).build_all(None).unwrap();
        let asset_out = tmp.path().join("build/content/articles/2023/01/hello/diagram.png");
        let index_before = read_output(&tmp, "index.html");
        let asset_before = fs::read(&asset_out).unwrap();

        let squat = tmp
            .path()
            .join(".build.staging/content/articles/2023/01/hello/diagram.png");
        let site = Site::with_parts(
            config::load_config(tmp.path()).unwrap(),
            tmp.path(),
            &tmp.path().join("build"),
            SquattingRenderer {
                squat: squat.clone(),
            },
            MaudCompositor,
        );
        match site.build_all(None).unwrap_err() {
            BuildError::AssetCopy { from, to, .. } => {
                assert_eq!(
                    from,
                    tmp.path().join("content/articles/2023-01-05-hello/diagram.png")
                );
                assert_eq!(to, squat);
            }
            other => panic!("expected AssetCopy, got {other}"),
        }

        assert_eq!(read_output(&tmp, "index.html"), index_before);
        assert_eq!(fs::read(&asset_out).unwrap(), asset_before);
        assert!(!site.staging_dir().unwrap().exists());
    }

    #[test]
    fn output_must_not_contain_root() {
        let tmp = TempDir::new().unwrap();
        let site = Site::load(tmp.path(), tmp.path()).unwrap();
        assert!(matches!(
            site.build_all(None),
            Err(BuildError::InvalidOutput(_))
        ));
        let site = Site::load(tmp.path(), Path::new(".")).unwrap();
        assert!(matches!(
            site.staging_dir(),
            Err(BuildError::InvalidOutput(_))
        ));
    }

    // =========================================================================
    // Custom collaborators
    // =========================================================================

    #[test]
    fn renderer_output_reaches_template() {
        let tmp = TempDir::new().unwrap();
        write_file(
            tmp.path(),
            "content/articles/2023-01-05-a.md",
            "---\ntitle: A\n---\n**raw**",
        );
        let site = Site::with_parts(
            config::load_config(tmp.path()).unwrap(),
            tmp.path(),
            &tmp.path().join("build"),
            EchoRenderer,
            MaudCompositor,
        );
        site.build_all(None).unwrap();
        let html = read_output(&tmp, "content/articles/2023/01/a/index.html");
        assert!(html.contains("**raw**"));
    }

    // =========================================================================
    // Scoped rebuilds
    // =========================================================================

    #[test]
    fn build_category_replaces_only_that_category() {
        let tmp = setup_fixtures();
        let site = site_at(&tmp);
        site.build_all(None).unwrap();

        article(&tmp, "2023-03-01-spring.md", "Spring");
        fs::remove_file(tmp.path().join("content/presentations/intro.md")).unwrap();
        let summary = site.build_category("articles", None).unwrap();

        assert_eq!(summary.documents, 4);
        assert_eq!(summary.listed, 4);
        assert!(tmp.path().join("build/content/articles/2023/03/spring/index.html").is_file());
        // Other categories are untouched by a scoped rebuild.
        assert!(tmp.path().join("build/content/presentations/intro.html").is_file());
        assert!(tmp.path().join("build/static/styles/site.css").is_file());
        assert!(read_output(&tmp, "index.html").contains("/2023/03/spring/"));
        assert!(!site.staging_dir().unwrap().exists());
    }

    #[test]
    fn build_category_removes_stale_listing_pages() {
        let tmp = TempDir::new().unwrap();
        for day in 1..=7 {
            article(&tmp, &format!("2023-03-{day:02}-post-{day}.md"), &format!("Post {day}"));
        }
        let site = site_at(&tmp);
        site.build_all(None).unwrap();
        assert!(tmp.path().join("build/index2.html").is_file());

        for day in 1..=4 {
            fs::remove_file(tmp.path().join(format!("content/articles/2023-03-{day:02}-post-{day}.md")))
                .unwrap();
        }
        let summary = site.build_category("articles", None).unwrap();
        assert_eq!(summary.listing_pages, 1);
        assert!(tmp.path().join("build/index.html").is_file());
        assert!(!tmp.path().join("build/index2.html").exists());
        assert!(!tmp.path().join("build/content/articles/2023/03/post-1").exists());
    }

    #[test]
    fn build_flat_category_keeps_listing() {
        let tmp = setup_fixtures();
        let site = site_at(&tmp);
        site.build_all(None).unwrap();
        let listing = read_output(&tmp, "index.html");

        write_file(tmp.path(), "content/presentations/outro.md", "# Bye");
        let summary = site.build_category("presentations", None).unwrap();
        assert_eq!(summary.documents, 2);
        assert_eq!(summary.listing_pages, 0);
        assert!(tmp.path().join("build/content/presentations/outro.html").is_file());
        assert_eq!(read_output(&tmp, "index.html"), listing);
    }

    #[test]
    fn build_unknown_category_is_error() {
        let tmp = setup_fixtures();
        assert!(matches!(
            site_at(&tmp).build_category("drafts", None),
            Err(BuildError::UnknownCategory(name)) if name == "drafts"
        ));
    }

    #[test]
    fn failed_category_build_keeps_output() {
        let tmp = setup_fixtures();
        let site = site_at(&tmp);
        site.build_all(None).unwrap();
        write_file(tmp.path(), "content/articles/undated.md", "oops");
        assert!(site.build_category("articles", None).is_err());
        assert!(tmp.path().join("build/content/articles/2023/01/hello/index.html").is_file());
        assert!(!site.staging_dir().unwrap().exists());
    }

    #[test]
    fn copy_static_replaces_static_dir() {
        let tmp = setup_fixtures();
        let site = site_at(&tmp);
        site.build_all(None).unwrap();

        fs::remove_file(tmp.path().join("static/styles/site.css")).unwrap();
        write_file(tmp.path(), "static/app.js", "console.log(1);");
        assert_eq!(site.copy_static(None).unwrap(), 1);
        assert!(tmp.path().join("build/static/app.js").is_file());
        assert!(!tmp.path().join("build/static/styles/site.css").exists());
        assert!(tmp.path().join("build/index.html").is_file());
    }

    // =========================================================================
    // Check and config reload
    // =========================================================================

    #[test]
    fn check_counts_without_writing() {
        let tmp = setup_fixtures();
        let summary = site_at(&tmp).check().unwrap();
        assert_eq!(summary.documents, 4);
        assert_eq!(summary.assets, 1);
        assert_eq!(summary.listed, 3);
        assert_eq!(summary.listing_pages, 1);
        assert!(!tmp.path().join("build").exists());
    }

    #[test]
    fn check_reports_bad_names() {
        let tmp = setup_fixtures();
        write_file(tmp.path(), "content/articles/2023-1-5-short.md", "x");
        assert!(matches!(
            site_at(&tmp).check(),
            Err(BuildError::Name { .. })
        ));
    }

    #[test]
    fn check_reports_output_collisions() {
        let tmp = setup_fixtures();
        write_file(
            tmp.path(),
            "content/articles/2023-01-30-hello.md",
            "---\ntitle: Again\n---\n",
        );
        assert!(matches!(
            site_at(&tmp).check(),
            Err(BuildError::OutputCollision { ref first, ref second, .. })
                if first.ends_with("2023-01-05-hello.md")
                    && second.ends_with("2023-01-30-hello.md")
        ));
    }

    #[test]
    fn reload_config_picks_up_changes() {
        let tmp = setup_fixtures();
        let mut site = site_at(&tmp);
        assert_eq!(site.config().listing.page_size, 5);
        write_file(tmp.path(), "config.toml", "[listing]\npage_size = 2\n");
        site.reload_config().unwrap();
        assert_eq!(site.config().listing.page_size, 2);

        write_file(tmp.path(), "config.toml", "[listing]\npage_size = 0\n");
        assert!(site.reload_config().is_err());
        assert_eq!(site.config().listing.page_size, 2);
    }
}
