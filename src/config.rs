//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. The file lives in
//! the project root next to `content/` and `static/`, and is entirely
//! optional: stock defaults describe the usual articles + presentations site.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! title = "Articles"
//! description = ""
//!
//! [listing]
//! page_size = 5            # records per listing page
//! category = "articles"    # dated category feeding the listing ("" = none)
//!
//! [categories.articles]
//! layout = "dated"         # dated: YYYY-MM-DD-slug.ext → YYYY/MM/slug/index.html
//! template = "article"
//! assets = ["png", "pdf", "jpg", "svg"]
//!
//! [categories.presentations]
//! layout = "flat"          # flat: name.ext → name.html
//! template = "presentation"
//! assets = []
//!
//! [processing]
//! max_processes = 4        # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [listing]
//! page_size = 10
//! ```
//!
//! New categories can be added under `[categories.<name>]`; the stock ones
//! stay defined and simply produce nothing when their directory is absent.
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::listing::DEFAULT_PAGE_SIZE;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Site-wide values exposed to templates.
    pub site: SiteInfo,
    /// Listing pagination settings.
    pub listing: ListingConfig,
    /// Content categories, keyed by directory name under `content/`.
    pub categories: BTreeMap<String, CategoryConfig>,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let mut categories = BTreeMap::new();
        categories.insert("articles".to_string(), CategoryConfig::default());
        categories.insert(
            "presentations".to_string(),
            CategoryConfig {
                layout: Layout::Flat,
                template: "presentation".to_string(),
                assets: Vec::new(),
            },
        );
        Self {
            site: SiteInfo::default(),
            listing: ListingConfig::default(),
            categories,
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listing.page_size == 0 {
            return Err(ConfigError::Validation(
                "listing.page_size must be at least 1".into(),
            ));
        }
        for (name, category) in &self.categories {
            if !is_single_component(name) {
                return Err(ConfigError::Validation(format!(
                    "category name '{name}' must be a single directory name"
                )));
            }
            if category.template.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "categories.{name}.template must not be empty"
                )));
            }
        }
        if let Some(listed) = self.listed_category() {
            match self.categories.get(listed) {
                None => {
                    return Err(ConfigError::Validation(format!(
                        "listing.category '{listed}' is not a configured category"
                    )));
                }
                Some(category) if category.layout != Layout::Dated => {
                    return Err(ConfigError::Validation(format!(
                        "listing.category '{listed}' must use the dated layout"
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Name of the category feeding the listing, if any.
    pub fn listed_category(&self) -> Option<&str> {
        let name = self.listing.category.trim();
        (!name.is_empty()).then_some(name)
    }
}

fn is_single_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}

/// Site-wide values exposed to every template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteInfo {
    /// Site title, shown in page titles and the listing header.
    pub title: String,
    /// Short description shown under the listing header.
    pub description: String,
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            title: "Articles".to_string(),
            description: String::new(),
        }
    }
}

/// Listing pagination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListingConfig {
    /// Records per listing page.
    pub page_size: usize,
    /// Dated category whose documents appear in the listing. Empty disables it.
    pub category: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            category: "articles".to_string(),
        }
    }
}

/// How a category maps source filenames to output paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// `YYYY-MM-DD-slug.ext` → `YYYY/MM/slug/index.html`, with co-located assets.
    Dated,
    /// `name.ext` → `name.html`.
    Flat,
}

/// Per-category settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategoryConfig {
    pub layout: Layout,
    /// Template used to compose each document.
    pub template: String,
    /// Asset extensions copied from dated asset directories (case-insensitive).
    pub assets: Vec<String>,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            layout: Layout::Dated,
            template: "article".to_string(),
            assets: ["png", "pdf", "jpg", "svg"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel document workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given project root.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# dated-press configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Site
# ---------------------------------------------------------------------------
[site]
# Shown in page titles and at the top of the listing.
title = "Articles"
description = ""

# ---------------------------------------------------------------------------
# Listing (build/index.html, build/index2.html, ...)
# ---------------------------------------------------------------------------
[listing]
# Records per listing page.
page_size = 5

# Dated category whose documents are listed, newest first.
# Set to "" to skip the listing entirely.
category = "articles"

# ---------------------------------------------------------------------------
# Categories (directories under content/)
# ---------------------------------------------------------------------------
# layout = "dated": content/<name>/YYYY-MM-DD-slug.md|html
#                   -> build/content/<name>/YYYY/MM/slug/index.html
#                   Assets in content/<name>/YYYY-MM-DD-slug/ are copied
#                   next to the page, basenames preserved.
# layout = "flat":  content/<name>/page.md|html -> build/content/<name>/page.html
[categories.articles]
layout = "dated"
template = "article"
assets = ["png", "pdf", "jpg", "svg"]

[categories.presentations]
layout = "flat"
template = "presentation"
assets = []

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel document workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
