//! Header block (front matter) extraction.
//!
//! A document may open with a delimited key/value block that carries its
//! metadata. The block is consumed here and never reaches the renderer:
//!
//! ```text
//! ---                          +++
//! title: Hello                 title = "Hello"
//! description: First post      description = "First post"
//! ---                          +++
//! Body starts here.            Body starts here.
//! ```
//!
//! ## Recognized blocks
//!
//! - **YAML**: opened by a `---` line, closed by `---` or `...`.
//! - **TOML**: opened and closed by `+++` lines.
//!
//! The opening delimiter must be the very first line (a leading byte order
//! mark is tolerated). An opening delimiter without a matching closing line
//! is not a header block; the document passes through untouched, the same
//! way a Markdown thematic break at the top of a file would.
//!
//! ## Fields
//!
//! `title` and `description` are lifted into typed fields since every
//! template and the listing use them. All other keys land in
//! [`Metadata::extra`] as JSON values so templates can reach them.
//!
//! Absence of a header block is normal and never an error. A block that is
//! present but does not parse into a mapping is.

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("malformed YAML header block: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    #[error("malformed TOML header block: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("header block must be a key/value mapping")]
    NotAMapping,
}

/// Metadata pulled out of a document's header block.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Every other key from the block, in key order.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.extra.is_empty()
    }
}

/// A document split into its metadata and the remaining body.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<'a> {
    pub metadata: Metadata,
    pub body: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Yaml,
    Toml,
}

impl Delimiter {
    fn opening(line: &str) -> Option<Self> {
        match line.trim_end() {
            "---" => Some(Delimiter::Yaml),
            "+++" => Some(Delimiter::Toml),
            _ => None,
        }
    }

    fn closes(self, line: &str) -> bool {
        let line = line.trim_end();
        match self {
            Delimiter::Yaml => line == "---" || line == "...",
            Delimiter::Toml => line == "+++",
        }
    }
}

/// Split a document into metadata and body.
///
/// Returns empty metadata and the input unchanged when no header block is
/// present.
pub fn extract(text: &str) -> Result<Extracted<'_>, MetadataError> {
    let Some((delimiter, header, body)) = split_header(text) else {
        return Ok(Extracted {
            metadata: Metadata::default(),
            body: text,
        });
    };

    let fields = match delimiter {
        Delimiter::Yaml => parse_yaml(header)?,
        Delimiter::Toml => parse_toml(header)?,
    };

    Ok(Extracted {
        metadata: metadata_from_fields(fields),
        body,
    })
}

/// Locate a header block, returning `(delimiter, header, body)`.
fn split_header(text: &str) -> Option<(Delimiter, &str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let first_end = text.find('\n')?;
    let delimiter = Delimiter::opening(&text[..first_end])?;
    let block = &text[first_end + 1..];

    let mut offset = 0;
    while offset < block.len() {
        let remaining = &block[offset..];
        let (line, consumed) = match remaining.find('\n') {
            Some(i) => (&remaining[..i], i + 1),
            None => (remaining, remaining.len()),
        };
        if delimiter.closes(line) {
            return Some((delimiter, &block[..offset], &remaining[consumed..]));
        }
        offset += consumed;
    }
    None
}

fn parse_yaml(header: &str) -> Result<serde_json::Map<String, Value>, MetadataError> {
    if header.trim().is_empty() {
        return Ok(serde_json::Map::new());
    }
    match serde_yaml_ng::from_str::<Value>(header)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(serde_json::Map::new()),
        _ => Err(MetadataError::NotAMapping),
    }
}

fn parse_toml(header: &str) -> Result<serde_json::Map<String, Value>, MetadataError> {
    let table: toml::Table = toml::from_str(header)?;
    Ok(table
        .into_iter()
        .map(|(key, value)| (key, toml_to_json(value)))
        .collect())
}

/// Convert a TOML value to JSON, rendering datetimes in their TOML form.
fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

fn metadata_from_fields(mut fields: serde_json::Map<String, Value>) -> Metadata {
    let title = fields.remove("title").and_then(scalar_text);
    let description = fields.remove("description").and_then(scalar_text);
    Metadata {
        title,
        description,
        extra: fields.into_iter().collect(),
    }
}

/// Text form of a header value; `null` counts as absent.
fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
