//! Filename parsing for the dated `YYYY-MM-DD-slug.ext` convention.
//!
//! Every dated document carries its publication date and URL slug in its
//! filename. Co-located asset directories use the same shape without an
//! extension:
//!
//! ```text
//! 2023-01-05-hello-world.md   → date 2023-01-05, slug "hello-world", Markdown
//! 2023-01-05-hello-world/     → asset directory for the same document
//! ```
//!
//! The year, month, and day groups are fixed width and anchored, so a slug
//! may itself contain dashes or dots: the slug capture is greedy and takes
//! everything up to the final extension.
//!
//! A name that does not match is an error, never a partially filled record.
//! Listing dates and URLs are derived from these parses, and a garbled date
//! would silently corrupt ordering and links.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static DATED_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})-(.+)\.(md|html)$").expect("dated file pattern")
});

static DATED_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})-(.+)$").expect("dated dir pattern"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("unparseable filename (expected YYYY-MM-DD-slug.md|html): {0}")]
    Unparseable(String),
    #[error("unparseable asset directory (expected YYYY-MM-DD-slug): {0}")]
    UnparseableDir(String),
    #[error("invalid date {date} in {name}")]
    InvalidDate { name: String, date: String },
}

/// Source format of a document, taken from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Markdown,
    Html,
}

impl Format {
    /// Map a file extension (without the dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "md" => Some(Format::Markdown),
            "html" => Some(Format::Html),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Format::Markdown => "md",
            Format::Html => "html",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A parsed `YYYY-MM-DD-slug` date and slug pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedDir {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub slug: String,
}

impl DatedDir {
    /// The date as `YYYY-MM-DD`.
    ///
    /// Every component is zero padded to a fixed width, so comparing two keys
    /// as plain strings orders them chronologically. The listing sort relies
    /// on this instead of parsing into a date type.
    pub fn date_key(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Result of parsing a dated document filename like `2023-01-05-hello.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedName {
    pub date: DatedDir,
    pub format: Format,
}

impl DatedName {
    pub fn year(&self) -> u16 {
        self.date.year
    }

    pub fn month(&self) -> u8 {
        self.date.month
    }

    pub fn day(&self) -> u8 {
        self.date.day
    }

    pub fn slug(&self) -> &str {
        &self.date.slug
    }

    pub fn date_key(&self) -> String {
        self.date.date_key()
    }

    /// Rebuild the filename this name was parsed from.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.{}",
            self.date_key(),
            self.date.slug,
            self.format.extension()
        )
    }
}

/// Parse a dated document filename.
///
/// - `"2023-01-05-hello.md"` → 2023-01-05, slug `hello`, Markdown
/// - `"2024-12-31-a-b-c.html"` → 2024-12-31, slug `a-b-c`, HTML
/// - `"2024-02-01-v1.2.md"` → slug `v1.2`
/// - `"hello.md"`, `"2023-1-05-x.md"`, `"2023-01-05-x.txt"` → [`NameError::Unparseable`]
/// - `"2023-01-05-...md"` (slug `..`) → [`NameError::Unparseable`]
/// - `"2023-13-05-x.md"` → [`NameError::InvalidDate`]
pub fn parse_dated_name(file_name: &str) -> Result<DatedName, NameError> {
    let caps = DATED_FILE
        .captures(file_name)
        .ok_or_else(|| NameError::Unparseable(file_name.to_string()))?;
    if is_dot_segment(&caps[4]) {
        return Err(NameError::Unparseable(file_name.to_string()));
    }
    let date = dated_from_parts(file_name, &caps[1], &caps[2], &caps[3], &caps[4])?;
    let format = Format::from_extension(&caps[5])
        .ok_or_else(|| NameError::Unparseable(file_name.to_string()))?;
    Ok(DatedName { date, format })
}

/// Parse a co-located asset directory name (`YYYY-MM-DD-slug`, no extension).
pub fn parse_dated_dir(dir_name: &str) -> Result<DatedDir, NameError> {
    let caps = DATED_DIR
        .captures(dir_name)
        .ok_or_else(|| NameError::UnparseableDir(dir_name.to_string()))?;
    if is_dot_segment(&caps[4]) {
        return Err(NameError::UnparseableDir(dir_name.to_string()));
    }
    dated_from_parts(dir_name, &caps[1], &caps[2], &caps[3], &caps[4])
}

/// `.` and `..` would escape the slug directory once joined into a path.
fn is_dot_segment(slug: &str) -> bool {
    slug == "." || slug == ".."
}

fn dated_from_parts(
    name: &str,
    year: &str,
    month: &str,
    day: &str,
    slug: &str,
) -> Result<DatedDir, NameError> {
    let invalid = || NameError::InvalidDate {
        name: name.to_string(),
        date: format!("{year}-{month}-{day}"),
    };
    // The pattern guarantees ASCII digits of fixed width, so these parses only
    // reject out-of-range calendar values.
    let year: u16 = year.parse().map_err(|_| invalid())?;
    let month: u8 = month.parse().map_err(|_| invalid())?;
    let day: u8 = day.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(invalid());
    }
    Ok(DatedDir {
        year,
        month,
        day,
        slug: slug.to_string(),
    })
}
