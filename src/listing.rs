//! Listing accumulation and pagination.
//!
//! Building the listing is a two-phase protocol:
//!
//! 1. **Accumulate**: every successfully processed dated document yields one
//!    [`ListingRecord`]. The build coordinator owns a [`ListingAccumulator`]
//!    and appends the records returned by the per-document tasks once all of
//!    them have finished.
//! 2. **Finalize**: [`ListingAccumulator::finalize`] consumes the accumulator
//!    and hands its records to [`paginate`], which sorts them and cuts them
//!    into fixed-size pages.
//!
//! Since `finalize` takes the accumulator by value, nothing can be appended
//! after pagination has started, and a rerun always starts from a fresh
//! accumulator.
//!
//! ## Page naming
//!
//! Pages are numbered from 0. Page 0 is `index.html`; page `p > 0` is
//! `index{p + 1}.html`, so the second page is `index2.html`. This off-by-one
//! scheme is part of the public URL layout.

use crate::naming::DatedName;
use crate::paths;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Default number of records per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 5;

static LISTING_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^index([0-9]*)\.html$").expect("listing file pattern"));

/// Summary of one dated document as shown on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingRecord {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `YYYY-MM-DD`, taken from the filename.
    pub date: String,
    /// `/{YYYY}/{MM}/{slug}/`, taken from the filename.
    pub url: String,
    pub source_name: String,
}

impl ListingRecord {
    /// Build a record from a parsed filename and the document's header fields.
    ///
    /// Date and URL come from the name alone, so they are always well formed.
    pub fn new(name: &DatedName, title: Option<String>, description: Option<String>) -> Self {
        Self {
            title,
            description,
            date: name.date_key(),
            url: paths::listing_url(name),
            source_name: name.file_name(),
        }
    }
}

/// Append-only collection of listing records for one build.
#[derive(Debug, Default)]
pub struct ListingAccumulator {
    records: Vec<ListingRecord>,
}

impl ListingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ListingRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// End the accumulation phase and release the records in append order.
    pub fn finalize(self) -> Vec<ListingRecord> {
        self.records
    }
}

impl Extend<ListingRecord> for ListingAccumulator {
    fn extend<I: IntoIterator<Item = ListingRecord>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}

/// One window of the sorted listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingPage {
    /// 0-based page index.
    pub index: usize,
    pub records: Vec<ListingRecord>,
    /// Filename number of the following page (`index + 2`), if any.
    pub next: Option<usize>,
}

impl ListingPage {
    /// Output filename of this page.
    pub fn file_name(&self) -> String {
        listing_file_name(self.index)
    }

    /// Relative link to the following page, if any.
    pub fn next_href(&self) -> Option<String> {
        self.next.map(|n| format!("index{n}.html"))
    }

    /// Relative link to the preceding page, if any.
    pub fn prev_href(&self) -> Option<String> {
        self.index
            .checked_sub(1)
            .map(listing_file_name)
    }
}

/// Filename for the listing page at `index`.
pub fn listing_file_name(index: usize) -> String {
    if index == 0 {
        "index.html".to_string()
    } else {
        format!("index{}.html", index + 1)
    }
}

/// Whether `name` is a file this module would write as a listing page.
pub fn is_listing_file_name(name: &str) -> bool {
    LISTING_FILE
        .captures(name)
        .is_some_and(|caps| match &caps[1] {
            "" => true,
            digits => digits
                .parse::<usize>()
                .is_ok_and(|n| n >= 2 && digits == n.to_string()),
        })
}

/// Sort records newest first and cut them into pages of `page_size`.
///
/// The sort is stable, so records sharing a date keep the order they were
/// accumulated in. Zero records still produce one empty page so the site
/// always has an index. A `page_size` of zero is treated as one.
pub fn paginate(mut records: Vec<ListingRecord>, page_size: usize) -> Vec<ListingPage> {
    let page_size = page_size.max(1);
    // Date keys are fixed-width `YYYY-MM-DD`, so string order is date order.
    records.sort_by(|a, b| b.date.cmp(&a.date));

    if records.is_empty() {
        return vec![ListingPage {
            index: 0,
            records: Vec::new(),
            next: None,
        }];
    }

    let page_count = records.len().div_ceil(page_size);
    let mut pages = Vec::with_capacity(page_count);
    let mut remaining = records.into_iter();
    for index in 0..page_count {
        let chunk: Vec<ListingRecord> = remaining.by_ref().take(page_size).collect();
        pages.push(ListingPage {
            index,
            records: chunk,
            next: (index + 1 < page_count).then_some(index + 2),
        });
    }
    pages
}
