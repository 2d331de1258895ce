use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A postal zipcode to scrape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub zipcode: String,
}

impl Region {
    pub fn new(zipcode: impl Into<String>) -> Self {
        Self {
            zipcode: zipcode.into(),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.zipcode)
    }
}

/// Cursor handed back to a fetch method; the shipped methods page by number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageToken(u32);

impl PageToken {
    pub fn first() -> Self {
        Self(1)
    }

    pub fn number(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn is_first(&self) -> bool {
        self.0 == 1
    }
}

/// One page of candidate listings
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub listings: Vec<Value>,
    /// Candidates the method dropped before returning (e.g. not sold)
    pub skipped: usize,
    /// `None` when the provider has no further pages
    pub next: Option<PageToken>,
}

impl FetchedPage {
    pub fn new(listings: Vec<Value>, next: Option<PageToken>) -> Self {
        Self {
            listings,
            skipped: 0,
            next,
        }
    }

    pub fn with_skipped(mut self, skipped: usize) -> Self {
        self.skipped = skipped;
        self
    }

    /// The provider returned nothing at all for this page
    pub fn is_exhausted(&self) -> bool {
        self.listings.is_empty() && self.skipped == 0
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Scrape request: zipcodes plus an optional overall record cap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub regions: Vec<Region>,
    pub max_records: Option<usize>,
}

impl ScrapeRequest {
    pub fn new(zipcodes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            regions: zipcodes.into_iter().map(Region::new).collect(),
            max_records: None,
        }
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }
}
