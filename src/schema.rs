//! Records flowing through the pipeline

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Format of the "Published on ..." label on listing pages
pub const LISTING_DATE_FORMAT: &str = "%b %d, %Y";

/// One article found on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Link as it appears in the markup (usually relative)
    pub link: String,
    pub published_date: NaiveDate,
}

/// Fields the vision model reads off a captured page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub title: String,
    /// Date as printed on the page, not normalised
    pub date: String,
    pub text: String,
}

/// Final output record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub title: String,
    pub date: String,
    pub text: String,
    /// Absolute URL that was captured
    pub link: String,
    /// Listing date, YYYY-MM-DD
    pub published_date: String,
}

impl AnalysisRecord {
    pub fn new(analysis: Analysis, link: String, published_date: NaiveDate) -> Self {
        Self {
            title: analysis.title,
            date: analysis.date,
            text: analysis.text,
            link,
            published_date: published_date.format("%Y-%m-%d").to_string(),
        }
    }
}
