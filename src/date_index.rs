//! Date -> links index built from listing pages

use crate::schema::ListingEntry;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Links grouped by publication date.
///
/// Dates iterate in ascending order; links keep insertion order and are
/// never deduplicated, so an article repeated across pages appears twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DateIndex {
    entries: BTreeMap<NaiveDate, Vec<String>>,
}

impl DateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, link: impl Into<String>) {
        self.entries.entry(date).or_default().push(link.into());
    }

    pub fn push_entry(&mut self, entry: ListingEntry) {
        self.insert(entry.published_date, entry.link);
    }

    /// Append every link of `other` after the links already stored
    pub fn merge(&mut self, other: DateIndex) {
        for (date, links) in other.entries {
            self.entries.entry(date).or_default().extend(links);
        }
    }

    /// Keep only dates within `[start, end]`; empty when `start > end`
    pub fn filter_by_date_range(&self, start: NaiveDate, end: NaiveDate) -> DateIndex {
        let entries = self
            .entries
            .iter()
            .filter(|(date, _)| start <= **date && **date <= end)
            .map(|(date, links)| (*date, links.clone()))
            .collect();
        DateIndex { entries }
    }

    pub fn get(&self, date: &NaiveDate) -> Option<&[String]> {
        self.entries.get(date).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &Vec<String>)> {
        self.entries.iter()
    }

    /// Flattened (date, link) pairs in iteration order
    pub fn pairs(&self) -> impl Iterator<Item = (NaiveDate, &str)> {
        self.entries
            .iter()
            .flat_map(|(date, links)| links.iter().map(move |l| (*date, l.as_str())))
    }

    pub fn date_count(&self) -> usize {
        self.entries.len()
    }

    pub fn link_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Links per date, for log summaries
    pub fn counts(&self) -> BTreeMap<NaiveDate, usize> {
        self.entries.iter().map(|(d, l)| (*d, l.len())).collect()
    }
}

impl FromIterator<ListingEntry> for DateIndex {
    fn from_iter<I: IntoIterator<Item = ListingEntry>>(iter: I) -> Self {
        let mut index = DateIndex::new();
        for entry in iter {
            index.push_entry(entry);
        }
        index
    }
}
