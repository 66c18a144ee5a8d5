//! Resolve -> filter -> enrich, serialized as JSON
//!
//! Enrichment is all-or-nothing: the first capture or analysis failure
//! aborts the run and records enriched so far are discarded.

use crate::analyze::Analyzer;
use crate::capture::{capture, SessionFactory};
use crate::config::Config;
use crate::date_index::DateIndex;
use crate::error::{NewsError, Result};
use crate::listing::ListingClient;
use crate::pagination::resolve_all;
use crate::schema::AnalysisRecord;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, instrument};
use url::Url;

pub struct Pipeline<'a, S: ?Sized, A: ?Sized> {
    config: &'a Config,
    listing: &'a ListingClient,
    sessions: &'a S,
    analyzer: &'a A,
}

impl<'a, S, A> Pipeline<'a, S, A>
where
    S: SessionFactory + ?Sized,
    A: Analyzer + ?Sized,
{
    pub fn new(
        config: &'a Config,
        listing: &'a ListingClient,
        sessions: &'a S,
        analyzer: &'a A,
    ) -> Self {
        Self {
            config,
            listing,
            sessions,
            analyzer,
        }
    }

    /// Full run: records for `[start, end]` as a 4-space-indented JSON array
    #[instrument(level = "info", skip(self))]
    pub async fn run(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        explicit_page_count: Option<u32>,
    ) -> Result<String> {
        let records = self.records(start, end, explicit_page_count).await?;
        let json = to_json(&records)?;
        info!(records = records.len(), "Pipeline complete");
        Ok(json)
    }

    pub async fn records(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        explicit_page_count: Option<u32>,
    ) -> Result<Vec<AnalysisRecord>> {
        let page_count = explicit_page_count.or(self.config.max_pages);
        let index = resolve_all(self.listing, self.config, page_count).await?;

        let filtered = index.filter_by_date_range(start, end);
        info!(
            %start,
            %end,
            dates = filtered.date_count(),
            links = filtered.link_count(),
            "Filtered date index"
        );

        self.enrich(&filtered).await
    }

    /// Capture and analyze every link of `index`, in index order
    #[instrument(level = "info", skip_all, fields(links = index.link_count()))]
    pub async fn enrich(&self, index: &DateIndex) -> Result<Vec<AnalysisRecord>> {
        let mut records = Vec::with_capacity(index.link_count());
        for (date, link) in index.pairs() {
            info!(%date, %link, "Processing link");
            let url = absolute_url(&self.config.base_url, link)?;

            let composite = capture(
                self.sessions,
                &url,
                self.config.max_scrolls,
                self.config.viewport,
            )
            .await?;
            let analysis = self.analyzer.analyze(&composite.to_base64()?).await?;

            let record = AnalysisRecord::new(analysis, url, date);
            debug!(?record, "Analysis result");
            records.push(record);
        }
        Ok(records)
    }
}

/// Prefix a listing link with the portal base URL.
///
/// Relative links are appended to `base` as-is, so a path on the base
/// (`https://host/en`) is kept. Absolute links are returned unchanged.
pub fn absolute_url(base: &str, link: &str) -> Result<String> {
    if let Ok(url) = Url::parse(link) {
        return Ok(url.into());
    }
    Url::parse(base)
        .map_err(|e| NewsError::InvalidConfig(format!("Invalid base_url {:?}: {}", base, e)))?;

    let base = base.trim_end_matches('/');
    let link = link.trim_start_matches('/');
    Ok(format!("{}/{}", base, link))
}

/// Pretty JSON with 4-space indentation
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .map_err(|e| NewsError::Io(e.into()))?;
    String::from_utf8(buf).map_err(|e| NewsError::Io(std::io::Error::other(e)))
}
