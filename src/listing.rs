//! Listing pages: fetch over HTTP, parse article items and pagination links

use crate::config::Config;
use crate::date_index::DateIndex;
use crate::error::{NewsError, Result};
use crate::schema::{ListingEntry, LISTING_DATE_FORMAT};
use chrono::NaiveDate;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

const PUBLISHED_PREFIX: &str = "Published on";

/// Fetches and parses listing pages of one portal
pub struct ListingClient {
    http: Client,
    item_selector: Selector,
    pagination_selector: Selector,
}

impl ListingClient {
    pub fn new(http: Client, config: &Config) -> Result<Self> {
        Ok(Self {
            http,
            item_selector: parse_selector(&config.item_selector)?,
            pagination_selector: parse_selector(&config.pagination_selector)?,
        })
    }

    /// GET a page body; any non-2xx status is fatal
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Listing fetch failed");
            return Err(NewsError::Transport {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    /// Fetch one listing page and index its entries by date
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_listing_page(&self, url: &str) -> Result<DateIndex> {
        let html = self.fetch_html(url).await?;
        let entries = self.parse_entries(&html);
        let index: DateIndex = entries.into_iter().collect();
        info!(
            dates = index.date_count(),
            links = index.link_count(),
            "Fetched listing page"
        );
        Ok(index)
    }

    /// Highest page number among the pagination links of `url`
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_page_count(&self, url: &str) -> Result<u32> {
        let html = self.fetch_html(url).await?;
        let count = self
            .parse_page_count(&html)
            .ok_or_else(|| NewsError::NoPagination {
                url: url.to_string(),
            })?;
        info!(pages = count, "Max page number found");
        Ok(count)
    }

    pub fn parse_entries(&self, html: &str) -> Vec<ListingEntry> {
        let doc = Html::parse_document(html);
        doc.select(&self.item_selector)
            .filter_map(parse_item)
            .collect()
    }

    pub fn parse_page_count(&self, html: &str) -> Option<u32> {
        let doc = Html::parse_document(html);
        doc.select(&self.pagination_selector)
            .filter_map(|el| {
                let text = el.text().collect::<String>();
                let text = text.trim();
                if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                text.parse::<u32>().ok()
            })
            .max()
    }
}

fn parse_selector(sel: &str) -> Result<Selector> {
    Selector::parse(sel)
        .map_err(|e| NewsError::InvalidConfig(format!("Invalid CSS selector {:?}: {}", sel, e)))
}

/// Extract (link, date) from one listing item; `None` when either is missing
fn parse_item(item: ElementRef<'_>) -> Option<ListingEntry> {
    let link_sel = Selector::parse("a[href]").ok()?;
    let span_sel = Selector::parse("span").ok()?;

    let link = item
        .select(&link_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())?;

    let date_text = item.select(&span_sel).find_map(|span| {
        let text = span.text().collect::<String>();
        text.trim()
            .strip_prefix(PUBLISHED_PREFIX)
            .map(|rest| rest.trim().to_string())
    });

    let Some(date_text) = date_text else {
        debug!(%link, "Skipping listing item without publish date");
        return None;
    };

    match NaiveDate::parse_from_str(&date_text, LISTING_DATE_FORMAT) {
        Ok(published_date) => {
            debug!(%link, %published_date, "Added link");
            Some(ListingEntry {
                link: link.to_string(),
                published_date,
            })
        }
        Err(e) => {
            warn!(%link, date = %date_text, error = %e, "Skipping listing item with unparsable date");
            None
        }
    }
}
