//! Walk every listing page and merge the results into one index

use crate::config::{Config, DelayRange};
use crate::date_index::DateIndex;
use crate::error::Result;
use crate::listing::ListingClient;
use rand::Rng;
use std::time::Duration;
use tracing::{info, instrument};

/// Resolve the full date index.
///
/// With no explicit page count the count is discovered from the listing
/// page's pagination links first. Pages are fetched strictly in order with a
/// random pause between them.
#[instrument(level = "info", skip(client, config))]
pub async fn resolve_all(
    client: &ListingClient,
    config: &Config,
    explicit_page_count: Option<u32>,
) -> Result<DateIndex> {
    let page_count = match explicit_page_count {
        Some(count) => count,
        None => {
            info!("Page count not provided, discovering from pagination");
            client.fetch_page_count(&config.listing_url).await?
        }
    };

    info!(pages = page_count, "Fetching listing pages");
    let mut index = DateIndex::new();
    for page in 1..=page_count {
        if page > 1 {
            tokio::time::sleep(jitter(config.delay)).await;
        }
        let url = config.page_url(page);
        info!(page, %url, "Fetching listing page");
        index.merge(client.fetch_listing_page(&url).await?);
    }

    info!(
        links = index.link_count(),
        per_date = ?index.counts(),
        "Total news items fetched"
    );
    Ok(index)
}

fn jitter(range: DelayRange) -> Duration {
    if range.max_secs <= range.min_secs {
        return Duration::from_secs_f64(range.min_secs.max(0.0));
    }
    let secs = rand::rng().random_range(range.min_secs..=range.max_secs);
    Duration::from_secs_f64(secs)
}
