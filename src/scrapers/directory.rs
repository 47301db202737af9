//! Sidestack directory listing scraper.
//!
//! The directory is split into 27 buckets, one per leading character:
//! `#0-9` followed by `A` through `Z`. Each bucket page links to the detail
//! pages of the publications it lists.
//!
//! # URL Pattern
//!
//! Bucket pages live at `{base}/{bucket}` (the `#0-9` bucket is sent
//! percent-encoded as `%230-9`). Detail links are relative hrefs such as
//! `/directory/substack/a16znews`, resolved against the bucket URL.

use crate::error::{FeedError, Result};
use crate::http::HttpClient;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const DEFAULT_BASE: &str = "https://sidestack.io/directory/all";

const DETAIL_PATH_PREFIX: &str = "/directory/substack/";

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// The 27 bucket path segments in crawl order.
pub fn buckets() -> Vec<String> {
    std::iter::once(urlencoding::encode("#0-9").into_owned())
        .chain(('A'..='Z').map(String::from))
        .collect()
}

/// Bucket index page URLs under `base`.
pub fn bucket_urls(base: &str) -> Vec<String> {
    let base = base.trim_end_matches('/');
    buckets()
        .into_iter()
        .map(|bucket| format!("{base}/{bucket}"))
        .collect()
}

/// Extract detail page URLs from a bucket page.
///
/// Keeps anchors whose resolved path starts with `/directory/substack/`,
/// de-duplicated and sorted.
pub fn extract_detail_urls(html: &str, page_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| page_url.join(href).ok())
        .filter(|u| {
            u.path().starts_with(DETAIL_PATH_PREFIX) && u.path().len() > DETAIL_PATH_PREFIX.len()
        })
        .map(|mut u| {
            u.set_fragment(None);
            u.set_query(None);
            u.to_string()
        })
        .sorted()
        .dedup()
        .collect()
}

/// Fetch one bucket page and return the detail URLs it links to.
///
/// # Errors
///
/// Network failures and non-2xx answers are returned to the caller.
#[instrument(level = "info", skip(client))]
pub async fn index_bucket(client: &HttpClient, bucket_url: &str) -> Result<Vec<String>> {
    let page_url = Url::parse(bucket_url).map_err(|e| FeedError::Parse(e.to_string()))?;
    let html = client.get_text(bucket_url).await?;
    let urls = extract_detail_urls(&html, &page_url);
    info!(count = urls.len(), "Indexed bucket");
    Ok(urls)
}

/// Index every bucket under `base` with at most `concurrency` pages in flight.
///
/// A failing bucket is logged and skipped; it never aborts the run. The
/// returned list is de-duplicated and sorted.
#[instrument(level = "info", skip(client))]
pub async fn index_detail_urls(client: &HttpClient, base: &str, concurrency: usize) -> Vec<String> {
    let urls = bucket_urls(base);
    let total = urls.len();
    let start = Instant::now();

    let per_bucket: Vec<Vec<String>> = stream::iter(urls)
        .map(|url| async move {
            match index_bucket(client, &url).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(%url, error = %e, "Bucket fetch failed; skipping");
                    Vec::new()
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .enumerate()
        .map(|(i, found)| {
            let done = i + 1;
            let rate = done as f64 / start.elapsed().as_secs_f64().max(1e-6);
            let eta = (total - done) as f64 / rate;
            debug!(
                done,
                total,
                rate = %format!("{rate:.2}/s"),
                eta = %format!("{eta:.1}s"),
                "Bucket progress"
            );
            found
        })
        .collect()
        .await;

    let detail_urls: Vec<String> = per_bucket.into_iter().flatten().sorted().dedup().collect();
    info!(count = detail_urls.len(), buckets = total, "Collected detail pages");
    detail_urls
}
