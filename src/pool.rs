//! Bounded worker pool that turns detail URLs into a [`Collection`].
//!
//! # Architecture
//!
//! ```text
//!  urls ──► task queue (bounded) ──► worker 1..N ──► result channel ──► collector
//! ```
//!
//! A feeder task pushes URLs into a bounded queue. `N = max_workers` worker
//! tasks pull from it, scrape one page at a time and send the resulting
//! [`FeedRecord`] to a single collector task, which is the only owner of the
//! [`Collection`]. Every URL produces exactly one record; a failed fetch is
//! recorded with an error status and the pool carries on.

use crate::http::HttpClient;
use crate::models::{Collection, FeedRecord, FeedStatus};
use crate::scrapers::detail::scrape_detail;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};

/// Default number of concurrent detail fetches.
pub const DEFAULT_MAX_WORKERS: usize = 96;

/// Progress is logged every this many records.
const PROGRESS_EVERY: usize = 25;

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub max_workers: usize,
    /// Keep only the first N URLs. `Some(0)` means no limit.
    pub dry_limit: Option<usize>,
    pub verify_feeds: bool,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            dry_limit: None,
            verify_feeds: true,
        }
    }
}

/// Apply the dry limit to a URL list. A limit of zero disables it.
pub fn apply_dry_limit(mut urls: Vec<String>, dry_limit: Option<usize>) -> Vec<String> {
    if let Some(limit) = dry_limit.filter(|l| *l > 0) {
        if limit < urls.len() {
            info!(limit, of = urls.len(), "Dry limit: processing only the first detail pages");
            urls.truncate(limit);
        }
    }
    urls
}

/// Scrape every URL with at most `settings.max_workers` fetches in flight.
#[instrument(level = "info", skip_all, fields(urls = urls.len(), max_workers = settings.max_workers))]
pub async fn crawl_details(
    client: &HttpClient,
    urls: Vec<String>,
    settings: &CrawlSettings,
) -> Collection {
    let urls = apply_dry_limit(urls, settings.dry_limit);
    let total = urls.len();
    if total == 0 {
        return Collection::new();
    }
    let workers = settings.max_workers.clamp(1, total);

    let (task_tx, task_rx) = mpsc::channel::<String>(workers * 2);
    let task_rx = Arc::new(Mutex::new(task_rx));
    let (result_tx, result_rx) = mpsc::channel::<FeedRecord>(workers * 2);

    let collector = tokio::spawn(collect_records(result_rx, total));

    let mut pool = JoinSet::new();
    for worker_id in 0..workers {
        let client = client.clone();
        let task_rx = Arc::clone(&task_rx);
        let result_tx = result_tx.clone();
        let verify_feeds = settings.verify_feeds;
        pool.spawn(async move {
            loop {
                // Hold the queue lock only long enough to take one URL.
                let next = task_rx.lock().await.recv().await;
                let Some(url) = next else { break };
                let record = scrape_detail(&client, &url, verify_feeds).await;
                if result_tx.send(record).await.is_err() {
                    error!(worker_id, "Collector gone; stopping worker");
                    break;
                }
            }
        });
    }
    drop(result_tx);

    for url in urls {
        if task_tx.send(url).await.is_err() {
            break;
        }
    }
    drop(task_tx);

    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Worker task panicked");
        }
    }

    match collector.await {
        Ok(collection) => collection,
        Err(e) => {
            error!(error = %e, "Collector task failed");
            Collection::new()
        }
    }
}

/// Receive records until every worker has hung up.
async fn collect_records(mut rx: mpsc::Receiver<FeedRecord>, total: usize) -> Collection {
    let start = Instant::now();
    let mut collection = Collection::new();
    let mut processed = 0usize;

    while let Some(record) = rx.recv().await {
        processed += 1;
        if let Some(prev) = collection.insert(record) {
            debug!(slug = %prev.slug, "Duplicate slug; keeping the later record");
        }
        if processed % PROGRESS_EVERY == 0 || processed == total {
            let rate = processed as f64 / start.elapsed().as_secs_f64().max(1e-6);
            let eta = total.saturating_sub(processed) as f64 / rate;
            info!(
                processed,
                total,
                rate = %format!("{rate:.2}/s"),
                eta = %format!("{eta:.1}s"),
                "Detail pages"
            );
        }
    }

    info!(
        total = collection.len(),
        ok = collection.count_status(FeedStatus::Ok),
        unverified = collection.count_status(FeedStatus::Unverified),
        error = collection.count_status(FeedStatus::Error),
        not_found = collection.count_status(FeedStatus::NotFound),
        "Crawl summary"
    );
    collection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_client;
    use crate::scrapers::detail::DETAIL_PAGE;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn detail_urls(server: &MockServer, n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("{}/directory/substack/pub{i:03}", server.uri()))
            .collect()
    }

    fn settings(max_workers: usize, dry_limit: Option<usize>) -> CrawlSettings {
        CrawlSettings {
            max_workers,
            dry_limit,
            verify_feeds: false,
        }
    }

    #[test]
    fn test_apply_dry_limit() {
        let urls: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        assert_eq!(apply_dry_limit(urls.clone(), Some(2)), vec!["0", "1"]);
        assert_eq!(apply_dry_limit(urls.clone(), Some(10)).len(), 5);
        assert_eq!(apply_dry_limit(urls, None).len(), 5);
    }

    #[test]
    fn test_zero_dry_limit_keeps_everything() {
        let urls: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        assert_eq!(apply_dry_limit(urls, Some(0)).len(), 5);
    }

    #[tokio::test]
    async fn test_crawl_collects_every_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/directory/substack/pub\d+$"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_PAGE))
            .mount(&server)
            .await;

        let urls = detail_urls(&server, 40);
        let collection = crawl_details(&test_client(), urls, &settings(8, None)).await;
        assert_eq!(collection.len(), 40);
        assert_eq!(collection.count_status(FeedStatus::Ok), 40);
        assert!(collection.get("pub000").is_some());
        assert!(collection.get("pub039").is_some());
    }

    #[tokio::test]
    async fn test_dry_limit_caps_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_PAGE))
            .mount(&server)
            .await;

        let urls = detail_urls(&server, 50);
        let collection = crawl_details(&test_client(), urls, &settings(96, Some(20))).await;
        assert!(collection.len() <= 20);
        assert_eq!(server.received_requests().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_others() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/directory/substack/pub003"))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_PAGE))
            .mount(&server)
            .await;

        let urls = detail_urls(&server, 10);
        let collection = crawl_details(&test_client(), urls, &settings(3, None)).await;
        assert_eq!(collection.len(), 10);
        assert_eq!(collection.count_status(FeedStatus::Ok), 9);
        let failed = collection.get("pub003").unwrap();
        assert_eq!(failed.status, FeedStatus::Error);
        assert!(failed.reason.as_deref().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_recorded_as_error() {
        // Port 9 (discard) on localhost is not listening in test environments.
        let urls = vec!["http://127.0.0.1:9/directory/substack/offline".to_string()];
        let collection = crawl_details(&test_client(), urls, &settings(4, None)).await;
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get("offline").unwrap().status, FeedStatus::Error);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let collection = crawl_details(&test_client(), Vec::new(), &settings(4, None)).await;
        assert!(collection.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_urls_collapse_by_slug() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_PAGE))
            .mount(&server)
            .await;

        let mut urls = detail_urls(&server, 3);
        urls.push(urls[0].clone());
        let collection = crawl_details(&test_client(), urls, &settings(2, None)).await;
        assert_eq!(collection.len(), 3);
    }
}
