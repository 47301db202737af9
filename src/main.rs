//! # Sidestack Feeds
//!
//! Builds a list of Substack RSS feeds from the Sidestack directory and
//! narrows it down by subscriber count.
//!
//! ## Usage
//!
//! ```sh
//! sidestack_feeds scrape --max-workers 96 --output feeds.json
//! sidestack_feeds map --min-subscribers 2.5k --merge-other-feeds
//! ```
//!
//! ## Architecture
//!
//! `scrape` runs a pipeline:
//! 1. **Indexing**: Collect detail page URLs from the 27 directory buckets
//! 2. **Fetching**: Scrape every detail page in a bounded worker pool
//! 3. **Output**: Write the slug-keyed collection to JSON
//!
//! `map` is a separate invocation that filters that JSON by status and
//! subscriber threshold, optionally merging supplementary feed lists.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod http;
mod mapper;
mod models;
mod outputs;
mod pool;
mod scrapers;
mod utils;

use cli::{Cli, Command, MapArgs, ScrapeArgs};
use config::ScraperConfig;
use error::Result;
use http::HttpClient;
use mapper::{FilterCriteria, MapperPaths, map_feeds, parse_threshold};
use outputs::json;
use pool::{CrawlSettings, crawl_details};
use scrapers::directory::index_detail_urls;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // --- Tracing init ---
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    debug!(?args, "Parsed CLI arguments");

    let outcome = match args.command {
        Command::Scrape(scrape) => run_scrape(scrape).await,
        Command::Map(map) => run_map(map).await,
    };

    let elapsed = start_time.elapsed();
    match outcome {
        Ok(()) => {
            info!(
                ?elapsed,
                secs = elapsed.as_secs(),
                millis = elapsed.subsec_millis(),
                "Execution complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, ?elapsed, "Execution failed");
            Err(e.into())
        }
    }
}

/// Crawl settings from the config file with command-line overrides applied.
async fn scraper_config(args: &ScrapeArgs) -> Result<ScraperConfig> {
    Ok(ScraperConfig::load(args.config.as_deref())
        .await?
        .with_overrides(args.pace_ms, args.no_verify_feeds))
}

#[instrument(level = "info", skip_all, fields(base = %args.sidestack_directory_base))]
async fn run_scrape(args: ScrapeArgs) -> Result<()> {
    let config = scraper_config(&args).await?;
    info!(
        max_workers = args.max_workers,
        dry_limit = ?args.dry_limit,
        verify_feeds = config.verify_feeds,
        pace_ms = config.pace_ms,
        "sidestack scrape starting up"
    );
    let client = HttpClient::new(&config)?;

    // ---- Index detail pages ----
    let bucket_concurrency = (args.max_workers / 4).clamp(1, 32);
    let urls = index_detail_urls(&client, &args.sidestack_directory_base, bucket_concurrency).await;

    // ---- Scrape detail pages ----
    let settings = CrawlSettings {
        max_workers: args.max_workers,
        dry_limit: args.dry_limit,
        verify_feeds: config.verify_feeds,
    };
    let collection = crawl_details(&client, urls, &settings).await;
    if collection.is_empty() {
        warn!("No detail pages were scraped; writing an empty collection");
    }

    // ---- Output ----
    json::write_collection(&collection, &args.output).await
}

/// Turn mapper arguments into filter criteria and file paths. The threshold
/// is validated here, before any file is touched.
fn map_plan(args: &MapArgs) -> Result<(FilterCriteria, MapperPaths)> {
    let criteria = FilterCriteria {
        min_subscribers: parse_threshold(&args.min_subscribers)?,
        merge_non_substack: args.merge_other_feeds || args.merge_non_substack,
        merge_other_substack: args.merge_other_feeds || args.merge_other_substack,
    };
    let paths = MapperPaths {
        input: args.input.clone(),
        output: args.output.clone(),
        non_substack: args.non_substack_feeds.clone(),
        other_substack: args.other_substack_feeds.clone(),
    };
    Ok((criteria, paths))
}

#[instrument(level = "info", skip_all)]
async fn run_map(args: MapArgs) -> Result<()> {
    let (criteria, paths) = map_plan(&args)?;
    debug!(?criteria, ?paths, "Mapper plan");
    map_feeds(&paths, &criteria).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::models::FeedStatus;
    use crate::scrapers::detail::DETAIL_PAGE;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn map_args(dir: &std::path::Path, min: &str) -> MapArgs {
        let Command::Map(args) = Cli::parse_from([
            "sidestack_feeds",
            "map",
            dir.join("feeds.json").to_str().unwrap(),
            dir.join("feeds_mapped.json").to_str().unwrap(),
            "--min-subscribers",
            min,
        ])
        .command
        else {
            panic!("expected map");
        };
        args
    }

    #[test]
    fn test_merge_other_feeds_enables_both() {
        let mut args = map_args(std::path::Path::new("."), "1k");
        args.merge_other_feeds = true;
        let (criteria, paths) = map_plan(&args).unwrap();
        assert_eq!(criteria.min_subscribers, 1_000);
        assert!(criteria.merge_non_substack);
        assert!(criteria.merge_other_substack);
        assert_eq!(paths.non_substack, std::path::PathBuf::from("non_substack_feeds.json"));
    }

    #[tokio::test]
    async fn test_bad_threshold_fails_before_io() {
        let dir = tempfile::tempdir().unwrap();
        // The input does not exist, so reaching file I/O would be a MissingInput error.
        let err = run_map(map_args(dir.path(), "abc")).await.unwrap_err();
        assert!(matches!(err, FeedError::Argument(_)));
        assert!(!dir.path().join("feeds_mapped.json").exists());
    }

    #[tokio::test]
    async fn test_scrape_then_map_end_to_end() {
        let server = MockServer::start().await;
        let base = format!("{}/directory/all", server.uri());
        let listing: String = (0..30)
            .map(|i| format!(r#"<a href="/directory/substack/pub{i:02}">p</a>"#))
            .collect();
        Mock::given(method("GET"))
            .and(path("/directory/all/A"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/directory/substack/pub\d+$"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_PAGE))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let feeds = dir.path().join("feeds.json");
        let Command::Scrape(scrape) = Cli::parse_from([
            "sidestack_feeds",
            "scrape",
            "--sidestack-directory-base",
            base.as_str(),
            "--max-workers",
            "8",
            "--dry-limit",
            "20",
            "--no-verify-feeds",
            "--pace-ms",
            "0",
            "--output",
            feeds.to_str().unwrap(),
        ])
        .command
        else {
            panic!("expected scrape");
        };
        run_scrape(scrape).await.unwrap();

        let collection: crate::models::Collection =
            json::read_records(&feeds).await.unwrap().into_iter().collect();
        assert_eq!(collection.len(), 20);
        assert_eq!(collection.count_status(FeedStatus::Ok), 20);

        run_map(map_args(dir.path(), "24k")).await.unwrap();
        let mapped: Vec<mapper::MappedFeed> = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("feeds_mapped.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(mapped.len(), 20);
        assert!(mapped.iter().all(|m| m.status == "ok" && m.subscribers >= 24_000));

        run_map(map_args(dir.path(), "25k")).await.unwrap();
        let mapped: Vec<mapper::MappedFeed> = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("feeds_mapped.json")).unwrap(),
        )
        .unwrap();
        assert!(mapped.is_empty());
    }
}
