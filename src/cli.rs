//! Command-line interface definitions for Sidestack Feeds.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! The binary has two subcommands that are run one after the other:
//! `scrape` crawls the directory into `feeds.json`, `map` filters it into
//! `feeds_mapped.json`.

use crate::mapper::{DEFAULT_INPUT, DEFAULT_OUTPUT, NON_SUBSTACK_FEEDS, OTHER_SUBSTACK_FEEDS};
use crate::pool::DEFAULT_MAX_WORKERS;
use crate::scrapers::directory::DEFAULT_BASE;
use clap::builder::TypedValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the Sidestack Feeds application.
///
/// # Examples
///
/// ```sh
/// # Smoke test against the first 20 detail pages
/// sidestack_feeds scrape --dry-limit 20 --output feeds.json
///
/// # Keep feeds with at least 2,500 subscribers and merge the extra lists
/// sidestack_feeds map --min-subscribers 2.5k --merge-other-feeds
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Log at debug level (RUST_LOG takes precedence when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl the directory and write every feed record
    Scrape(ScrapeArgs),
    /// Filter scraped records by status and subscriber count
    Map(MapArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ScrapeArgs {
    /// Base URL of the directory listing pages
    #[arg(long, default_value = DEFAULT_BASE)]
    pub sidestack_directory_base: String,

    /// Maximum number of detail pages fetched concurrently
    #[arg(long, default_value_t = DEFAULT_MAX_WORKERS, value_parser = clap::value_parser!(u64).range(1..).map(|v| v as usize))]
    pub max_workers: usize,

    /// Output JSON file
    #[arg(long, default_value = DEFAULT_INPUT)]
    pub output: PathBuf,

    /// Process only the first N detail pages
    #[arg(long)]
    pub dry_limit: Option<usize>,

    /// Optional YAML file with crawler settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Do not fetch feed URLs to confirm they serve RSS/Atom
    #[arg(long)]
    pub no_verify_feeds: bool,

    /// Minimum milliseconds between requests to the same host
    #[arg(long)]
    pub pace_ms: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct MapArgs {
    /// Scraped collection to read
    #[arg(default_value = DEFAULT_INPUT)]
    pub input: PathBuf,

    /// Mapped output file
    #[arg(default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Minimum subscribers: an integer or shorthand such as 2.5k or 1m
    #[arg(long, default_value = "0")]
    pub min_subscribers: String,

    /// Merge both supplementary datasets
    #[arg(long)]
    pub merge_other_feeds: bool,

    /// Merge the non-Substack feeds dataset
    #[arg(long)]
    pub merge_non_substack: bool,

    /// Merge the other-Substack feeds dataset
    #[arg(long)]
    pub merge_other_substack: bool,

    /// Location of the non-Substack feeds dataset
    #[arg(long, default_value = NON_SUBSTACK_FEEDS)]
    pub non_substack_feeds: PathBuf,

    /// Location of the other-Substack feeds dataset
    #[arg(long, default_value = OTHER_SUBSTACK_FEEDS)]
    pub other_substack_feeds: PathBuf,
}
