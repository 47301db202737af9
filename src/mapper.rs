//! Subscriber-count filter over a scraped collection.
//!
//! The mapper reads `feeds.json`, keeps records that are `ok`, have a feed URL
//! and at least `min_subscribers` subscribers, flattens each into a
//! [`MappedFeed`] and writes `feeds_mapped.json`. Supplementary datasets can
//! be merged in; their records skip the status and threshold checks.
//!
//! Output order is deterministic (primary records by slug, then supplementary
//! records in file order), so re-running on the same input reproduces the
//! same bytes.

use crate::error::{FeedError, Result};
use crate::models::{FeedRecord, FeedStatus, SubstackDetails};
use crate::outputs::json::{read_list, read_records, write_json};
use crate::utils::{non_empty, parse_count_like};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

pub const DEFAULT_INPUT: &str = "feeds.json";
pub const DEFAULT_OUTPUT: &str = "feeds_mapped.json";
pub const NON_SUBSTACK_FEEDS: &str = "non_substack_feeds.json";
pub const OTHER_SUBSTACK_FEEDS: &str = "other_substack_feeds.json";

static THRESHOLD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^([0-9]+(?:\.[0-9]+)?)([km])?$").unwrap());

/// Parse a subscriber threshold: a plain integer or a decimal with a
/// case-insensitive `k` (×1 000) or `m` (×1 000 000) suffix. Commas are
/// accepted as thousands separators.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(parse_threshold("2.5k")?, 2_500);
/// assert_eq!(parse_threshold("1M")?, 1_000_000);
/// ```
///
/// # Errors
///
/// [`FeedError::Argument`] for anything else, including negative numbers
/// and a fraction left over without a suffix (`"1.5"`).
pub fn parse_threshold(raw: &str) -> Result<u64> {
    let cleaned = raw.trim().replace(',', "");
    let invalid = || {
        FeedError::Argument(format!(
            "--min-subscribers expects an integer or shorthand like 2.5k or 1m, got {raw:?}"
        ))
    };
    let caps = THRESHOLD_RE.captures(&cleaned).ok_or_else(invalid)?;
    let number = &caps[1];
    match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        None if number.contains('.') => Err(invalid()),
        None => number.parse::<u64>().map_err(|_| invalid()),
        Some(suffix) => {
            let mult = if suffix == "k" { 1_000.0 } else { 1_000_000.0 };
            let value: f64 = number.parse().map_err(|_| invalid())?;
            Ok((value * mult).round() as u64)
        }
    }
}

/// Filter settings for one mapper run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub min_subscribers: u64,
    pub merge_non_substack: bool,
    pub merge_other_substack: bool,
}

impl FilterCriteria {
    /// `true` if a primary record belongs in the output.
    pub fn accepts(&self, record: &FeedRecord) -> bool {
        record.status == FeedStatus::Ok
            && record.subscriber_count() >= self.min_subscribers
            && record.best_feed_url().is_some()
    }
}

/// One entry of the mapped output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MappedFeed {
    pub slug: String,
    pub headline: String,
    pub author_name: String,
    pub language: String,
    pub feed_url: String,
    pub category: String,
    pub subscribers: u64,
    pub status: String,
}

impl MappedFeed {
    /// Flatten a record. `None` when it has no usable feed URL.
    pub fn from_record(record: &FeedRecord) -> Option<Self> {
        let feed_url = record.best_feed_url()?.to_string();
        let details = record.details.clone().unwrap_or_default();
        let text = |v: Option<&str>| v.map(str::trim).unwrap_or_default().to_string();
        Some(MappedFeed {
            slug: record.slug.clone(),
            headline: text(details.headline.as_deref().or(record.name.as_deref())),
            author_name: text(details.author_name.as_deref()),
            language: text(details.language()),
            feed_url,
            category: text(record.category.as_deref()),
            subscribers: record.subscriber_count(),
            status: record.status.as_str().to_string(),
        })
    }
}

/// One entry of a supplementary feed list.
///
/// Curated lists use flat keys (`title` or `headline`, `author_name`,
/// `language`, `total_subscribers`) while files produced by the scraper
/// carry `name` and a nested `details` block; both shapes are read. Text
/// fields take strings or numbers, counts take numbers or strings like
/// `"2.5k"`, and anything unusable reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SupplementaryFeed {
    #[serde(deserialize_with = "loose_text")]
    pub slug: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub headline: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub author_name: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub language: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub feed_verified_url: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub feed_url: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub category: Option<String>,
    #[serde(deserialize_with = "loose_count")]
    pub total_subscribers: Option<u64>,
    #[serde(deserialize_with = "loose_count")]
    pub subscribers: Option<u64>,
    #[serde(deserialize_with = "loose_text")]
    pub status: Option<String>,
    #[serde(deserialize_with = "loose_details")]
    pub details: Option<SubstackDetails>,
}

fn loose_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => non_empty(&s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn loose_count<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<u64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Some(Value::String(s)) => parse_count_like(&s),
        _ => None,
    })
}

fn loose_details<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<SubstackDetails>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.and_then(|v| serde_json::from_value(v).ok()))
}

impl SupplementaryFeed {
    fn best_feed_url(&self) -> Option<&str> {
        self.feed_verified_url.as_deref().or(self.feed_url.as_deref())
    }
}

impl MappedFeed {
    /// Flatten a supplementary entry. Top-level keys win over `details`;
    /// `None` when it has no feed URL.
    pub fn from_supplementary(feed: &SupplementaryFeed) -> Option<Self> {
        let feed_url = feed.best_feed_url()?.to_string();
        let details = feed.details.clone().unwrap_or_default();
        let text = |v: Option<&str>| v.unwrap_or_default().to_string();
        Some(MappedFeed {
            slug: text(feed.slug.as_deref()),
            headline: text(
                feed.headline
                    .as_deref()
                    .or(feed.title.as_deref())
                    .or(details.headline.as_deref())
                    .or(feed.name.as_deref()),
            ),
            author_name: text(feed.author_name.as_deref().or(details.author_name.as_deref())),
            language: text(feed.language.as_deref().or(details.language())),
            feed_url,
            category: text(feed.category.as_deref()),
            subscribers: feed
                .total_subscribers
                .or(feed.subscribers)
                .or(details.total_subscribers())
                .unwrap_or(0),
            status: text(feed.status.as_deref()),
        })
    }
}

/// Primary records accepted by `criteria`, in slug order.
pub fn map_primary(records: &[FeedRecord], criteria: &FilterCriteria) -> Vec<MappedFeed> {
    let mut mapped: Vec<MappedFeed> = records
        .iter()
        .filter(|r| criteria.accepts(r))
        .filter_map(MappedFeed::from_record)
        .collect();
    mapped.sort_by(|a, b| a.slug.cmp(&b.slug));
    mapped.dedup_by(|a, b| a.slug == b.slug);
    mapped
}

/// Append supplementary records in file order, skipping any whose feed URL
/// is empty or already present. Returns how many were added.
pub fn merge_supplementary(out: &mut Vec<MappedFeed>, feeds: &[SupplementaryFeed]) -> usize {
    let mut seen: HashSet<String> = out.iter().map(|m| m.feed_url.clone()).collect();
    let before = out.len();
    for mapped in feeds.iter().filter_map(MappedFeed::from_supplementary) {
        if seen.insert(mapped.feed_url.clone()) {
            out.push(mapped);
        } else {
            debug!(feed_url = %mapped.feed_url, "Skipping duplicate supplementary feed");
        }
    }
    out.len() - before
}

/// File locations for one mapper run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperPaths {
    pub input: PathBuf,
    pub output: PathBuf,
    pub non_substack: PathBuf,
    pub other_substack: PathBuf,
}

impl Default for MapperPaths {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            non_substack: PathBuf::from(NON_SUBSTACK_FEEDS),
            other_substack: PathBuf::from(OTHER_SUBSTACK_FEEDS),
        }
    }
}

/// Supplementary file read; a missing file is an input error, not a
/// missing-primary-input error.
async fn read_supplementary(path: &Path) -> Result<Vec<SupplementaryFeed>> {
    read_list(path).await.map_err(|e| match e {
        FeedError::MissingInput(path) => FeedError::Input {
            source: format!("supplementary file {} does not exist", path.display()).into(),
            path,
        },
        other => other,
    })
}

/// Read, filter, merge and write. Returns the mapped entries.
#[instrument(level = "info", skip_all, fields(input = %paths.input.display(), min_subscribers = criteria.min_subscribers))]
pub async fn map_feeds(paths: &MapperPaths, criteria: &FilterCriteria) -> Result<Vec<MappedFeed>> {
    let records = read_records(&paths.input).await?;
    let mut out = map_primary(&records, criteria);
    info!(read = records.len(), kept = out.len(), "Filtered primary records");

    let supplementary = [
        (criteria.merge_non_substack, &paths.non_substack),
        (criteria.merge_other_substack, &paths.other_substack),
    ];
    for (enabled, path) in supplementary {
        if !enabled {
            continue;
        }
        let extra = read_supplementary(path).await?;
        let added = merge_supplementary(&mut out, &extra);
        info!(path = %path.display(), read = extra.len(), added, "Merged supplementary feeds");
    }

    write_json(&out, &paths.output).await?;
    info!(
        count = out.len(),
        output = %paths.output.display(),
        min_subscribers = criteria.min_subscribers,
        "Wrote mapped feeds"
    );
    Ok(out)
}
