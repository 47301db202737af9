//! Data models for scraped feed sources.
//!
//! This module defines the core data structures used throughout the application:
//! - [`FeedRecord`]: One scraped Sidestack detail page and the feed it resolves to
//! - [`FeedStatus`]: Outcome of scraping a single detail page
//! - [`Collection`]: Slug-keyed set of records written by the scraper and read by the mapper
//! - [`SidestackMeta`], [`SubstackDetails`]: Metadata blocks extracted from a detail page
//!
//! Every field of a record, `slug` included, has a default on read, so a
//! collection edited by hand still loads.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Outcome of scraping one detail page.
///
/// Serialized in lowercase (`"ok"`, `"unverified"`, `"error"`, `"not_found"`).
/// Reading is case-insensitive and accepts the older `FAIL` spelling; any
/// other value, `null` included, reads as [`FeedStatus::Unknown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    /// Detail page parsed and the feed answered with RSS/Atom XML
    /// (or verification was disabled).
    Ok,
    /// Detail page parsed but no feed candidate could be confirmed.
    #[default]
    Unverified,
    /// Network failure, unexpected HTTP status or unparseable page.
    Error,
    /// The detail page answered 404 or 410.
    NotFound,
    /// A status this crate never writes, found in an input file.
    Unknown,
}

impl FeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedStatus::Ok => "ok",
            FeedStatus::Unverified => "unverified",
            FeedStatus::Error => "error",
            FeedStatus::NotFound => "not_found",
            FeedStatus::Unknown => "unknown",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "ok" => FeedStatus::Ok,
            "unverified" => FeedStatus::Unverified,
            "error" | "fail" => FeedStatus::Error,
            "not_found" => FeedStatus::NotFound,
            _ => FeedStatus::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for FeedStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw
            .as_ref()
            .and_then(Value::as_str)
            .map_or(FeedStatus::Unknown, FeedStatus::from_label))
    }
}

/// Page-level metadata of a Sidestack detail page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SidestackMeta {
    pub page_title: Option<String>,
    pub meta_description: Option<String>,
    pub og_image: Option<String>,
}

/// The "Substack details" card merged with the page's JSON-LD block.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SubstackDetails {
    pub headline: Option<String>,
    pub description: Option<String>,
    pub author_name: Option<String>,
    pub author_image: Option<String>,
    pub date_published: Option<String>,
    pub in_language: Option<String>,
    pub first_posted: Option<String>,
    pub free_subscribers_count: Option<u64>,
    pub paid_subscribers_count: Option<u64>,
    pub country: Option<String>,
    pub language_ui: Option<String>,
}

impl SubstackDetails {
    /// Free plus paid subscribers, or `None` when neither count is known.
    pub fn total_subscribers(&self) -> Option<u64> {
        match (self.free_subscribers_count, self.paid_subscribers_count) {
            (None, None) => None,
            (free, paid) => Some(free.unwrap_or(0).saturating_add(paid.unwrap_or(0))),
        }
    }

    /// `in_language` (JSON-LD code) preferred over the card's display language.
    pub fn language(&self) -> Option<&str> {
        [self.in_language.as_deref(), self.language_ui.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

/// One scraped feed source.
///
/// Produced once per detail URL by the worker pool and never modified after
/// it reaches the collector.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FeedRecord {
    /// Last path segment of the detail URL; the record's key in a [`Collection`].
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub detail_url: Option<String>,
    /// Display name: JSON-LD headline, else the page title.
    #[serde(default)]
    pub name: Option<String>,
    /// Free plus paid subscribers, approximate when the site rounds ("23K+").
    #[serde(default)]
    pub subscribers: Option<u64>,
    #[serde(default)]
    pub feed_url: Option<String>,
    #[serde(default)]
    pub alternate_feed_url: Option<String>,
    #[serde(default)]
    pub feed_verified_url: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: FeedStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub sidestack: SidestackMeta,
    #[serde(default)]
    pub details: Option<SubstackDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<String>,
}

impl FeedRecord {
    /// A record for a detail page that could not be scraped.
    pub fn failed(slug: &str, detail_url: &str, status: FeedStatus, reason: String) -> Self {
        FeedRecord {
            slug: slug.to_string(),
            detail_url: Some(detail_url.to_string()),
            status,
            reason: Some(reason),
            ..Default::default()
        }
    }

    /// Best known feed URL: verified, then primary, then alternate.
    pub fn best_feed_url(&self) -> Option<&str> {
        [
            self.feed_verified_url.as_deref(),
            self.feed_url.as_deref(),
            self.alternate_feed_url.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
    }

    /// Subscriber count with unknown treated as zero.
    pub fn subscriber_count(&self) -> u64 {
        self.subscribers.unwrap_or(0)
    }
}

/// Slug-keyed set of feed records.
///
/// Inserting a record whose slug is already present replaces the earlier one,
/// so a collection never holds two records with the same slug. Iteration and
/// serialization are in slug order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    records: BTreeMap<String, FeedRecord>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the one it replaced.
    pub fn insert(&mut self, record: FeedRecord) -> Option<FeedRecord> {
        self.records.insert(record.slug.clone(), record)
    }

    pub fn get(&self, slug: &str) -> Option<&FeedRecord> {
        self.records.get(slug)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeedRecord> {
        self.records.values()
    }

    /// Number of records carrying `status`.
    pub fn count_status(&self, status: FeedStatus) -> usize {
        self.iter().filter(|r| r.status == status).count()
    }

    /// Parse a collection from JSON, accepting either an array of records or
    /// an object keyed by slug. Arrays keep file order; objects come back in
    /// key order, with the key filling in a missing slug.
    pub fn records_from_json(json: &str) -> Result<Vec<FeedRecord>, serde_json::Error> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(map) => map
                .into_iter()
                .map(|(key, value)| -> Result<FeedRecord, serde_json::Error> {
                    let mut record: FeedRecord = serde_json::from_value(value)?;
                    if record.slug.is_empty() {
                        record.slug = key;
                    }
                    Ok(record)
                })
                .collect(),
            other => serde_json::from_value(other),
        }
    }
}

impl FromIterator<FeedRecord> for Collection {
    fn from_iter<I: IntoIterator<Item = FeedRecord>>(iter: I) -> Self {
        let mut collection = Collection::new();
        for record in iter {
            collection.insert(record);
        }
        collection
    }
}

impl Serialize for Collection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.values())
    }
}
