//! Sidestack detail page scraper.
//!
//! A detail page (`/directory/substack/<slug>`) describes one publication.
//! The scraper pulls from it:
//!
//! - the breadcrumb category
//! - page metadata (`<title>`, description, `og:image`)
//! - the "Substack details" card (`<dt>`/`<dd>` pairs: author, first posted,
//!   free and paid subscribers, country, language)
//! - the first JSON-LD block (headline, description, author, language, date)
//! - the publication's `*.substack.com` site, from which the feed URLs derive
//!
//! # Failure Handling
//!
//! [`scrape_detail`] never fails: network errors and bad statuses become a
//! [`FeedRecord`] with an error or not-found status and a reason.

use crate::http::HttpClient;
use crate::models::{FeedRecord, FeedStatus, SidestackMeta, SubstackDetails};
use crate::scrapers::feed::first_verified;
use crate::utils::{
    canonicalize_site, derive_site_from_slug, feed_candidates, non_empty, normalize_ws,
    parse_count_like, slug_from_detail, truncate_for_log,
};
use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

static CATEGORY_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href^="/directory/category/"]"#).unwrap());
static ITEM_NAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"span[property="name"]"#).unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static META_DESCRIPTION: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[name="description"], meta[property="og:description"]"#).unwrap()
});
static OG_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).unwrap());
static H2_OR_DL: Lazy<Selector> = Lazy::new(|| Selector::parse("h2, dl").unwrap());
static DT: Lazy<Selector> = Lazy::new(|| Selector::parse("dt").unwrap());
static DD: Lazy<Selector> = Lazy::new(|| Selector::parse("dd").unwrap());
static JSON_LD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

static SUBSTACK_SITE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https?://([a-z0-9-]+(?:\.[a-z0-9-]+)*)\.substack\.com(?:/[^\s"'<>)]*)?"#)
        .unwrap()
});
static FIRST_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Everything extracted from a detail page's HTML.
#[derive(Debug, Default, PartialEq)]
pub struct DetailPage {
    pub category: Option<String>,
    pub sidestack: SidestackMeta,
    pub details: SubstackDetails,
    /// Canonical Substack site linked from the page, if any.
    pub site: Option<String>,
}

fn element_text(el: ElementRef<'_>) -> String {
    normalize_ws(&el.text().collect::<String>())
}

fn attr_text(document: &Html, selector: &Selector, attr: &str) -> Option<String> {
    document
        .select(selector)
        .find_map(|el| el.value().attr(attr).and_then(non_empty))
}

/// Breadcrumb category: the link's `span[property="name"]` if present,
/// otherwise the link text.
fn extract_category(document: &Html) -> Option<String> {
    document
        .select(&CATEGORY_LINK)
        .map(|link| {
            link.select(&ITEM_NAME)
                .map(element_text)
                .find(|s| !s.is_empty())
                .unwrap_or_else(|| element_text(link))
        })
        .find(|s| !s.is_empty())
}

fn extract_meta(document: &Html) -> SidestackMeta {
    SidestackMeta {
        page_title: document
            .select(&TITLE)
            .map(element_text)
            .find(|s| !s.is_empty()),
        meta_description: attr_text(document, &META_DESCRIPTION, "content"),
        og_image: attr_text(document, &OG_IMAGE, "content"),
    }
}

/// `(label, value)` pairs of the `<dl>` following the "Substack details"
/// heading, in page order.
fn extract_details_card(document: &Html) -> Vec<(String, String)> {
    let mut seen_heading = false;
    let Some(dl) = document.select(&H2_OR_DL).find(|el| {
        if el.value().name() == "h2" {
            seen_heading |= element_text(*el).eq_ignore_ascii_case("substack details");
            false
        } else {
            seen_heading
        }
    }) else {
        return Vec::new();
    };

    let labels = dl.select(&DT).map(|dt| {
        element_text(dt)
            .trim_matches(|c: char| c.is_whitespace() || c == '-' || c == ':')
            .to_string()
    });
    let values = dl.select(&DD).map(element_text);
    labels
        .zip(values)
        .filter(|(label, _)| !label.is_empty())
        .collect()
}

fn apply_card(details: &mut SubstackDetails, card: &[(String, String)]) {
    for (label, value) in card {
        let value = non_empty(value);
        match label.to_lowercase().as_str() {
            "author" => details.author_name = value,
            "first posted" => details.first_posted = value,
            "free subscribers" => {
                details.free_subscribers_count = value.as_deref().and_then(parse_count_like)
            }
            "paid subscribers" => {
                details.paid_subscribers_count = value.as_deref().and_then(parse_count_like)
            }
            "country" => details.country = value,
            "language" => details.language_ui = value,
            other => debug!(label = other, "Ignoring unknown details label"),
        }
    }
}

/// Parse the first JSON-LD block. Blocks that are not strict JSON are
/// retried on their outermost `{...}` span; arrays yield their first object.
fn extract_json_ld(document: &Html) -> Option<Value> {
    let raw = document
        .select(&JSON_LD)
        .next()?
        .text()
        .collect::<String>();
    let parsed = serde_json::from_str::<Value>(raw.trim()).or_else(|e| {
        debug!(error = %e, block = %truncate_for_log(raw.trim(), 200), "Lenient JSON-LD parse");
        let span = FIRST_OBJECT.find(&raw).map(|m| m.as_str()).unwrap_or_default();
        serde_json::from_str::<Value>(span)
    });
    match parsed.ok()? {
        Value::Array(items) => items.into_iter().find(Value::is_object),
        obj @ Value::Object(_) => Some(obj),
        _ => None,
    }
}

fn json_str(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).and_then(non_empty)
}

fn apply_json_ld(details: &mut SubstackDetails, ld: &Value) {
    let set_if = |current: &mut Option<String>, new: Option<String>| {
        if new.is_some() {
            *current = new;
        }
    };
    set_if(&mut details.headline, json_str(ld, "headline"));
    set_if(&mut details.description, json_str(ld, "description"));
    set_if(&mut details.in_language, json_str(ld, "inLanguage"));
    set_if(&mut details.date_published, json_str(ld, "datePublished"));

    let author = match ld.get("author") {
        Some(Value::Array(list)) => list.first(),
        other => other,
    };
    match author {
        Some(Value::String(name)) => set_if(&mut details.author_name, non_empty(name)),
        Some(obj @ Value::Object(_)) => {
            set_if(&mut details.author_name, json_str(obj, "name"));
            set_if(&mut details.author_image, json_str(obj, "image"));
        }
        _ => {}
    }

    if details.author_image.is_none() {
        details.author_image = match ld.get("image") {
            Some(Value::String(url)) => non_empty(url),
            Some(img @ Value::Object(_)) => json_str(img, "url"),
            _ => None,
        };
    }
}

/// First `*.substack.com` link on the page, skipping `my.substack.com`.
fn extract_site(html: &str) -> Option<String> {
    SUBSTACK_SITE
        .captures_iter(html)
        .find(|caps| !caps[1].eq_ignore_ascii_case("my"))
        .map(|caps| canonicalize_site(&caps[0]))
}

/// Parse a detail page.
pub fn parse_detail_page(html: &str) -> DetailPage {
    let document = Html::parse_document(html);
    let mut details = SubstackDetails::default();
    apply_card(&mut details, &extract_details_card(&document));
    if let Some(ld) = extract_json_ld(&document) {
        apply_json_ld(&mut details, &ld);
    }
    DetailPage {
        category: extract_category(&document),
        sidestack: extract_meta(&document),
        details,
        site: extract_site(html),
    }
}

/// Build the record for a parsed page, before feed verification.
pub fn build_record(detail_url: &str, page: DetailPage) -> FeedRecord {
    let slug = slug_from_detail(detail_url);
    let site = page.site.unwrap_or_else(|| derive_site_from_slug(&slug));
    let [feed_url, alternate_feed_url] = feed_candidates(&site);
    let name = page
        .details
        .headline
        .clone()
        .or_else(|| page.sidestack.page_title.clone());

    FeedRecord {
        slug,
        detail_url: Some(detail_url.to_string()),
        name,
        subscribers: page.details.total_subscribers(),
        feed_url: Some(feed_url),
        alternate_feed_url: Some(alternate_feed_url),
        feed_verified_url: None,
        website: Some(site),
        category: page.category,
        status: FeedStatus::Ok,
        reason: None,
        sidestack: page.sidestack,
        details: Some(page.details),
        scraped_at: None,
    }
}

/// Try the record's feed candidates in order. The first one that answers
/// with feed XML becomes `feed_verified_url`; if none does, the record is
/// downgraded to [`FeedStatus::Unverified`].
pub async fn apply_verification(client: &HttpClient, record: &mut FeedRecord) {
    let candidates: Vec<String> = [&record.feed_url, &record.alternate_feed_url]
        .into_iter()
        .flatten()
        .cloned()
        .collect();
    record.feed_verified_url = first_verified(client, &candidates).await;
    if record.feed_verified_url.is_none() {
        record.status = FeedStatus::Unverified;
        record.reason =
            Some("could not confirm feed XML (possible rate limit or non-standard feed)".into());
    }
}

/// Fetch, parse and (optionally) verify one detail page.
///
/// Always returns a record; failures are reported through its status.
#[instrument(level = "info", skip(client))]
pub async fn scrape_detail(client: &HttpClient, detail_url: &str, verify_feeds: bool) -> FeedRecord {
    let slug = slug_from_detail(detail_url);
    let mut record = match client.get_text(detail_url).await {
        Ok(html) => build_record(detail_url, parse_detail_page(&html)),
        Err(e) if e.is_not_found() => {
            warn!(error = %e, "Detail page not found");
            FeedRecord::failed(&slug, detail_url, FeedStatus::NotFound, e.to_string())
        }
        Err(e) => {
            warn!(error = %e, "Detail fetch failed");
            FeedRecord::failed(&slug, detail_url, FeedStatus::Error, e.to_string())
        }
    };

    if record.status == FeedStatus::Ok && verify_feeds {
        apply_verification(client, &mut record).await;
    }

    record.scraped_at = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
    info!(status = record.status.as_str(), site = ?record.website, "Scraped detail page");
    record
}

/// A representative detail page used by tests across the crate.
#[cfg(test)]
pub(crate) const DETAIL_PAGE: &str = r#"<!DOCTYPE html>
<html><head>
  <title>  Noahpinion  |  Sidestack </title>
  <meta name="description" content="Economics &amp; other   stuff">
  <meta property="og:image" content="https://cdn.sidestack.io/noah.png">
  <script type="application/ld+json">
{"@type": "WebPage", "headline": "Noahpinion", "inLanguage": "en",
 "datePublished": "2021-03-01",
 "author": [{"name": "Noah Smith", "image": "https://img/noah.jpg"}]}
  </script>
</head><body>
  <nav><a href="/directory/category/economics"><span property="name"> Economics </span></a></nav>
  <h2>About</h2>
  <dl><dt>Ignored</dt><dd>nothing</dd></dl>
  <h2> Substack details </h2>
  <dl>
<dt>Author:</dt><dd>Noah</dd>
<dt>First Posted</dt><dd>March 2021</dd>
<dt>Free Subscribers</dt><dd>23K+</dd>
<dt>Paid Subscribers</dt><dd>1,200</dd>
<dt>Country</dt><dd>US</dd>
<dt>Language</dt><dd>English</dd>
  </dl>
  <img src="https://substackcdn.com/image/fetch/x.png">
  <a href="https://my.substack.com/signup">join</a>
  <a href="https://Noahpinion.Substack.com/?utm_source=sidestack">Visit</a>
</body></html>"#;
