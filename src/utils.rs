//! Utility functions for count parsing, URL normalization and string cleanup.
//!
//! This module provides helper functions used throughout the application:
//! - Approximate count parsing (`"23K+"`, `"1.2M"`) for subscriber numbers
//! - Slug extraction and Substack site canonicalization for URLs
//! - Whitespace normalization and truncation for scraped text and logging

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^([0-9]*\.?[0-9]+)([kmb])?\+?$").unwrap());

/// Convert a displayed count such as `"23K+"`, `"1.2M"`, `"100+"` or
/// `"1,234"` to an integer.
///
/// Suffixes are case-insensitive: `k` ×1 000, `m` ×1 000 000,
/// `b` ×1 000 000 000. Fractional results are rounded.
///
/// # Returns
///
/// `None` if the string has no recognizable numeric content.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(parse_count_like("23K+"), Some(23_000));
/// assert_eq!(parse_count_like("n/a"), None);
/// ```
pub fn parse_count_like(s: &str) -> Option<u64> {
    let raw: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    let caps = COUNT_RE.captures(&raw)?;
    let value: f64 = caps[1].parse().ok()?;
    let suffix = caps.get(2).map(|m| m.as_str().to_ascii_lowercase());
    let mult = match suffix.as_deref() {
        Some("k") => 1_000.0,
        Some("m") => 1_000_000.0,
        Some("b") => 1_000_000_000.0,
        _ => 1.0,
    };
    Some((value * mult).round() as u64)
}

/// Collapse runs of whitespace to single spaces and trim the ends.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize whitespace and map empty results to `None`.
pub fn non_empty(s: &str) -> Option<String> {
    let cleaned = normalize_ws(s);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Last non-empty path segment of a detail page URL.
///
/// `https://sidestack.io/directory/substack/a16znews/` yields `a16znews`.
pub fn slug_from_detail(detail_url: &str) -> String {
    let path = match Url::parse(detail_url) {
        Ok(u) => u.path().to_string(),
        Err(_) => detail_url.to_string(),
    };
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Canonical form of a Substack site URL.
///
/// Lowercases scheme and host, drops query (including `utm_*` tracking
/// parameters), fragment and trailing slash. Unparseable input is returned
/// trimmed of its trailing slash.
pub fn canonicalize_site(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.trim_end_matches('/').to_string();
    };
    url.set_query(None);
    url.set_fragment(None);
    url.to_string().trim_end_matches('/').to_string()
}

/// `https://<slug>.substack.com`, used when a detail page links no site.
pub fn derive_site_from_slug(slug: &str) -> String {
    format!("https://{slug}.substack.com")
}

/// Feed URLs to try for a site, in order of preference.
pub fn feed_candidates(site: &str) -> [String; 2] {
    [format!("{site}/feed"), format!("{site}/feed.xml")]
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes (on a character
/// boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count_like() {
        assert_eq!(parse_count_like("23K+"), Some(23_000));
        assert_eq!(parse_count_like("1.2M"), Some(1_200_000));
        assert_eq!(parse_count_like("100+"), Some(100));
        assert_eq!(parse_count_like("1,234"), Some(1_234));
        assert_eq!(parse_count_like(" 2b "), Some(2_000_000_000));
        assert_eq!(parse_count_like("0.5k"), Some(500));
    }

    #[test]
    fn test_parse_count_like_rejects_text() {
        assert_eq!(parse_count_like(""), None);
        assert_eq!(parse_count_like("n/a"), None);
        assert_eq!(parse_count_like("Hidden"), None);
        assert_eq!(parse_count_like("12x"), None);
    }

    #[test]
    fn test_slug_from_detail() {
        assert_eq!(
            slug_from_detail("https://sidestack.io/directory/substack/a16znews"),
            "a16znews"
        );
        assert_eq!(
            slug_from_detail("https://sidestack.io/directory/substack/a16znews/"),
            "a16znews"
        );
        assert_eq!(
            slug_from_detail("https://sidestack.io/directory/substack/x?ref=1"),
            "x"
        );
    }

    #[test]
    fn test_canonicalize_site() {
        assert_eq!(
            canonicalize_site("HTTPS://Foo.Substack.com/?utm_source=sidestack"),
            "https://foo.substack.com"
        );
        assert_eq!(
            canonicalize_site("https://foo.substack.com/p/post#comments"),
            "https://foo.substack.com/p/post"
        );
    }

    #[test]
    fn test_feed_candidates() {
        let [a, b] = feed_candidates("https://foo.substack.com");
        assert_eq!(a, "https://foo.substack.com/feed");
        assert_eq!(b, "https://foo.substack.com/feed.xml");
        assert_eq!(derive_site_from_slug("foo"), "https://foo.substack.com");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  a \n b  "), Some("a b".to_string()));
        assert_eq!(non_empty(" \t "), None);
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_char_boundary() {
        let result = truncate_for_log("ééé", 3);
        assert_eq!(result, "é…(+4 bytes)");
    }
}
