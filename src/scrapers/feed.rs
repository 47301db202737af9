//! Feed URL verification.
//!
//! A candidate counts as a feed when it answers 2xx and the first element of
//! the document is an RSS (`rss`, `rdf:RDF`) or Atom (`feed`) root.

use crate::error::Result;
use crate::http::HttpClient;
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, instrument};

const FEED_ACCEPT: &str = "application/rss+xml, application/xml;q=0.9, */*;q=0.8";

/// `true` if the first element of `body` is a feed root.
pub fn looks_like_feed(body: &str) -> bool {
    let mut reader = Reader::from_str(body.trim_start_matches('\u{feff}'));
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return matches!(e.local_name().as_ref(), b"rss" | b"feed" | b"RDF");
            }
            Ok(Event::Eof) | Err(_) => return false,
            Ok(_) => continue,
        }
    }
}

/// Fetch `url` and check that it serves a feed.
///
/// # Errors
///
/// Network failures and non-2xx answers are returned; a 2xx answer that is
/// not a feed is `Ok(false)`.
#[instrument(level = "debug", skip(client))]
pub async fn verify_feed(client: &HttpClient, url: &str) -> Result<bool> {
    let body = client.get(url, Some(FEED_ACCEPT)).await?.text().await?;
    let ok = looks_like_feed(&body);
    debug!(%url, ok, "Checked feed candidate");
    Ok(ok)
}

/// First candidate that verifies, trying them in order.
pub async fn first_verified(client: &HttpClient, candidates: &[String]) -> Option<String> {
    for candidate in candidates {
        match verify_feed(client, candidate).await {
            Ok(true) => return Some(candidate.clone()),
            Ok(false) => debug!(url = %candidate, "Not a feed document"),
            Err(e) => debug!(url = %candidate, error = %e, "Feed candidate failed"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_client;
    use wiremock::matchers::{headers, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- generated -->
<rss version="2.0"><channel><title>t</title></channel></rss>"#;

    #[test]
    fn test_looks_like_feed() {
        assert!(looks_like_feed(RSS));
        assert!(looks_like_feed(
            r#"<feed xmlns="http://www.w3.org/2005/Atom"></feed>"#
        ));
        assert!(looks_like_feed(
            r#"<?xml version="1.0"?><rdf:RDF xmlns:rdf="x"></rdf:RDF>"#
        ));
        assert!(!looks_like_feed("<!DOCTYPE html><html><body>nope</body></html>"));
        assert!(!looks_like_feed(""));
        assert!(!looks_like_feed("rate limited"));
    }

    #[tokio::test]
    async fn test_first_verified_falls_through_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .and(headers("accept", FEED_ACCEPT.split(",").map(str::trim).collect()))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;

        let candidates = vec![
            format!("{}/feed", server.uri()),
            format!("{}/feed.xml", server.uri()),
        ];
        let found = first_verified(&test_client(), &candidates).await;
        assert_eq!(found, Some(candidates[1].clone()));
    }

    #[tokio::test]
    async fn test_html_answer_is_not_verified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let url = format!("{}/feed", server.uri());
        assert!(!verify_feed(&test_client(), &url).await.unwrap());
        assert_eq!(first_verified(&test_client(), &[url]).await, None);
    }
}
