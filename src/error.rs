//! Error taxonomy shared by the scraper and the mapper.
//!
//! Per-URL failures during a crawl ([`FeedError::Network`],
//! [`FeedError::HttpStatus`], [`FeedError::Parse`]) are folded into the
//! affected record's status by the worker pool. Everything else is a setup
//! failure and ends the process with a non-zero exit.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, FeedError>;

#[derive(Debug, Error)]
pub enum FeedError {
    /// Timeout, refused connection, DNS failure and other transport errors.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// Unexpected HTML or JSON shape.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("could not read {}: {source}", .path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("invalid config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FeedError {
    /// `true` for a 404 or 410 answer, which marks a record as not found
    /// rather than errored.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FeedError::HttpStatus { status: 404 | 410, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_statuses() {
        let gone = FeedError::HttpStatus {
            url: "https://example.com".to_string(),
            status: 410,
        };
        let missing = FeedError::HttpStatus {
            url: "https://example.com".to_string(),
            status: 404,
        };
        let busy = FeedError::HttpStatus {
            url: "https://example.com".to_string(),
            status: 503,
        };
        assert!(gone.is_not_found());
        assert!(missing.is_not_found());
        assert!(!busy.is_not_found());
        assert!(!FeedError::Parse("x".into()).is_not_found());
    }

    #[test]
    fn test_display_messages() {
        let e = FeedError::MissingInput(PathBuf::from("feeds.json"));
        assert_eq!(e.to_string(), "input file not found: feeds.json");

        let e = FeedError::HttpStatus {
            url: "https://sidestack.io/x".to_string(),
            status: 500,
        };
        assert_eq!(e.to_string(), "HTTP 500 from https://sidestack.io/x");
    }
}
