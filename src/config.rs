//! Crawler tuning loaded from an optional YAML file.
//!
//! ```yaml
//! user_agent: "Mozilla/5.0 ..."
//! request_timeout_secs: 20
//! pace_ms: 100
//! verify_feeds: true
//! ```
//!
//! Every key is optional. Command-line flags are applied on top of the file
//! by [`ScraperConfig::with_overrides`].

use crate::error::{FeedError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub user_agent: String,
    /// Per-request timeout; an expired request errors only its own record.
    pub request_timeout_secs: u64,
    /// Minimum gap between request starts to the same host. 0 disables pacing.
    pub pace_ms: u64,
    pub verify_feeds: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 20,
            pace_ms: 100,
            verify_feeds: true,
        }
    }
}

impl ScraperConfig {
    /// Load a config file, or the defaults when `path` is `None`.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FeedError::MissingInput(path.to_path_buf())
            } else {
                FeedError::Io(e)
            }
        })?;
        let config = Self::from_yaml(&text).map_err(|source| FeedError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded scraper config");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> core::result::Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, pace_ms: Option<u64>, no_verify_feeds: bool) -> Self {
        if let Some(pace) = pace_ms {
            self.pace_ms = pace;
        }
        if no_verify_feeds {
            self.verify_feeds = false;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ScraperConfig::from_yaml("pace_ms: 0\n").unwrap();
        assert_eq!(config.pace_ms, 0);
        assert_eq!(config.request_timeout_secs, 20);
        assert!(config.verify_feeds);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(ScraperConfig::from_yaml("").unwrap(), ScraperConfig::default());
    }

    #[test]
    fn test_unknown_types_are_rejected() {
        assert!(ScraperConfig::from_yaml("pace_ms: soon\n").is_err());
    }

    #[test]
    fn test_overrides() {
        let config = ScraperConfig::default().with_overrides(Some(5), true);
        assert_eq!(config.pace(), Duration::from_millis(5));
        assert!(!config.verify_feeds);

        let config = ScraperConfig::default().with_overrides(None, false);
        assert_eq!(config.pace_ms, 100);
        assert!(config.verify_feeds);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "request_timeout_secs: 5\nverify_feeds: false").unwrap();
        let config = ScraperConfig::load(Some(file.path())).await.unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert!(!config.verify_feeds);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = ScraperConfig::load(Some(Path::new("/nonexistent/scraper.yaml")))
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::MissingInput(_)));
    }

    #[tokio::test]
    async fn test_load_without_path() {
        let config = ScraperConfig::load(None).await.unwrap();
        assert_eq!(config, ScraperConfig::default());
    }
}
