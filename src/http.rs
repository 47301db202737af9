//! Shared HTTP client with per-host request pacing.
//!
//! A single [`HttpClient`] is built per run and cloned into every worker.
//! Clones share the connection pool and the [`HostPacer`], so the pacing
//! gap applies across all workers talking to the same host.

use crate::config::ScraperConfig;
use crate::error::{FeedError, Result};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, instrument};
use url::Url;

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,*/*";

/// Spaces request starts to the same host by at least `gap`.
///
/// Each caller reserves the next free slot for its host under the lock and
/// then sleeps outside of it, so the request itself never holds the lock.
#[derive(Debug)]
pub struct HostPacer {
    gap: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostPacer {
    pub fn new(gap: Duration) -> Self {
        Self {
            gap,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until a request to `host` may start.
    pub async fn wait(&self, host: &str) {
        if self.gap.is_zero() {
            return;
        }
        let slot = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            slots.retain(|_, next| *next > now);
            let slot = slots.get(host).copied().filter(|s| *s > now).unwrap_or(now);
            slots.insert(host.to_string(), slot + self.gap);
            slot
        };
        sleep_until(slot).await;
    }

    #[cfg(test)]
    async fn tracked_hosts(&self) -> usize {
        self.next_slot.lock().await.len()
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    pacer: Arc<HostPacer>,
}

impl HttpClient {
    /// Build the client from crawler settings: user agent, HTML `Accept`
    /// header, per-request timeout, redirects followed.
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(HTML_ACCEPT));
        let inner = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            inner,
            pacer: Arc::new(HostPacer::new(config.pace())),
        })
    }

    /// GET `url` and return the body text. Any non-2xx answer is an
    /// [`FeedError::HttpStatus`].
    #[instrument(level = "debug", skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self.get(url, None).await?;
        Ok(resp.text().await?)
    }

    /// GET `url` with an optional `Accept` override, failing on non-2xx.
    pub async fn get(&self, url: &str, accept: Option<&'static str>) -> Result<reqwest::Response> {
        let parsed = Url::parse(url).map_err(|e| FeedError::Parse(format!("bad url {url}: {e}")))?;
        self.pacer.wait(parsed.host_str().unwrap_or_default()).await;

        let mut req = self.inner.get(parsed);
        if let Some(accept) = accept {
            req = req.header(ACCEPT, accept);
        }
        let resp = req.send().await?;
        let status = resp.status();
        debug!(%url, status = status.as_u16(), "GET");
        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }
}

/// Unpaced client with a short timeout for tests against local mock servers.
#[cfg(test)]
pub(crate) fn test_client() -> HttpClient {
    let config = ScraperConfig {
        pace_ms: 0,
        request_timeout_secs: 5,
        ..Default::default()
    };
    HttpClient::new(&config).unwrap()
}
