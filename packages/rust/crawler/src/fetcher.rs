//! Single-URL HTTP fetch with timeout, retry, and exponential backoff.

use std::time::Duration;

use rand::seq::IndexedRandom;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use textcrawl_shared::{CrawlConfig, Result, TextCrawlError};
use tracing::{debug, warn};

use crate::normalizer::CanonicalUrl;

/// `Accept` header sent with every request.
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml";

/// Outcome of [`Fetcher::fetch`].
///
/// `status == 0` means every attempt failed at the transport level. A
/// non-HTML response keeps its real status but has an empty body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// HTTP status code, or `0` when retries were exhausted.
    pub status: u16,
    /// Response text; empty for non-HTML responses.
    pub body: String,
}

impl FetchResult {
    /// The sentinel returned after all attempts failed.
    pub fn exhausted() -> Self {
        Self {
            status: 0,
            body: String::new(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.status == 0
    }

    /// True when the page should be processed (200 with an HTML body).
    pub fn has_content(&self) -> bool {
        self.status == 200 && !self.body.is_empty()
    }
}

/// Delay slept after the failed attempt with 0-based index `attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// HTTP fetcher with a randomized User-Agent per request.
pub struct Fetcher {
    client: Client,
    user_agents: Vec<String>,
    max_attempts: u32,
    backoff_base: Duration,
}

impl Fetcher {
    /// Build a fetcher from the `[fetch]` settings.
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TextCrawlError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            user_agents: config.user_agents.clone(),
            max_attempts: config.max_attempts.max(1),
            backoff_base: config.backoff_base,
        })
    }

    /// Fetch `url`, retrying transport failures with exponential backoff.
    ///
    /// Never fails: HTTP errors come back as their status code, and
    /// exhausted retries come back as [`FetchResult::exhausted`].
    pub async fn fetch(&self, url: &CanonicalUrl) -> FetchResult {
        for attempt in 0..self.max_attempts {
            match self.fetch_once(url).await {
                Ok(result) => return result,
                Err(e) => {
                    warn!(
                        %url,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "fetch attempt failed"
                    );
                    if attempt + 1 < self.max_attempts {
                        tokio::time::sleep(backoff_delay(self.backoff_base, attempt)).await;
                    }
                }
            }
        }

        warn!(%url, attempts = self.max_attempts, "giving up on URL");
        FetchResult::exhausted()
    }

    async fn fetch_once(&self, url: &CanonicalUrl) -> Result<FetchResult> {
        let mut request = self.client.get(url.as_str()).header(ACCEPT, ACCEPT_HTML);
        if let Some(agent) = self.pick_user_agent() {
            request = request.header(USER_AGENT, agent);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TextCrawlError::Transport(format!("{url}: {e}")))?;

        let status = response.status().as_u16();
        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/html"));

        if !is_html {
            debug!(%url, status, "non-HTML response, nothing to extract");
            return Ok(FetchResult {
                status,
                body: String::new(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| TextCrawlError::Transport(format!("{url}: body read failed: {e}")))?;

        debug!(%url, status, bytes = body.len(), "fetched page");
        Ok(FetchResult { status, body })
    }

    fn pick_user_agent(&self) -> Option<String> {
        self.user_agents.choose(&mut rand::rng()).cloned()
    }
}
