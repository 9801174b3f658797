//! Page fetching with a fixed timeout and a small retry budget.
//!
//! # Architecture
//!
//! - [`PageFetcher`]: core trait, one GET returning the body as text
//! - [`HttpFetcher`]: `reqwest` client with an absolute timeout and an
//!   identifying `User-Agent`; no retries of its own
//! - [`RetryFetch`]: decorator adding bounded retries with exponential
//!   backoff and jitter to any [`PageFetcher`]
//!
//! # Retry Strategy
//!
//! Only failures classified by [`FetchError::is_transient`] are retried.
//! Timeouts and client errors fail immediately.

use crate::config::SiteConfig;
use crate::error::FetchError;
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// A single HTTP GET returning the response body.
///
/// Implementations must be safe to share across concurrent tasks.
pub trait PageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

impl<T: PageFetcher> PageFetcher for &T {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        (**self).fetch(url).await
    }
}

/// Leaf HTTP fetcher backed by one shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &SiteConfig) -> Result<Self, reqwest::Error> {
        Self::new(&config.user_agent, config.timeout())
    }
}

fn classify(url: &str, source: reqwest::Error) -> FetchError {
    if source.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if let Some(status) = source.status() {
        FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source,
        }
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| classify(url, e))?;
        let body = resp.text().await.map_err(|e| classify(url, e))?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}

/// Decorator adding bounded exponential-backoff retries to a [`PageFetcher`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T: PageFetcher> RetryFetch<T> {
    /// Wrap an existing [`PageFetcher`] with a retry budget.
    ///
    /// # Arguments
    ///
    /// * `inner` - The fetcher doing the actual GET
    /// * `max_retries` - Extra attempts after the first failure (2 by default)
    /// * `base_delay` - Delay before the first retry, doubled on each attempt
    ///
    /// # Example
    ///
    /// ```ignore
    /// let http = HttpFetcher::from_config(&config)?;
    /// let fetcher = RetryFetch::new(http, config.retries, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(10),
        }
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T: PageFetcher> PageFetcher for RetryFetch<T> {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0usize;
        loop {
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(%url, attempt, max = self.max_retries, error = %e, "fetch exhausted retries");
                        return Err(e);
                    }
                    let delay = self.delay_for(attempt);
                    warn!(%url, attempt, max = self.max_retries, ?delay, error = %e, "fetch failed; backing off");
                    sleep(delay).await;
                }
            }
        }
    }
}
