//! Outbound HTTP with a shared rate-limit clock and bounded retries.
//!
//! Every request the crawler makes, listing pages, article pages and images
//! alike, goes through one [`Fetch`] stack:
//!
//! - [`HttpFetcher`]: the `reqwest` transport (timeout, redirect limit, UA)
//! - [`Throttled`]: enforces a minimum interval between the *starts* of
//!   consecutive requests
//! - [`RetryFetch`]: retries transient failures with doubling backoff
//!
//! The retry layer wraps the throttle so that each individual attempt also
//! waits its turn on the clock.
//!
//! # Backoff Strategy
//!
//! ```text
//! delay(attempt) = base_delay * 2^(attempt-1)
//! ```
//!
//! Redirect loops are never retried.

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use reqwest::{Client, redirect};
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, instrument, warn};

use crate::config::HttpConfig;
use crate::error::{ConfigError, FetchError};

/// A successful response.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Declared `content-length`, if the server sent one.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }
}

/// The fetch capability consumed by the crawler.
pub trait Fetch {
    /// Fetch `url`, giving up with [`FetchError::BodyTooLarge`] as soon as the
    /// body is known to exceed `max_bytes`.
    async fn fetch_limited(
        &self,
        url: &str,
        max_bytes: Option<u64>,
    ) -> Result<FetchResponse, FetchError>;

    /// Fetch `url` with no body limit.
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.fetch_limited(url, None).await
    }
}

fn check_limit(url: &str, size: u64, max_bytes: Option<u64>) -> Result<(), FetchError> {
    match max_bytes {
        Some(limit) if size > limit => Err(FetchError::BodyTooLarge {
            url: url.to_string(),
            size,
            limit,
        }),
        _ => Ok(()),
    }
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(http: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .redirect(redirect::Policy::limited(http.max_redirects))
            .user_agent(http.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

fn classify(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            attempts: 1,
        }
    } else if e.is_redirect() {
        FetchError::TooManyRedirects {
            url: url.to_string(),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_limited(
        &self,
        url: &str,
        max_bytes: Option<u64>,
    ) -> Result<FetchResponse, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Request {
                url: url.to_string(),
                message: format!("HTTP {status}"),
            });
        }

        // Refuse on the declared length before any of the body is read.
        if let Some(declared) = response.content_length() {
            check_limit(url, declared, max_bytes)?;
        }

        let headers = response.headers().clone();
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| classify(url, e))? {
            body.extend_from_slice(&chunk);
            check_limit(url, body.len() as u64, max_bytes)?;
        }
        debug!(status = status.as_u16(), bytes = body.len(), "Fetched");
        Ok(FetchResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// Cooperative self-throttle: at most one request start per `interval`.
///
/// The clock is held for the whole wait, so callers are serialized on it.
pub struct Throttled<T> {
    inner: T,
    interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl<T> Throttled<T> {
    pub fn new(inner: T, interval: Duration) -> Self {
        Self {
            inner,
            interval,
            last_start: Mutex::new(None),
        }
    }

    async fn wait_turn(&self) {
        let mut last = self.last_start.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.interval {
                sleep(self.interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl<T> fmt::Debug for Throttled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttled")
            .field("interval", &self.interval)
            .finish()
    }
}

impl<T: Fetch> Fetch for Throttled<T> {
    async fn fetch_limited(
        &self,
        url: &str,
        max_bytes: Option<u64>,
    ) -> Result<FetchResponse, FetchError> {
        self.wait_turn().await;
        self.inner.fetch_limited(url, max_bytes).await
    }
}

/// Wrapper that adds bounded retries with exponential backoff.
pub struct RetryFetch<T> {
    /// The underlying fetcher.
    inner: T,
    /// Total attempts, including the first one.
    max_attempts: usize,
    /// Delay before the second attempt; doubles afterwards.
    base_delay: Duration,
}

impl<T> RetryFetch<T> {
    pub fn new(inner: T, max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        self.base_delay.saturating_mul(1 << shift)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

impl<T: Fetch> Fetch for RetryFetch<T> {
    #[instrument(level = "debug", skip_all)]
    async fn fetch_limited(
        &self,
        url: &str,
        max_bytes: Option<u64>,
    ) -> Result<FetchResponse, FetchError> {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let err = match self.inner.fetch_limited(url, max_bytes).await {
                Ok(resp) => {
                    debug!(url, attempt, status = resp.status, "fetch succeeded");
                    return Ok(resp);
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                error!(url = err.url(), attempt, error = %err, "fetch failed; not retrying");
                return Err(err);
            }

            if attempt >= self.max_attempts {
                error!(
                    url = err.url(),
                    attempt,
                    max = self.max_attempts,
                    error = %err,
                    "fetch exhausted retries"
                );
                return Err(match err {
                    FetchError::Timeout { url, .. } => FetchError::Timeout {
                        url,
                        attempts: attempt,
                    },
                    other => other,
                });
            }

            let delay = self.delay_for(attempt);
            warn!(
                url = err.url(),
                attempt,
                max = self.max_attempts,
                ?delay,
                error = %err,
                "fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

/// The production stack: retries over a throttled `reqwest` client.
pub type SiteFetcher = RetryFetch<Throttled<HttpFetcher>>;

/// Build the production fetch stack from configuration.
pub fn build_fetcher(http: &HttpConfig) -> Result<SiteFetcher, ConfigError> {
    let transport = HttpFetcher::new(http)?;
    let throttled = Throttled::new(
        transport,
        Duration::from_millis(http.request_interval_ms),
    );
    Ok(RetryFetch::new(
        throttled,
        http.max_attempts,
        Duration::from_millis(http.backoff_base_ms),
    ))
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory fetcher for tests.

    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex as StdMutex;

    /// Serves canned responses by URL and records every request.
    #[derive(Default)]
    pub struct FakeFetcher {
        pages: HashMap<String, FetchResponse>,
        failures: StdMutex<HashMap<String, VecDeque<FetchError>>>,
        pub requests: StdMutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(
                url.to_string(),
                FetchResponse {
                    status: 200,
                    headers: HeaderMap::new(),
                    body: body.as_bytes().to_vec(),
                },
            );
            self
        }

        pub fn with_response(mut self, url: &str, response: FetchResponse) -> Self {
            self.pages.insert(url.to_string(), response);
            self
        }

        /// Queue a failure that is returned before the canned page.
        pub fn with_failure(self, url: &str, err: FetchError) -> Self {
            self.failures
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(err);
            self
        }

        pub fn request_count(&self, url: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|u| u.as_str() == url)
                .count()
        }
    }

    impl Fetch for FakeFetcher {
        async fn fetch_limited(
            &self,
            url: &str,
            max_bytes: Option<u64>,
        ) -> Result<FetchResponse, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            if let Some(err) = self
                .failures
                .lock()
                .unwrap()
                .get_mut(url)
                .and_then(|q| q.pop_front())
            {
                return Err(err);
            }
            let response = self
                .pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Request {
                    url: url.to_string(),
                    message: "HTTP 404 Not Found".to_string(),
                })?;
            if let Some(declared) = response.content_length() {
                check_limit(url, declared, max_bytes)?;
            }
            check_limit(url, response.body.len() as u64, max_bytes)?;
            Ok(response)
        }
    }
}
