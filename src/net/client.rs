//! Retrying HTTP client shared by every outbound request.
//!
//! The client retries transient failures (HTTP 408/429/5xx, network errors,
//! timeouts) with bounded exponential backoff and returns the final response
//! for the caller to inspect - a 404 is a result, not an error.

use std::time::Duration;

use rand::Rng;
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode, redirect};
use tracing::{debug, instrument, warn};

use super::error::HttpError;

/// Default per-request timeout (seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default number of attempts (initial call + retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Redirect hop limit.
const MAX_REDIRECTS: usize = 10;

/// Backoff bounds: delays grow exponentially from the floor and are capped
/// at the ceiling.
const BACKOFF_FLOOR: Duration = Duration::from_secs(2);
const BACKOFF_CEILING: Duration = Duration::from_secs(60);

/// Maximum random jitter added to each backoff delay.
const MAX_JITTER: Duration = Duration::from_millis(500);

/// HTTP client with retry, redirect following and connection pooling.
///
/// Create one per process and share it; reqwest pools connections internally.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    max_attempts: u32,
}

impl HttpClient {
    /// Creates a client with the given User-Agent and default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Build`] if the underlying client cannot be
    /// constructed (e.g. TLS backend initialization failure).
    pub fn new(user_agent: &str) -> Result<Self, HttpError> {
        Self::with_timeout(user_agent, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a client with an explicit default request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Build`] if the underlying client cannot be built.
    pub fn with_timeout(user_agent: &str, timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(HttpError::Build)?;
        Ok(Self {
            client,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Overrides the attempt budget (initial call + retries).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Issues a GET, retrying transient failures.
    ///
    /// Retryable: HTTP 408, 429, all 5xx, network errors and timeouts.
    /// Anything else - including 4xx like 404/403 - is returned as-is for the
    /// caller to classify. After the attempt budget is exhausted the last
    /// response is returned (or the last network error is raised).
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] only for network-level failures persisting
    /// through every attempt.
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn get_with_retry(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> Result<Response, HttpError> {
        self.get_with_retry_timeout(url, headers, None).await
    }

    /// Like [`get_with_retry`](Self::get_with_retry) with a per-request
    /// timeout override.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] for network-level failures persisting through
    /// every attempt.
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn get_with_retry_timeout(
        &self,
        url: &str,
        headers: HeaderMap,
        timeout: Option<Duration>,
    ) -> Result<Response, HttpError> {
        let mut attempt = 1;
        loop {
            let started = std::time::Instant::now();
            let mut request = self.client.get(url).headers(headers.clone());
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    debug!(
                        attempt,
                        status = status.as_u16(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "http attempt"
                    );
                    if is_retryable_status(status) && attempt < self.max_attempts {
                        let delay = backoff_delay(attempt);
                        warn!(
                            attempt,
                            status = status.as_u16(),
                            delay_ms = delay.as_millis() as u64,
                            "retryable status, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        return Ok(response);
                    }
                }
                Err(error) => {
                    debug!(
                        attempt,
                        error = %error,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "http attempt failed"
                    );
                    if attempt >= self.max_attempts {
                        return Err(if error.is_timeout() {
                            HttpError::timeout(url)
                        } else {
                            HttpError::network(url, error)
                        });
                    }
                    let delay = backoff_delay(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "network error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
            attempt += 1;
        }
    }

    /// Returns the underlying reqwest client for operations not covered by
    /// this wrapper (streaming downloads, POST bodies).
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Statuses worth retrying: request timeout, rate limiting, and server errors.
fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429) || status.is_server_error()
}

/// Exponential backoff bounded to [2 s, 60 s] plus up to 500 ms jitter.
fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let raw = BACKOFF_FLOOR.saturating_mul(2u32.saturating_pow(exponent));
    let capped = raw.min(BACKOFF_CEILING);
    let jitter_ms = rand::thread_rng().gen_range(0..=MAX_JITTER.as_millis() as u64);
    capped + Duration::from_millis(jitter_ms)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // ==================== Backoff Tests ====================

    #[test]
    fn test_backoff_first_retry_at_floor() {
        let delay = backoff_delay(1);
        assert!(delay >= Duration::from_secs(2));
        assert!(delay <= Duration::from_millis(2500));
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let delay = backoff_delay(3);
        assert!(delay >= Duration::from_secs(8));
        assert!(delay <= Duration::from_millis(8500));
    }

    #[test]
    fn test_backoff_capped_at_ceiling() {
        let delay = backoff_delay(12);
        assert!(delay >= Duration::from_secs(60));
        assert!(delay <= Duration::from_millis(60500));
    }

    // ==================== Status Classification Tests ====================

    #[test]
    fn test_retryable_statuses() {
        for code in [408u16, 429, 500, 502, 503, 504] {
            assert!(
                is_retryable_status(StatusCode::from_u16(code).unwrap()),
                "{code} should be retryable"
            );
        }
    }

    #[test]
    fn test_non_retryable_statuses() {
        for code in [200u16, 301, 400, 403, 404, 410, 451] {
            assert!(
                !is_retryable_status(StatusCode::from_u16(code).unwrap()),
                "{code} should not be retryable"
            );
        }
    }

    // ==================== Client Integration Tests ====================

    #[tokio::test]
    async fn test_get_with_retry_success_first_attempt() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpClient::new("curator-test/0").unwrap();
        let response = client
            .get_with_retry(&format!("{}/works", mock_server.uri()), HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_get_with_retry_returns_404_without_retrying() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpClient::new("curator-test/0").unwrap();
        let response = client
            .get_with_retry(&format!("{}/missing", mock_server.uri()), HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(response.status(), 404, "404 must surface, not retry");
    }

    #[tokio::test]
    async fn test_get_with_retry_exhausts_budget_on_5xx() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&mock_server)
            .await;

        // Two attempts: patience for the backoff floor is 2s, acceptable here.
        let client = HttpClient::new("curator-test/0")
            .unwrap()
            .with_max_attempts(2);
        let response = client
            .get_with_retry(&format!("{}/flaky", mock_server.uri()), HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(response.status(), 503, "last response is returned");
    }

    #[tokio::test]
    async fn test_get_with_retry_sends_custom_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/with-headers"))
            .and(header("Referer", "https://arxiv.org/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("Referer", "https://arxiv.org/".parse().unwrap());

        let client = HttpClient::new("curator-test/0").unwrap();
        let response = client
            .get_with_retry(&format!("{}/with-headers", mock_server.uri()), headers)
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_get_with_retry_network_error_after_budget() {
        // Nothing listens on this port; connection is refused immediately.
        let client = HttpClient::new("curator-test/0")
            .unwrap()
            .with_max_attempts(1);
        let result = client
            .get_with_retry("http://127.0.0.1:9/unreachable", HeaderMap::new())
            .await;
        assert!(matches!(result, Err(HttpError::Network { .. })));
    }
}
