//! Error types for the network layer.

use thiserror::Error;

/// Errors surfaced by [`super::HttpClient`].
///
/// HTTP error *statuses* are not errors at this layer: `get_with_retry`
/// returns the final response for the caller to inspect, and only
/// network-level failures (after retries are exhausted) become `HttpError`.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Failed to construct the underlying client.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// Network-level error (DNS, connection refused, TLS, ...).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out after all retry attempts.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The provided URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl HttpError {
    /// Creates a network error with the request URL as context.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display_includes_url() {
        let error = HttpError::timeout("https://api.example.org/works");
        let msg = error.to_string();
        assert!(msg.contains("timeout"));
        assert!(msg.contains("https://api.example.org/works"));
    }

    #[test]
    fn test_invalid_url_display() {
        let error = HttpError::invalid_url("not-a-url");
        assert!(error.to_string().contains("invalid URL"));
    }
}
