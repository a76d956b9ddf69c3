//! The LLM boundary.
//!
//! The executor only needs one operation: turn a (system, user) prompt pair
//! into completion text. Concrete vendors implement [`LlmClient`]; transient
//! failures surface as [`LlmError`] so the retry wrapper can fire.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

/// Attempts made per record (initial call + retries).
const MAX_ATTEMPTS: u32 = 3;

/// Backoff bounds between attempts.
const BACKOFF_FLOOR: Duration = Duration::from_secs(2);
const BACKOFF_CEILING: Duration = Duration::from_secs(10);

/// Errors surfaced by an LLM client.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Network-level failure reaching the API.
    #[error("{message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },

    /// The API answered with an error status.
    #[error("HTTP {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The API answered 200 but the completion could not be extracted.
    #[error("{message}")]
    MalformedResponse {
        /// Description of the shape problem.
        message: String,
    },
}

impl LlmError {
    /// Short class name used in `ERROR:` explanation sentinels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "TransportError",
            Self::Api { .. } => "ApiError",
            Self::MalformedResponse { .. } => "MalformedResponse",
        }
    }

    /// Whether a retry may help.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Api { status, .. } => matches!(status, 408 | 429) || *status >= 500,
            Self::MalformedResponse { .. } => false,
        }
    }
}

/// A chat-completion backend.
///
/// Implementations must be safe to call concurrently and must surface
/// transient failures as errors rather than empty strings.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Produces completion text for the prompt pair.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        model: &str,
        max_output_tokens: u32,
    ) -> Result<String, LlmError>;
}

/// Calls the client with bounded retries on transient failures
/// (exponential backoff between 2 s and 10 s).
///
/// # Errors
///
/// Returns the last [`LlmError`] once the attempt budget is exhausted or the
/// failure is not transient.
pub async fn complete_with_retry(
    client: &dyn LlmClient,
    system_prompt: &str,
    user_prompt: &str,
    model: &str,
    max_output_tokens: u32,
) -> Result<String, LlmError> {
    let mut attempt = 1;
    loop {
        match client
            .complete(system_prompt, user_prompt, model, max_output_tokens)
            .await
        {
            Ok(content) => return Ok(content),
            Err(error) if error.is_transient() && attempt < MAX_ATTEMPTS => {
                let exponent = attempt.saturating_sub(1).min(8);
                let delay = (BACKOFF_FLOOR * 2u32.saturating_pow(exponent)).min(BACKOFF_CEILING);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient LLM failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                debug!(attempt, error = %error, "LLM call failed");
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails `failures` times, then succeeds.
    struct FlakyClient {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmClient for FlakyClient {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _model: &str,
            _max_output_tokens: u32,
        ) -> Result<String, LlmError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(LlmError::Api {
                    status: 429,
                    message: "slow down".to_string(),
                })
            } else {
                Ok(r#"{"match": true, "explanation": "ok"}"#.to_string())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_429() {
        let client = FlakyClient {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let result = complete_with_retry(&client, "s", "u", "m", 100).await;
        assert!(result.is_ok());
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausts() {
        let client = FlakyClient {
            failures: 10,
            calls: AtomicU32::new(0),
        };
        let result = complete_with_retry(&client, "s", "u", "m", 100).await;
        assert!(matches!(result, Err(LlmError::Api { status: 429, .. })));
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_fails_immediately() {
        struct BadRequestClient;
        #[async_trait]
        impl LlmClient for BadRequestClient {
            async fn complete(
                &self,
                _s: &str,
                _u: &str,
                _m: &str,
                _t: u32,
            ) -> Result<String, LlmError> {
                Err(LlmError::Api {
                    status: 400,
                    message: "bad request".to_string(),
                })
            }
        }
        let result = complete_with_retry(&BadRequestClient, "s", "u", "m", 100).await;
        assert!(matches!(result, Err(LlmError::Api { status: 400, .. })));
    }

    #[test]
    fn test_error_kind_names() {
        assert_eq!(
            LlmError::Transport {
                message: "x".to_string()
            }
            .kind(),
            "TransportError"
        );
        assert_eq!(
            LlmError::Api {
                status: 429,
                message: "x".to_string()
            }
            .kind(),
            "ApiError"
        );
    }
}
