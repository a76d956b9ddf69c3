//! Per-source rate limiting for external API calls.
//!
//! Each scholarly API gets its own [`RateLimiter`] enforcing a minimum
//! interval between calls. Limiters for different sources are independent,
//! so a slow arXiv cadence never delays Crossref traffic.
//!
//! # Example
//!
//! ```
//! use curator::net::RateLimiterSet;
//!
//! # async fn example() {
//! let limiters = RateLimiterSet::with_defaults();
//!
//! // Blocks until the arxiv budget allows another call.
//! limiters.acquire("arxiv").await;
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// Canonical per-source call budgets (calls per second). Overridable through
/// [`RateLimiterSet::with_rates`].
const DEFAULT_RATES: &[(&str, f64)] = &[
    ("arxiv", 0.1),
    ("crossref", 1.0),
    ("openalex", 5.0),
    ("europepmc", 2.0),
    ("pubmed", 3.0),
    ("semantic-scholar", 5.0),
    ("unpaywall", 5.0),
    ("preprints", 2.0),
];

/// Budget applied to sources without a table entry.
const FALLBACK_CALLS_PER_SECOND: f64 = 1.0;

/// Returns the canonical source → calls-per-second table.
#[must_use]
pub fn default_rate_table() -> Vec<(&'static str, f64)> {
    DEFAULT_RATES.to_vec()
}

/// Token-bucket limiter enforcing a minimum interval between successful
/// `acquire()` returns.
///
/// The last call time lives behind a `tokio::sync::Mutex`, so waiters queue
/// cooperatively and each one observes the interval from its predecessor.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `calls_per_second` calls.
    ///
    /// Non-positive rates are treated as the fallback budget rather than
    /// dividing by zero.
    #[must_use]
    pub fn new(calls_per_second: f64) -> Self {
        let rate = if calls_per_second > 0.0 {
            calls_per_second
        } else {
            FALLBACK_CALLS_PER_SECOND
        };
        Self {
            min_interval: Duration::from_secs_f64(1.0 / rate),
            last_call: Mutex::new(None),
        }
    }

    /// Returns the enforced minimum interval between calls.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the caller may proceed, then stamps the call time.
    ///
    /// The first call returns immediately. The mutex is held across the
    /// sleep so concurrent acquirers are spaced by the full interval each.
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval.saturating_sub(elapsed);
                debug!(wait_ms = wait.as_millis() as u64, "rate limit delay");
                tokio::time::sleep(wait).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

/// Shared map of source key → limiter with the canonical defaults.
///
/// Designed to be wrapped in `Arc` and shared across tasks; each limiter owns
/// its own mutex so acquiring one source never contends with another.
#[derive(Debug)]
pub struct RateLimiterSet {
    limiters: HashMap<String, Arc<RateLimiter>>,
    fallback: Arc<RateLimiter>,
}

impl RateLimiterSet {
    /// Creates the set from the canonical default table.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::with_rates(DEFAULT_RATES.iter().copied())
    }

    /// Creates the set from an explicit source → calls-per-second table.
    #[must_use]
    #[instrument(skip(rates))]
    pub fn with_rates<'a>(rates: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        let limiters = rates
            .into_iter()
            .map(|(source, rate)| (source.to_string(), Arc::new(RateLimiter::new(rate))))
            .collect();
        Self {
            limiters,
            fallback: Arc::new(RateLimiter::new(FALLBACK_CALLS_PER_SECOND)),
        }
    }

    /// Acquires the limiter for `source`, falling back to the conservative
    /// default budget for unknown sources.
    pub async fn acquire(&self, source: &str) {
        self.limiter(source).acquire().await;
    }

    /// Returns the limiter for `source` (shared handle).
    #[must_use]
    pub fn limiter(&self, source: &str) -> Arc<RateLimiter> {
        self.limiters
            .get(source)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}
