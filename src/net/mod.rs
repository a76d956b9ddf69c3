//! Network layer: retrying HTTP client and per-source rate limiting.
//!
//! Every outbound request in the pipeline goes through [`HttpClient`], and
//! every external API call first acquires the source's [`RateLimiter`] from
//! the shared [`RateLimiterSet`].

mod client;
mod error;
mod rate_limiter;

pub use client::{DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT_SECS, HttpClient};
pub use error::HttpError;
pub use rate_limiter::{RateLimiter, RateLimiterSet, default_rate_table};
