//! Unpaywall adapter for open-access status.
//!
//! Unpaywall requires the caller's contact email as a query parameter. The
//! best OA location's license and PDF URL feed `oa_pdf_url` on the record.

use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::net::HttpClient;
use crate::provenance::ProvenanceEntry;
use crate::timestamp;

/// Default Unpaywall API base URL.
const DEFAULT_BASE_URL: &str = "https://api.unpaywall.org";

/// Normalized open-access facts for one work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OaInfo {
    pub is_oa: Option<bool>,
    pub oa_status: Option<String>,
    pub license: Option<String>,
    pub oa_pdf_url: Option<String>,
}

/// Result of one Unpaywall lookup.
#[derive(Debug, Default)]
pub struct OaFetch {
    /// Parsed OA facts when the lookup succeeded.
    pub info: Option<OaInfo>,
    /// Raw payload envelope for provenance.
    pub provenance: Option<ProvenanceEntry>,
    /// Failure reason when `info` is None.
    pub failure_reason: Option<String>,
}

/// Unpaywall open-access adapter.
#[derive(Debug, Clone)]
pub struct UnpaywallAdapter {
    http: HttpClient,
    base_url: String,
    email: String,
}

impl UnpaywallAdapter {
    /// Creates the adapter against the public API. The contact email is
    /// mandatory for this source.
    #[must_use]
    pub fn new(http: HttpClient, email: String) -> Self {
        Self::with_base_url(http, email, DEFAULT_BASE_URL)
    }

    /// Creates the adapter against a custom base URL (wiremock tests).
    #[must_use]
    pub fn with_base_url(http: HttpClient, email: String, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            email,
        }
    }

    /// Rate-limiter key for this source.
    #[must_use]
    pub fn rate_key(&self) -> &'static str {
        "unpaywall"
    }

    /// Looks up OA status by normalized DOI. Never raises: failures come
    /// back as `failure_reason`.
    #[instrument(skip(self), fields(doi = doi_norm))]
    pub async fn fetch_oa(&self, doi_norm: &str) -> OaFetch {
        let url = format!(
            "{}/v2/{}?email={}",
            self.base_url,
            urlencoding::encode(doi_norm),
            urlencoding::encode(&self.email)
        );

        let response = match self.http.get_with_retry(&url, HeaderMap::new()).await {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "unpaywall unreachable");
                return OaFetch {
                    failure_reason: Some("API returned no data or timed out".to_string()),
                    ..OaFetch::default()
                };
            }
        };

        let status = response.status().as_u16();
        if status != 200 {
            let entry = ProvenanceEntry::new(&url, timestamp::now_iso(), Value::Null)
                .with_status(status);
            return OaFetch {
                provenance: Some(entry),
                failure_reason: Some(format!("HTTP {status}")),
                ..OaFetch::default()
            };
        }

        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(error) => {
                debug!(error = %error, "unpaywall payload not JSON");
                return OaFetch {
                    failure_reason: Some("malformed JSON response".to_string()),
                    ..OaFetch::default()
                };
            }
        };
        let entry =
            ProvenanceEntry::new(&url, timestamp::now_iso(), payload.clone()).with_status(status);

        let best = payload.get("best_oa_location").filter(|v| !v.is_null());
        let info = OaInfo {
            is_oa: payload.get("is_oa").and_then(Value::as_bool),
            oa_status: payload
                .get("oa_status")
                .and_then(Value::as_str)
                .map(str::to_string),
            license: best
                .and_then(|loc| loc.get("license"))
                .and_then(Value::as_str)
                .map(str::to_string),
            oa_pdf_url: best
                .and_then(|loc| loc.get("url_for_pdf"))
                .and_then(Value::as_str)
                .map(str::to_string),
        };

        OaFetch {
            info: Some(info),
            provenance: Some(entry),
            failure_reason: None,
        }
    }
}
