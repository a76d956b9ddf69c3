//! Preprints.org manuscript API adapter.

use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{PreprintFetch, PreprintMetadata, REASON_UNREACHABLE};
use crate::net::HttpClient;
use crate::provenance::ProvenanceEntry;
use crate::store::ResearchArticle;
use crate::timestamp;

/// Default Preprints.org API base URL.
const DEFAULT_BASE_URL: &str = "https://www.preprints.org/api";

/// Preprints.org preprint-platform adapter.
#[derive(Debug, Clone)]
pub struct PreprintsOrgAdapter {
    http: HttpClient,
    base_url: String,
}

impl PreprintsOrgAdapter {
    /// Creates the adapter against the public API.
    #[must_use]
    pub fn new(http: HttpClient) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    /// Creates the adapter against a custom base URL (wiremock tests).
    #[must_use]
    pub fn with_base_url(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Rate-limiter key for this source.
    #[must_use]
    pub fn rate_key(&self) -> &'static str {
        "preprints"
    }

    /// Fetches manuscript metadata by DOI.
    #[instrument(skip(self, article), fields(doi = article.doi_norm.as_deref().unwrap_or("-")))]
    pub async fn fetch_preprint(&self, article: &ResearchArticle) -> PreprintFetch {
        let Some(doi_norm) = article.doi_norm.as_deref() else {
            return PreprintFetch::missing("record has no DOI", None);
        };
        let url = format!("{}/manuscript/doi/{}", self.base_url, doi_norm);

        let response = match self.http.get_with_retry(&url, HeaderMap::new()).await {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "preprints.org unreachable");
                return PreprintFetch::missing(REASON_UNREACHABLE, None);
            }
        };

        let status = response.status().as_u16();
        if status != 200 {
            return PreprintFetch::missing(format!("HTTP {status}"), None);
        }

        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(error) => {
                debug!(error = %error, "preprints.org payload not JSON");
                return PreprintFetch::missing("malformed JSON response", None);
            }
        };
        if !payload.is_object() {
            return PreprintFetch::missing("unexpected response shape", None);
        }
        let entry =
            ProvenanceEntry::new(&url, timestamp::now_iso(), payload.clone()).with_status(status);

        // Field names vary between manuscript revisions of the API.
        let metadata = PreprintMetadata {
            abstract_text: text_field(&payload, &["abstract"]),
            title: text_field(&payload, &["title"]),
            published_date: text_field(&payload, &["published_date", "date_published"]),
            published_doi: text_field(&payload, &["published_doi", "peer_reviewed_doi"]),
            published_journal: text_field(&payload, &["published_journal", "journal_name"]),
        };

        PreprintFetch::found(metadata, entry)
    }
}

fn text_field(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    })
}
