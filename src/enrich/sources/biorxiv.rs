//! bioRxiv / medRxiv details API adapter.
//!
//! Both servers share the Cold Spring Harbor API at
//! `api.biorxiv.org/details/{server}/{doi}`. The `published` field carries
//! the DOI of the peer-reviewed version, or the literal string `"NA"`.

use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{PreprintFetch, PreprintMetadata, REASON_UNREACHABLE};
use crate::identifiers::PreprintPlatform;
use crate::net::HttpClient;
use crate::provenance::ProvenanceEntry;
use crate::store::ResearchArticle;
use crate::timestamp;

/// Default bioRxiv API base URL (serves medRxiv too).
const DEFAULT_BASE_URL: &str = "https://api.biorxiv.org";

/// bioRxiv/medRxiv preprint-platform adapter.
#[derive(Debug, Clone)]
pub struct BiorxivAdapter {
    http: HttpClient,
    base_url: String,
}

impl BiorxivAdapter {
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

    /// Fetches preprint metadata for a bioRxiv or medRxiv record by DOI.
    #[instrument(
        skip(self, article),
        fields(doi = article.doi_norm.as_deref().unwrap_or("-"), server = platform.as_str())
    )]
    pub async fn fetch_preprint(
        &self,
        article: &ResearchArticle,
        platform: PreprintPlatform,
    ) -> PreprintFetch {
        let Some(doi_norm) = article.doi_norm.as_deref() else {
            return PreprintFetch::missing("record has no DOI", None);
        };
        let server = match platform {
            PreprintPlatform::Medrxiv => "medrxiv",
            _ => "biorxiv",
        };
        let url = format!("{}/details/{}/{}", self.base_url, server, doi_norm);

        let response = match self.http.get_with_retry(&url, HeaderMap::new()).await {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "biorxiv unreachable");
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
                debug!(error = %error, "biorxiv payload not JSON");
                return PreprintFetch::missing("malformed JSON response", None);
            }
        };
        let entry =
            ProvenanceEntry::new(&url, timestamp::now_iso(), payload.clone()).with_status(status);

        let Some(item) = payload
            .get("collection")
            .and_then(Value::as_array)
            .and_then(|collection| collection.first())
        else {
            return PreprintFetch::missing("no collection entry for DOI", Some(entry));
        };

        // "NA" means no peer-reviewed version yet.
        let published_doi = item
            .get("published")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|doi| !doi.is_empty() && !doi.eq_ignore_ascii_case("na"))
            .map(str::to_string);

        let metadata = PreprintMetadata {
            abstract_text: text_field(item, "abstract"),
            title: text_field(item, "title"),
            published_date: text_field(item, "date"),
            published_journal: text_field(item, "published_journal")
                .or_else(|| text_field(item, "journal")),
            published_doi,
        };

        PreprintFetch::found(metadata, entry)
    }
}

fn text_field(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
