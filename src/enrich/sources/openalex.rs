//! OpenAlex works API adapter.
//!
//! OpenAlex stores abstracts as an inverted index (word → positions); the
//! adapter reconstructs the plain text before handing it to the pipeline.

use std::collections::BTreeMap;

use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{
    AbstractFetch, AbstractSource, REASON_NO_ABSTRACT, REASON_NO_DOI, REASON_UNREACHABLE,
};
use crate::net::HttpClient;
use crate::provenance::ProvenanceEntry;
use crate::store::ResearchArticle;
use crate::timestamp;

/// Default OpenAlex API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openalex.org";

/// OpenAlex metadata/abstract adapter.
#[derive(Debug, Clone)]
pub struct OpenAlexAdapter {
    http: HttpClient,
    base_url: String,
}

impl OpenAlexAdapter {
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
}

#[async_trait::async_trait]
impl AbstractSource for OpenAlexAdapter {
    fn key(&self) -> &'static str {
        "openalex"
    }

    fn display_name(&self) -> &'static str {
        "OpenAlex"
    }

    fn rate_key(&self) -> &'static str {
        "openalex"
    }

    #[instrument(skip(self, article), fields(doi = article.doi_norm.as_deref().unwrap_or("-")))]
    async fn fetch_abstract(&self, article: &ResearchArticle) -> AbstractFetch {
        let Some(doi_norm) = article.doi_norm.as_deref() else {
            return AbstractFetch::missing(REASON_NO_DOI, None);
        };
        let url = format!("{}/works/doi:{}", self.base_url, doi_norm);

        let response = match self.http.get_with_retry(&url, HeaderMap::new()).await {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "openalex unreachable");
                return AbstractFetch::missing(REASON_UNREACHABLE, None);
            }
        };

        let status = response.status().as_u16();
        if status != 200 {
            let entry = ProvenanceEntry::new(&url, timestamp::now_iso(), Value::Null)
                .with_status(status);
            return AbstractFetch::missing(format!("HTTP {status}"), Some(entry));
        }

        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(error) => {
                debug!(error = %error, "openalex payload not JSON");
                return AbstractFetch::missing("malformed JSON response", None);
            }
        };
        let entry =
            ProvenanceEntry::new(&url, timestamp::now_iso(), payload.clone()).with_status(status);

        match payload
            .get("abstract_inverted_index")
            .and_then(reconstruct_abstract)
        {
            Some(text) if !text.is_empty() => AbstractFetch::found(text, entry),
            _ => AbstractFetch::missing(REASON_NO_ABSTRACT, Some(entry)),
        }
    }
}

/// Rebuilds plain text from OpenAlex's inverted index: each key is a word,
/// each value the list of positions it occupies.
#[must_use]
pub fn reconstruct_abstract(index: &Value) -> Option<String> {
    let index = index.as_object()?;
    if index.is_empty() {
        return None;
    }

    let mut words_by_position = BTreeMap::new();
    for (word, positions) in index {
        for position in positions.as_array()? {
            words_by_position.insert(position.as_u64()?, word.as_str());
        }
    }

    Some(
        words_by_position
            .values()
            .copied()
            .collect::<Vec<_>>()
            .join(" "),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::enrich::sources::test_support::article;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http() -> HttpClient {
        HttpClient::new("curator-test/0").unwrap().with_max_attempts(1)
    }

    // ==================== Inverted Index Tests ====================

    #[test]
    fn test_reconstruct_abstract_orders_by_position() {
        let index = json!({
            "method.": [4],
            "We": [0],
            "propose": [1],
            "a": [2],
            "new": [3]
        });
        assert_eq!(
            reconstruct_abstract(&index).unwrap(),
            "We propose a new method."
        );
    }

    #[test]
    fn test_reconstruct_abstract_repeated_word() {
        let index = json!({"the": [0, 2], "more": [1], "merrier": [3]});
        assert_eq!(
            reconstruct_abstract(&index).unwrap(),
            "the more the merrier"
        );
    }

    #[test]
    fn test_reconstruct_abstract_empty_or_invalid() {
        assert_eq!(reconstruct_abstract(&json!({})), None);
        assert_eq!(reconstruct_abstract(&json!(null)), None);
        assert_eq!(reconstruct_abstract(&json!({"word": "not-a-list"})), None);
    }

    // ==================== Adapter Integration Tests ====================

    #[tokio::test]
    async fn test_fetch_abstract_reconstructs_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works/doi:10.1234/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "https://openalex.org/W1",
                "abstract_inverted_index": {"Hello": [0], "world.": [1]}
            })))
            .mount(&server)
            .await;

        let adapter = OpenAlexAdapter::with_base_url(http(), server.uri());
        let outcome = adapter.fetch_abstract(&article(Some("10.1234/abc"))).await;

        assert_eq!(outcome.abstract_text.as_deref(), Some("Hello world."));
        assert_eq!(outcome.provenance.unwrap().status, Some(200));
    }

    #[tokio::test]
    async fn test_fetch_abstract_missing_index() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works/doi:10.1234/abc"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "W1"})),
            )
            .mount(&server)
            .await;

        let adapter = OpenAlexAdapter::with_base_url(http(), server.uri());
        let outcome = adapter.fetch_abstract(&article(Some("10.1234/abc"))).await;
        assert_eq!(outcome.failure_reason.as_deref(), Some(REASON_NO_ABSTRACT));
    }

    #[tokio::test]
    async fn test_fetch_abstract_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works/doi:10.9/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let adapter = OpenAlexAdapter::with_base_url(http(), server.uri());
        let outcome = adapter.fetch_abstract(&article(Some("10.9/missing"))).await;
        assert_eq!(outcome.failure_reason.as_deref(), Some("HTTP 404"));
    }
}
