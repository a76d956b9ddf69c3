//! Semantic Scholar Graph API adapter.
//!
//! Requires an API key; the abstract pipeline leaves this source out of the
//! chain entirely when none is configured. The `openAccessPdf` URL in the
//! payload is later consumed by the PDF resolver through provenance.

use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{
    AbstractFetch, AbstractSource, REASON_NO_ABSTRACT, REASON_NO_DOI, REASON_UNREACHABLE,
};
use crate::net::HttpClient;
use crate::provenance::ProvenanceEntry;
use crate::store::ResearchArticle;
use crate::timestamp;

/// Default Semantic Scholar Graph API base URL.
const DEFAULT_BASE_URL: &str = "https://api.semanticscholar.org";

/// Fields requested from the works endpoint.
const FIELDS: &str = "title,abstract,externalIds,openAccessPdf";

/// Semantic Scholar metadata/abstract adapter.
#[derive(Debug, Clone)]
pub struct SemanticScholarAdapter {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

impl SemanticScholarAdapter {
    /// Creates the adapter against the public API.
    #[must_use]
    pub fn new(http: HttpClient, api_key: String) -> Self {
        Self::with_base_url(http, api_key, DEFAULT_BASE_URL)
    }

    /// Creates the adapter against a custom base URL (wiremock tests).
    #[must_use]
    pub fn with_base_url(http: HttpClient, api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.api_key) {
            headers.insert("x-api-key", value);
        }
        headers
    }
}

#[async_trait::async_trait]
impl AbstractSource for SemanticScholarAdapter {
    fn key(&self) -> &'static str {
        "s2"
    }

    fn display_name(&self) -> &'static str {
        "Semantic Scholar"
    }

    fn rate_key(&self) -> &'static str {
        "semantic-scholar"
    }

    #[instrument(skip(self, article), fields(doi = article.doi_norm.as_deref().unwrap_or("-")))]
    async fn fetch_abstract(&self, article: &ResearchArticle) -> AbstractFetch {
        let Some(doi_norm) = article.doi_norm.as_deref() else {
            return AbstractFetch::missing(REASON_NO_DOI, None);
        };
        let url = format!(
            "{}/graph/v1/paper/DOI:{}?fields={}",
            self.base_url,
            urlencoding::encode(doi_norm),
            FIELDS
        );

        let response = match self.http.get_with_retry(&url, self.headers()).await {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "semantic scholar unreachable");
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
                debug!(error = %error, "semantic scholar payload not JSON");
                return AbstractFetch::missing("malformed JSON response", None);
            }
        };
        let entry =
            ProvenanceEntry::new(&url, timestamp::now_iso(), payload.clone()).with_status(status);

        match payload.get("abstract").and_then(Value::as_str) {
            Some(text) if !text.trim().is_empty() => {
                AbstractFetch::found(text.trim().to_string(), entry)
            }
            _ => AbstractFetch::missing(REASON_NO_ABSTRACT, Some(entry)),
        }
    }
}

/// Extracts the open-access PDF URL from a raw Semantic Scholar payload.
/// Used by the PDF resolver over stored provenance.
#[must_use]
pub fn open_access_pdf_from_payload(payload: &Value) -> Option<String> {
    payload
        .get("openAccessPdf")?
        .get("url")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::enrich::sources::test_support::article;
    use serde_json::json;
    use wiremock::matchers::{header, method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http() -> HttpClient {
        HttpClient::new("curator-test/0").unwrap().with_max_attempts(1)
    }

    #[test]
    fn test_open_access_pdf_extraction() {
        let payload = json!({"openAccessPdf": {"url": "https://oa.example.org/p.pdf"}});
        assert_eq!(
            open_access_pdf_from_payload(&payload),
            Some("https://oa.example.org/p.pdf".to_string())
        );
        assert_eq!(open_access_pdf_from_payload(&json!({})), None);
    }

    #[tokio::test]
    async fn test_fetch_abstract_sends_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"/graph/v1/paper/DOI:.+"))
            .and(header("x-api-key", "secret-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "T",
                "abstract": "  An abstract.  "
            })))
            .mount(&server)
            .await;

        let adapter =
            SemanticScholarAdapter::with_base_url(http(), "secret-key".to_string(), server.uri());
        let outcome = adapter.fetch_abstract(&article(Some("10.1234/abc"))).await;
        assert_eq!(outcome.abstract_text.as_deref(), Some("An abstract."));
    }

    #[tokio::test]
    async fn test_fetch_abstract_null_abstract() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"/graph/v1/paper/DOI:.+"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"title": "T", "abstract": null})),
            )
            .mount(&server)
            .await;

        let adapter =
            SemanticScholarAdapter::with_base_url(http(), "k".to_string(), server.uri());
        let outcome = adapter.fetch_abstract(&article(Some("10.1234/abc"))).await;
        assert_eq!(outcome.failure_reason.as_deref(), Some(REASON_NO_ABSTRACT));
    }
}
