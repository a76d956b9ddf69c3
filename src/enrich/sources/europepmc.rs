//! Europe PMC REST API adapter.
//!
//! Searches by DOI and takes the first hit. Besides the abstract, the
//! payload's `fullTextUrlList` later feeds the PDF resolver via provenance.

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

/// Default Europe PMC REST base URL.
const DEFAULT_BASE_URL: &str = "https://www.ebi.ac.uk/europepmc";

/// Europe PMC abstract adapter.
#[derive(Debug, Clone)]
pub struct EuropePmcAdapter {
    http: HttpClient,
    base_url: String,
}

impl EuropePmcAdapter {
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
impl AbstractSource for EuropePmcAdapter {
    fn key(&self) -> &'static str {
        "epmc"
    }

    fn display_name(&self) -> &'static str {
        "EuropePMC"
    }

    fn rate_key(&self) -> &'static str {
        "europepmc"
    }

    #[instrument(skip(self, article), fields(doi = article.doi_norm.as_deref().unwrap_or("-")))]
    async fn fetch_abstract(&self, article: &ResearchArticle) -> AbstractFetch {
        let Some(doi_norm) = article.doi_norm.as_deref() else {
            return AbstractFetch::missing(REASON_NO_DOI, None);
        };
        let url = format!(
            "{}/webservices/rest/search?query=DOI:{}&format=json&resultType=core",
            self.base_url,
            urlencoding::encode(doi_norm)
        );

        let response = match self.http.get_with_retry(&url, HeaderMap::new()).await {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "europepmc unreachable");
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
                debug!(error = %error, "europepmc payload not JSON");
                return AbstractFetch::missing("malformed JSON response", None);
            }
        };
        let entry =
            ProvenanceEntry::new(&url, timestamp::now_iso(), payload.clone()).with_status(status);

        let first_result = payload
            .get("resultList")
            .and_then(|list| list.get("result"))
            .and_then(Value::as_array)
            .and_then(|results| results.first());

        let Some(result) = first_result else {
            return AbstractFetch::missing("no result for DOI", Some(entry));
        };

        let pmid = result
            .get("pmid")
            .and_then(Value::as_str)
            .map(str::to_string);

        match result.get("abstractText").and_then(Value::as_str) {
            Some(text) if !text.trim().is_empty() => {
                let mut outcome = AbstractFetch::found(text.trim().to_string(), entry);
                outcome.pmid = pmid;
                outcome
            }
            _ => {
                let mut outcome = AbstractFetch::missing(REASON_NO_ABSTRACT, Some(entry));
                outcome.pmid = pmid;
                outcome
            }
        }
    }
}

/// Extracts PDF fulltext URLs from a raw Europe PMC payload. Used by the
/// PDF resolver over stored provenance.
#[must_use]
pub fn pdf_fulltext_urls_from_payload(payload: &Value) -> Vec<String> {
    let Some(results) = payload
        .get("resultList")
        .and_then(|list| list.get("result"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    results
        .iter()
        .filter_map(|result| {
            result
                .get("fullTextUrlList")
                .and_then(|list| list.get("fullTextUrl"))
                .and_then(Value::as_array)
        })
        .flatten()
        .filter_map(|entry| {
            let style = entry.get("documentStyle").and_then(Value::as_str)?;
            if style.eq_ignore_ascii_case("pdf") {
                entry.get("url").and_then(Value::as_str).map(str::to_string)
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::enrich::sources::test_support::article;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http() -> HttpClient {
        HttpClient::new("curator-test/0").unwrap().with_max_attempts(1)
    }

    #[test]
    fn test_pdf_fulltext_url_extraction() {
        let payload = json!({
            "resultList": {"result": [{
                "fullTextUrlList": {"fullTextUrl": [
                    {"documentStyle": "html", "url": "https://epmc.example.org/h"},
                    {"documentStyle": "pdf", "url": "https://epmc.example.org/p.pdf"}
                ]}
            }]}
        });
        assert_eq!(
            pdf_fulltext_urls_from_payload(&payload),
            vec!["https://epmc.example.org/p.pdf".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fetch_abstract_takes_first_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/webservices/rest/search"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resultList": {"result": [
                    {"pmid": "12345", "abstractText": "First abstract."},
                    {"pmid": "67890", "abstractText": "Second abstract."}
                ]}
            })))
            .mount(&server)
            .await;

        let adapter = EuropePmcAdapter::with_base_url(http(), server.uri());
        let outcome = adapter.fetch_abstract(&article(Some("10.1234/abc"))).await;

        assert_eq!(outcome.abstract_text.as_deref(), Some("First abstract."));
        assert_eq!(outcome.pmid.as_deref(), Some("12345"));
    }

    #[tokio::test]
    async fn test_fetch_abstract_empty_result_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/webservices/rest/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"resultList": {"result": []}})),
            )
            .mount(&server)
            .await;

        let adapter = EuropePmcAdapter::with_base_url(http(), server.uri());
        let outcome = adapter.fetch_abstract(&article(Some("10.1234/abc"))).await;
        assert_eq!(outcome.failure_reason.as_deref(), Some("no result for DOI"));
    }
}
