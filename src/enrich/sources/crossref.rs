//! Crossref works API adapter.
//!
//! Fetches work metadata by DOI from `https://api.crossref.org/works/{doi}`.
//! Crossref abstracts arrive as JATS XML fragments; they are stripped to
//! plain text. A `mailto` query parameter routes requests into the polite
//! pool when a contact email is configured.

use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{
    AbstractFetch, AbstractSource, REASON_NO_ABSTRACT, REASON_NO_DOI, REASON_UNREACHABLE,
    normalize_whitespace,
};
use crate::net::HttpClient;
use crate::provenance::ProvenanceEntry;
use crate::store::ResearchArticle;
use crate::timestamp;

/// Default Crossref API base URL.
const DEFAULT_BASE_URL: &str = "https://api.crossref.org";

// ==================== Crossref API Response Types ====================

#[derive(Debug, Deserialize)]
pub(crate) struct CrossrefResponse {
    pub message: CrossrefMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct CrossrefMessage {
    /// JATS-flavored abstract fragment.
    #[serde(rename = "abstract")]
    pub abstract_xml: Option<String>,
    pub link: Option<Vec<CrossrefLink>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct CrossrefLink {
    #[serde(rename = "URL")]
    pub url: String,
    pub content_type: Option<String>,
}

// ==================== Adapter ====================

/// Crossref metadata/abstract adapter.
#[derive(Debug, Clone)]
pub struct CrossrefAdapter {
    http: HttpClient,
    base_url: String,
    mailto: Option<String>,
}

impl CrossrefAdapter {
    /// Creates the adapter against the public API.
    #[must_use]
    pub fn new(http: HttpClient, mailto: Option<String>) -> Self {
        Self::with_base_url(http, mailto, DEFAULT_BASE_URL)
    }

    /// Creates the adapter against a custom base URL (wiremock tests).
    #[must_use]
    pub fn with_base_url(
        http: HttpClient,
        mailto: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            mailto,
        }
    }

    fn works_url(&self, doi_norm: &str) -> String {
        let encoded = urlencoding::encode(doi_norm);
        match &self.mailto {
            Some(email) => format!(
                "{}/works/{}?mailto={}",
                self.base_url,
                encoded,
                urlencoding::encode(email)
            ),
            None => format!("{}/works/{}", self.base_url, encoded),
        }
    }
}

#[async_trait::async_trait]
impl AbstractSource for CrossrefAdapter {
    fn key(&self) -> &'static str {
        "crossref"
    }

    fn display_name(&self) -> &'static str {
        "Crossref"
    }

    fn rate_key(&self) -> &'static str {
        "crossref"
    }

    #[instrument(skip(self, article), fields(doi = article.doi_norm.as_deref().unwrap_or("-")))]
    async fn fetch_abstract(&self, article: &ResearchArticle) -> AbstractFetch {
        let Some(doi_norm) = article.doi_norm.as_deref() else {
            return AbstractFetch::missing(REASON_NO_DOI, None);
        };
        let url = self.works_url(doi_norm);

        let response = match self.http.get_with_retry(&url, HeaderMap::new()).await {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "crossref unreachable");
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
                debug!(error = %error, "crossref payload not JSON");
                return AbstractFetch::missing("malformed JSON response", None);
            }
        };
        let entry =
            ProvenanceEntry::new(&url, timestamp::now_iso(), payload.clone()).with_status(status);

        let Ok(parsed) = serde_json::from_value::<CrossrefResponse>(payload) else {
            return AbstractFetch::missing("unexpected response shape", Some(entry));
        };

        match parsed.message.abstract_xml.as_deref().map(strip_jats_tags) {
            Some(text) if !text.is_empty() => AbstractFetch::found(text, entry),
            _ => AbstractFetch::missing(REASON_NO_ABSTRACT, Some(entry)),
        }
    }
}

/// Extracts the first link with `content-type: application/pdf` from a raw
/// Crossref payload. Used by the PDF resolver over stored provenance.
#[must_use]
pub fn pdf_link_from_payload(payload: &Value) -> Option<String> {
    let links = payload.get("message")?.get("link")?.as_array()?;
    links.iter().find_map(|link| {
        let content_type = link.get("content-type")?.as_str()?;
        if content_type
            .split(';')
            .next()
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/pdf"))
        {
            link.get("URL")?.as_str().map(str::to_string)
        } else {
            None
        }
    })
}

/// Strips JATS/XML tags from a Crossref abstract fragment and collapses
/// whitespace.
fn strip_jats_tags(fragment: &str) -> String {
    let mut text = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    normalize_whitespace(&text)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::enrich::sources::test_support::article;

    fn article_with_doi(doi: &str) -> ResearchArticle {
        article(Some(doi))
    }

    fn http() -> HttpClient {
        HttpClient::new("curator-test/0").unwrap().with_max_attempts(1)
    }

    // ==================== JATS Stripping Tests ====================

    #[test]
    fn test_strip_jats_tags() {
        let fragment = "<jats:p>We propose a <jats:italic>novel</jats:italic>\n method.</jats:p>";
        assert_eq!(strip_jats_tags(fragment), "We propose a novel method.");
    }

    #[test]
    fn test_strip_jats_tags_plain_text_passthrough() {
        assert_eq!(strip_jats_tags("Plain abstract."), "Plain abstract.");
    }

    // ==================== PDF Link Extraction Tests ====================

    #[test]
    fn test_pdf_link_from_payload_prefers_pdf_content_type() {
        let payload = json!({
            "message": {
                "link": [
                    {"URL": "https://pub.example.org/x.xml", "content-type": "text/xml"},
                    {"URL": "https://pub.example.org/x.pdf", "content-type": "application/pdf"}
                ]
            }
        });
        assert_eq!(
            pdf_link_from_payload(&payload),
            Some("https://pub.example.org/x.pdf".to_string())
        );
    }

    #[test]
    fn test_pdf_link_from_payload_none_without_links() {
        assert_eq!(pdf_link_from_payload(&json!({"message": {}})), None);
    }

    // ==================== Adapter Integration Tests ====================

    #[tokio::test]
    async fn test_fetch_abstract_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"/works/10\..+"))
            .and(query_param("mailto", "lib@example.org"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "message": {"abstract": "<jats:p>An abstract.</jats:p>"}
            })))
            .mount(&server)
            .await;

        let adapter = CrossrefAdapter::with_base_url(
            http(),
            Some("lib@example.org".to_string()),
            server.uri(),
        );
        let outcome = adapter.fetch_abstract(&article_with_doi("10.1234/abc")).await;

        assert_eq!(outcome.abstract_text.as_deref(), Some("An abstract."));
        let entry = outcome.provenance.unwrap();
        assert_eq!(entry.status, Some(200));
        assert!(entry.payload.get("message").is_some());
    }

    #[tokio::test]
    async fn test_fetch_abstract_404_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"/works/.+"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let adapter = CrossrefAdapter::with_base_url(http(), None, server.uri());
        let outcome = adapter.fetch_abstract(&article_with_doi("10.9/missing")).await;

        assert!(outcome.abstract_text.is_none());
        assert_eq!(outcome.failure_reason.as_deref(), Some("HTTP 404"));
    }

    #[tokio::test]
    async fn test_fetch_abstract_no_doi_short_circuits() {
        let server = MockServer::start().await;
        let adapter = CrossrefAdapter::with_base_url(http(), None, server.uri());
        let outcome = adapter.fetch_abstract(&article(None)).await;
        assert_eq!(outcome.failure_reason.as_deref(), Some(REASON_NO_DOI));
        assert_eq!(server.received_requests().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_fetch_abstract_missing_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"/works/.+"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message": {"title": ["T"]}})),
            )
            .mount(&server)
            .await;

        let adapter = CrossrefAdapter::with_base_url(http(), None, server.uri());
        let outcome = adapter.fetch_abstract(&article_with_doi("10.1/x")).await;
        assert_eq!(outcome.failure_reason.as_deref(), Some(REASON_NO_ABSTRACT));
        assert!(outcome.provenance.is_some(), "payload still captured");
    }
}
