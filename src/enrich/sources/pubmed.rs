//! PubMed E-utilities adapter.
//!
//! Two-step fetch: ESearch maps the DOI to a PMID (JSON), EFetch returns the
//! article record (XML) from which the abstract is extracted. The raw XML is
//! kept in provenance alongside the resolved PMID.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::HeaderMap;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::{
    AbstractFetch, AbstractSource, REASON_NO_ABSTRACT, REASON_NO_DOI, REASON_UNREACHABLE,
    normalize_whitespace,
};
use crate::net::HttpClient;
use crate::provenance::ProvenanceEntry;
use crate::store::ResearchArticle;
use crate::timestamp;

/// Default E-utilities base URL.
const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// `<AbstractText ...>...</AbstractText>` sections of the EFetch XML. PubMed
/// structures abstracts into labeled sections; all are concatenated.
#[allow(clippy::expect_used)]
static ABSTRACT_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<AbstractText[^>]*>(.*?)</AbstractText>").expect("static regex must compile")
});

/// PubMed abstract adapter.
#[derive(Debug, Clone)]
pub struct PubMedAdapter {
    http: HttpClient,
    base_url: String,
}

impl PubMedAdapter {
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

    async fn resolve_pmid(&self, doi_norm: &str) -> Result<Option<String>, String> {
        let url = format!(
            "{}/esearch.fcgi?db=pubmed&term={}[AID]&retmode=json",
            self.base_url,
            urlencoding::encode(doi_norm)
        );
        let response = self
            .http
            .get_with_retry(&url, HeaderMap::new())
            .await
            .map_err(|_| REASON_UNREACHABLE.to_string())?;
        if response.status().as_u16() != 200 {
            return Err(format!("HTTP {} from ESearch", response.status().as_u16()));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|_| "malformed ESearch JSON".to_string())?;
        Ok(payload
            .get("esearchresult")
            .and_then(|result| result.get("idlist"))
            .and_then(Value::as_array)
            .and_then(|ids| ids.first())
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

#[async_trait::async_trait]
impl AbstractSource for PubMedAdapter {
    fn key(&self) -> &'static str {
        "pubmed"
    }

    fn display_name(&self) -> &'static str {
        "PubMed"
    }

    fn rate_key(&self) -> &'static str {
        "pubmed"
    }

    #[instrument(skip(self, article), fields(doi = article.doi_norm.as_deref().unwrap_or("-")))]
    async fn fetch_abstract(&self, article: &ResearchArticle) -> AbstractFetch {
        let Some(doi_norm) = article.doi_norm.as_deref() else {
            return AbstractFetch::missing(REASON_NO_DOI, None);
        };

        let pmid = match self.resolve_pmid(doi_norm).await {
            Ok(Some(pmid)) => pmid,
            Ok(None) => return AbstractFetch::missing("DOI not indexed in PubMed", None),
            Err(reason) => return AbstractFetch::missing(reason, None),
        };

        let url = format!(
            "{}/efetch.fcgi?db=pubmed&id={}&retmode=xml",
            self.base_url, pmid
        );
        let response = match self.http.get_with_retry(&url, HeaderMap::new()).await {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "efetch unreachable");
                return AbstractFetch::missing(REASON_UNREACHABLE, None);
            }
        };

        let status = response.status().as_u16();
        if status != 200 {
            return AbstractFetch::missing(format!("HTTP {status} from EFetch"), None);
        }

        let xml = match response.text().await {
            Ok(xml) => xml,
            Err(error) => {
                debug!(error = %error, "efetch body unreadable");
                return AbstractFetch::missing(REASON_UNREACHABLE, None);
            }
        };
        let entry = ProvenanceEntry::new(&url, timestamp::now_iso(), json!({
            "pmid": pmid,
            "xml": xml,
        }))
        .with_status(status);

        match extract_abstract(&xml) {
            Some(text) => {
                let mut outcome = AbstractFetch::found(text, entry);
                outcome.pmid = Some(pmid);
                outcome
            }
            None => {
                let mut outcome = AbstractFetch::missing(REASON_NO_ABSTRACT, Some(entry));
                outcome.pmid = Some(pmid);
                outcome
            }
        }
    }
}

/// Concatenates all `<AbstractText>` sections, stripping inline markup.
fn extract_abstract(xml: &str) -> Option<String> {
    let sections: Vec<String> = ABSTRACT_TEXT
        .captures_iter(xml)
        .map(|caps| strip_inline_tags(&caps[1]))
        .filter(|section| !section.is_empty())
        .collect();
    if sections.is_empty() {
        None
    } else {
        Some(sections.join(" "))
    }
}

fn strip_inline_tags(fragment: &str) -> String {
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
