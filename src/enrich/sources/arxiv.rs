//! arXiv API adapter.
//!
//! Queries the Atom feed at `export.arxiv.org/api/query?id_list={id}`. The
//! entry's `<link title="doi">` and `<arxiv:doi>`/`<arxiv:journal_ref>`
//! elements reveal the peer-reviewed version when one exists, which drives
//! the preprint → published discovery pass.

use quick_xml::de::from_str;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::{PreprintFetch, PreprintMetadata, REASON_UNREACHABLE, normalize_whitespace};
use crate::identifiers;
use crate::net::HttpClient;
use crate::provenance::ProvenanceEntry;
use crate::store::ResearchArticle;
use crate::timestamp;

/// Default arXiv API base URL.
const DEFAULT_BASE_URL: &str = "https://export.arxiv.org";

// ==================== Atom Feed Types ====================

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
    #[serde(default)]
    link: Vec<AtomLink>,
    /// `<arxiv:doi>` - DOI of the peer-reviewed version.
    #[serde(rename = "doi", alias = "arxiv:doi", default)]
    doi: Option<String>,
    /// `<arxiv:journal_ref>` - free-text journal reference.
    #[serde(rename = "journal_ref", alias = "arxiv:journal_ref", default)]
    journal_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@title")]
    title: Option<String>,
    #[serde(rename = "@href")]
    href: Option<String>,
}

// ==================== Adapter ====================

/// arXiv preprint-platform adapter.
#[derive(Debug, Clone)]
pub struct ArxivAdapter {
    http: HttpClient,
    base_url: String,
}

impl ArxivAdapter {
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
        "arxiv"
    }

    /// Fetches preprint metadata by arXiv id (taken from the record's
    /// `arxiv_id` or recovered from its DOI).
    #[instrument(skip(self, article), fields(arxiv_id))]
    pub async fn fetch_preprint(&self, article: &ResearchArticle) -> PreprintFetch {
        let arxiv_id = article.arxiv_id.clone().or_else(|| {
            article
                .doi_norm
                .as_deref()
                .and_then(identifiers::arxiv_id_from_doi)
        });
        let Some(arxiv_id) = arxiv_id else {
            return PreprintFetch::missing("record has no arXiv id", None);
        };
        tracing::Span::current().record("arxiv_id", arxiv_id.as_str());

        let url = format!("{}/api/query?id_list={}", self.base_url, arxiv_id);
        let response = match self.http.get_with_retry(&url, HeaderMap::new()).await {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "arxiv unreachable");
                return PreprintFetch::missing(REASON_UNREACHABLE, None);
            }
        };

        let status = response.status().as_u16();
        if status != 200 {
            return PreprintFetch::missing(format!("HTTP {status}"), None);
        }

        let xml = match response.text().await {
            Ok(xml) => xml,
            Err(error) => {
                debug!(error = %error, "arxiv body unreadable");
                return PreprintFetch::missing(REASON_UNREACHABLE, None);
            }
        };
        let entry = ProvenanceEntry::new(
            &url,
            timestamp::now_iso(),
            json!({"arxiv_id": arxiv_id, "xml": xml}),
        )
        .with_status(status);

        let feed: AtomFeed = match from_str(&xml) {
            Ok(feed) => feed,
            Err(error) => {
                debug!(error = %error, "arxiv feed unparseable");
                return PreprintFetch::missing("malformed Atom feed", Some(entry));
            }
        };
        let Some(atom_entry) = feed.entry.into_iter().next() else {
            return PreprintFetch::missing("no entry for arXiv id", Some(entry));
        };

        let metadata = PreprintMetadata {
            abstract_text: atom_entry
                .summary
                .as_deref()
                .map(normalize_whitespace)
                .filter(|text| !text.is_empty()),
            title: atom_entry
                .title
                .as_deref()
                .map(normalize_whitespace)
                .filter(|text| !text.is_empty()),
            published_date: atom_entry.published,
            published_doi: atom_entry.doi.clone().or_else(|| doi_link(&atom_entry.link)),
            published_journal: atom_entry.journal_ref,
        };

        PreprintFetch::found(metadata, entry)
    }
}

/// The href of the `<link title="doi">` element, when present.
fn doi_link(links: &[AtomLink]) -> Option<String> {
    links
        .iter()
        .find(|link| link.title.as_deref() == Some("doi"))
        .and_then(|link| link.href.clone())
}
