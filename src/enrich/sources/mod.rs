//! Adapters for the public scholarly APIs.
//!
//! One adapter per API. Each adapter shapes the request for its source,
//! normalizes the response into a common form, and captures the raw payload
//! as provenance. Adapters never raise past their caller: any failure
//! becomes a reason string on the returned outcome.
//!
//! Every adapter has a `with_base_url` constructor so tests can point it at
//! a wiremock server.

mod arxiv;
mod biorxiv;
mod crossref;
mod europepmc;
mod openalex;
mod preprints_org;
mod pubmed;
mod semantic_scholar;
mod unpaywall;

pub use arxiv::ArxivAdapter;
pub use biorxiv::BiorxivAdapter;
pub use crossref::{CrossrefAdapter, pdf_link_from_payload};
pub use europepmc::{EuropePmcAdapter, pdf_fulltext_urls_from_payload};
pub use openalex::OpenAlexAdapter;
pub use preprints_org::PreprintsOrgAdapter;
pub use pubmed::PubMedAdapter;
pub use semantic_scholar::{SemanticScholarAdapter, open_access_pdf_from_payload};
pub use unpaywall::{OaFetch, OaInfo, UnpaywallAdapter};

use async_trait::async_trait;

use crate::provenance::ProvenanceEntry;
use crate::store::ResearchArticle;

/// Normalized result of one abstract-fetch call.
#[derive(Debug, Default)]
pub struct AbstractFetch {
    /// Plain-text abstract, when the source supplied one.
    pub abstract_text: Option<String>,
    /// PubMed id, when the source resolved one along the way.
    pub pmid: Option<String>,
    /// Raw payload envelope for the provenance map.
    pub provenance: Option<ProvenanceEntry>,
    /// Why no abstract was returned (set whenever `abstract_text` is None).
    pub failure_reason: Option<String>,
}

impl AbstractFetch {
    /// An outcome carrying an abstract.
    #[must_use]
    pub fn found(abstract_text: String, provenance: ProvenanceEntry) -> Self {
        Self {
            abstract_text: Some(abstract_text),
            provenance: Some(provenance),
            ..Self::default()
        }
    }

    /// An outcome without an abstract, with the reason and any provenance
    /// that was still captured.
    #[must_use]
    pub fn missing(reason: impl Into<String>, provenance: Option<ProvenanceEntry>) -> Self {
        Self {
            failure_reason: Some(reason.into()),
            provenance,
            ..Self::default()
        }
    }
}

/// Metadata returned by a preprint platform for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprintMetadata {
    /// Abstract as hosted on the platform.
    pub abstract_text: Option<String>,
    /// Title as hosted on the platform.
    pub title: Option<String>,
    /// Platform posting date.
    pub published_date: Option<String>,
    /// DOI of the peer-reviewed version, when the platform knows one.
    /// May arrive as a full `doi.org` URL; callers normalize before use.
    pub published_doi: Option<String>,
    /// Journal that published the peer-reviewed version.
    pub published_journal: Option<String>,
}

/// Result of one preprint-platform call.
#[derive(Debug, Default)]
pub struct PreprintFetch {
    /// Parsed metadata when the call succeeded.
    pub metadata: Option<PreprintMetadata>,
    /// Raw payload envelope for the provenance map.
    pub provenance: Option<ProvenanceEntry>,
    /// Failure reason when `metadata` is None.
    pub failure_reason: Option<String>,
}

impl PreprintFetch {
    /// A successful platform response.
    #[must_use]
    pub fn found(metadata: PreprintMetadata, provenance: ProvenanceEntry) -> Self {
        Self {
            metadata: Some(metadata),
            provenance: Some(provenance),
            failure_reason: None,
        }
    }

    /// A failed platform call.
    #[must_use]
    pub fn missing(reason: impl Into<String>, provenance: Option<ProvenanceEntry>) -> Self {
        Self {
            metadata: None,
            provenance,
            failure_reason: Some(reason.into()),
        }
    }
}

/// A source the abstract pipeline can query in its fallback chain.
#[async_trait]
pub trait AbstractSource: Send + Sync {
    /// Short tag used for `abstract_source` and provenance keys.
    fn key(&self) -> &'static str;

    /// Human-readable name used in failure-reason strings.
    fn display_name(&self) -> &'static str;

    /// Key into the rate-limiter table.
    fn rate_key(&self) -> &'static str;

    /// Fetches the abstract for an article. Must not panic or return early
    /// through errors - failures are data here.
    async fn fetch_abstract(&self, article: &ResearchArticle) -> AbstractFetch;
}

/// Reason token used when a record carries no DOI to query by.
pub(crate) const REASON_NO_DOI: &str = "record has no DOI";

/// Reason token for transport-level failures after retries.
pub(crate) const REASON_UNREACHABLE: &str = "API returned no data or timed out";

/// Reason token when the response parsed but carried no abstract.
pub(crate) const REASON_NO_ABSTRACT: &str = "no abstract field in response";

/// Collapses runs of whitespace into single spaces and trims. Abstracts come
/// back with embedded newlines and indentation from several sources.
#[must_use]
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Test fixtures shared by the adapter test modules.
#[cfg(test)]
pub(crate) mod test_support {
    use crate::store::ResearchArticle;

    /// A minimal article row with the given normalized DOI.
    pub(crate) fn article(doi_norm: Option<&str>) -> ResearchArticle {
        ResearchArticle {
            id: 1,
            title: "Test Article".to_string(),
            doi_raw: doi_norm.map(str::to_string),
            doi_norm: doi_norm.map(str::to_string),
            pub_date: None,
            total_citations: None,
            citations_per_year: None,
            authors: None,
            source_title: None,
            abstract_text: None,
            abstract_source: None,
            abstract_no_retrieval_reason: None,
            pmid: None,
            arxiv_id: None,
            is_preprint: false,
            preprint_source: None,
            is_oa: None,
            oa_status: None,
            license: None,
            oa_pdf_url: None,
            manual_url_publisher: None,
            manual_url_repository: None,
            provenance: None,
            import_datetime: "2025-01-01T00:00:00Z".to_string(),
            enrichment_datetime: None,
        }
    }

    /// A preprint article with the given platform tag and arXiv id.
    pub(crate) fn preprint(
        doi_norm: Option<&str>,
        arxiv_id: Option<&str>,
        platform: &str,
    ) -> ResearchArticle {
        let mut row = article(doi_norm);
        row.arxiv_id = arxiv_id.map(str::to_string);
        row.is_preprint = true;
        row.preprint_source = Some(platform.to_string());
        row
    }
}
