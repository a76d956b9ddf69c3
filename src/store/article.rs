//! The canonical work row and its insert form.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::provenance::{self, ProvenanceMap};

/// One research article as persisted in `research_articles`.
///
/// `enrichment_datetime` doubles as the work-list predicate: a NULL value
/// means the record is still eligible for enrichment.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ResearchArticle {
    /// Surrogate id.
    pub id: i64,
    /// Title (required at ingest).
    pub title: String,
    /// DOI exactly as supplied.
    pub doi_raw: Option<String>,
    /// Normalized DOI; unique when present.
    pub doi_norm: Option<String>,
    /// Publication date (ISO-8601 when parseable).
    pub pub_date: Option<String>,
    /// Total citation count from the source spreadsheet.
    pub total_citations: Option<i64>,
    /// Citations per year from the source spreadsheet.
    pub citations_per_year: Option<f64>,
    /// Author list, free text.
    pub authors: Option<String>,
    /// Journal/venue title.
    pub source_title: Option<String>,
    /// Retrieved abstract.
    pub abstract_text: Option<String>,
    /// Which source supplied the abstract.
    pub abstract_source: Option<String>,
    /// "; "-joined failure tokens from every attempted abstract source.
    pub abstract_no_retrieval_reason: Option<String>,
    /// PubMed id when discovered.
    pub pmid: Option<String>,
    /// arXiv identifier when the work is (or was) an arXiv preprint.
    pub arxiv_id: Option<String>,
    /// Whether this record is a preprint.
    pub is_preprint: bool,
    /// Preprint platform tag; non-empty whenever `is_preprint` is set.
    pub preprint_source: Option<String>,
    /// Unpaywall open-access flag.
    pub is_oa: Option<bool>,
    /// Unpaywall OA status (gold/green/bronze/hybrid/closed).
    pub oa_status: Option<String>,
    /// License of the best OA location.
    pub license: Option<String>,
    /// Direct PDF URL of the best OA location.
    pub oa_pdf_url: Option<String>,
    /// Manually curated publisher URL.
    pub manual_url_publisher: Option<String>,
    /// Manually curated repository URL.
    pub manual_url_repository: Option<String>,
    /// JSON provenance map keyed by source tag.
    pub provenance: Option<String>,
    /// Set at ingest; never updated afterwards.
    pub import_datetime: String,
    /// Set once when the first enrichment pass completes for this record.
    pub enrichment_datetime: Option<String>,
}

impl ResearchArticle {
    /// Parses the provenance column into its typed map form.
    #[must_use]
    pub fn provenance_map(&self) -> ProvenanceMap {
        provenance::from_column(self.provenance.as_deref())
    }

    /// Replaces the provenance column from a typed map.
    ///
    /// # Errors
    ///
    /// Returns the serde error if serialization fails (it cannot for
    /// JSON-safe payloads).
    pub fn set_provenance_map(&mut self, map: &ProvenanceMap) -> Result<(), serde_json::Error> {
        self.provenance = Some(provenance::to_column(map)?);
        Ok(())
    }
}

/// Insert form for a new article row. Everything except the title is
/// optional; unknown spreadsheet columns never reach this type.
#[derive(Debug, Clone, Default)]
pub struct NewArticle {
    pub title: String,
    pub doi_raw: Option<String>,
    pub doi_norm: Option<String>,
    pub pub_date: Option<String>,
    pub total_citations: Option<i64>,
    pub citations_per_year: Option<f64>,
    pub authors: Option<String>,
    pub source_title: Option<String>,
    pub arxiv_id: Option<String>,
    pub is_preprint: bool,
    pub preprint_source: Option<String>,
    /// Ingest timestamp; callers set this once per import run.
    pub import_datetime: String,
}

impl NewArticle {
    /// Creates an insert form with the given title and import timestamp.
    #[must_use]
    pub fn new(title: impl Into<String>, import_datetime: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            import_datetime: import_datetime.into(),
            ..Self::default()
        }
    }
}

/// Outcome of inserting one article during ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Row inserted with this id.
    Inserted(i64),
    /// A row with the same normalized DOI already exists; nothing written.
    SkippedDuplicate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provenance_round_trip_through_article() {
        let mut article = ResearchArticle {
            id: 1,
            title: "T".to_string(),
            doi_raw: None,
            doi_norm: None,
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
        };

        assert!(article.provenance_map().is_empty());

        let mut map = ProvenanceMap::new();
        map.insert(
            "unpaywall".to_string(),
            crate::provenance::ProvenanceEntry::new("u", "t", json!({"is_oa": true})),
        );
        article.set_provenance_map(&map).unwrap();
        assert_eq!(article.provenance_map(), map);
    }
}
