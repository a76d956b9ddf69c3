//! Open-access enrichment via Unpaywall.

use tracing::{info, instrument, warn};

use super::sources::UnpaywallAdapter;
use crate::net::RateLimiterSet;
use crate::provenance::ProvenanceMap;
use crate::store::ResearchArticle;

/// Result of the OA step for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OaReport {
    /// Whether Unpaywall returned usable data.
    pub succeeded: bool,
    /// Failure reason when it did not.
    pub reason: Option<String>,
}

/// Writes Unpaywall OA status onto records.
#[derive(Debug, Clone)]
pub struct OaEnricher {
    adapter: UnpaywallAdapter,
}

impl OaEnricher {
    /// Wraps an Unpaywall adapter.
    #[must_use]
    pub fn new(adapter: UnpaywallAdapter) -> Self {
        Self { adapter }
    }

    /// Looks up OA status for the record and stores
    /// is_oa/oa_status/license/oa_pdf_url. Records without a DOI are skipped.
    #[instrument(skip_all, fields(record_id = article.id))]
    pub async fn enrich(
        &self,
        article: &mut ResearchArticle,
        limiters: &RateLimiterSet,
        provenance: &mut ProvenanceMap,
    ) -> OaReport {
        let Some(doi_norm) = article.doi_norm.clone() else {
            return OaReport {
                succeeded: false,
                reason: Some("record has no DOI".to_string()),
            };
        };

        limiters.acquire(self.adapter.rate_key()).await;
        let outcome = self.adapter.fetch_oa(&doi_norm).await;

        if let Some(entry) = outcome.provenance {
            provenance.insert("unpaywall".to_string(), entry);
        }

        match outcome.info {
            Some(info) => {
                article.is_oa = info.is_oa;
                article.oa_status = info.oa_status;
                article.license = info.license;
                article.oa_pdf_url = info.oa_pdf_url;
                info!(
                    is_oa = article.is_oa,
                    oa_status = article.oa_status.as_deref().unwrap_or("-"),
                    has_pdf = article.oa_pdf_url.is_some(),
                    "oa status retrieved"
                );
                OaReport {
                    succeeded: true,
                    reason: None,
                }
            }
            None => {
                let reason = outcome
                    .failure_reason
                    .unwrap_or_else(|| "API returned no data or timed out".to_string());
                warn!(reason = %reason, "oa check failed");
                OaReport {
                    succeeded: false,
                    reason: Some(reason),
                }
            }
        }
    }
}
