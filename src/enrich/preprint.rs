//! Preprint enrichment and published-version discovery.
//!
//! For a detected preprint, the platform adapter supplies the abstract and -
//! when the work has since been peer-reviewed - the DOI of the published
//! version. Discovered DOIs turn into linked records: an existing record is
//! linked as-is, a missing one is created with `enrichment_datetime` NULL so
//! the next orchestrator pass enriches it.

use tracing::{debug, info, instrument, warn};

use super::sources::{ArxivAdapter, BiorxivAdapter, PreprintFetch, PreprintsOrgAdapter};
use crate::hashing::normalize_doi;
use crate::identifiers::PreprintPlatform;
use crate::net::{HttpClient, RateLimiterSet};
use crate::provenance::ProvenanceMap;
use crate::store::{ImportOutcome, LinkOutcome, NewArticle, ResearchArticle, Store, StoreError};
use crate::timestamp;

/// Discovery of a published version for one preprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedDiscovery {
    /// Normalized DOI of the published version.
    pub doi_norm: String,
    /// Record id of the published version (existing or newly created).
    pub record_id: i64,
    /// Whether a new record was created for it in this call.
    pub record_created: bool,
    /// Whether the version link was newly inserted.
    pub link_created: bool,
}

/// Result of the preprint step for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprintReport {
    /// Whether the platform abstract was written onto the record.
    pub abstract_set: bool,
    /// Published-version discovery outcome, when one was found.
    pub published: Option<PublishedDiscovery>,
    /// Platform failure reason, when the platform call yielded nothing.
    pub failure_reason: Option<String>,
}

/// Queries preprint platforms and maintains version links.
#[derive(Debug, Clone)]
pub struct PreprintEnricher {
    arxiv: ArxivAdapter,
    biorxiv: BiorxivAdapter,
    preprints_org: PreprintsOrgAdapter,
}

impl PreprintEnricher {
    /// Builds the enricher with adapters against the public APIs.
    #[must_use]
    pub fn new(http: &HttpClient) -> Self {
        Self {
            arxiv: ArxivAdapter::new(http.clone()),
            biorxiv: BiorxivAdapter::new(http.clone()),
            preprints_org: PreprintsOrgAdapter::new(http.clone()),
        }
    }

    /// Builds the enricher from explicit adapters (wiremock tests).
    #[must_use]
    pub fn with_adapters(
        arxiv: ArxivAdapter,
        biorxiv: BiorxivAdapter,
        preprints_org: PreprintsOrgAdapter,
    ) -> Self {
        Self {
            arxiv,
            biorxiv,
            preprints_org,
        }
    }

    /// Enriches one preprint record from its platform.
    ///
    /// Idempotent with respect to linking: an existing (preprint, published)
    /// link is left alone, as is an already-enriched published record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only for store failures; platform failures are
    /// reported through [`PreprintReport::failure_reason`].
    #[instrument(skip(self, article, store, limiters, provenance), fields(record_id = article.id, platform = %platform))]
    pub async fn enrich(
        &self,
        article: &mut ResearchArticle,
        platform: PreprintPlatform,
        store: &Store,
        limiters: &RateLimiterSet,
        provenance: &mut ProvenanceMap,
    ) -> Result<PreprintReport, StoreError> {
        let fetch = self.fetch_platform(article, platform, limiters).await;

        if let Some(entry) = fetch.provenance {
            provenance.insert(platform.as_str().to_string(), entry);
        }

        let Some(metadata) = fetch.metadata else {
            let reason = fetch.failure_reason.unwrap_or_else(|| "no data".to_string());
            warn!(reason = %reason, "preprint metadata fetch failed");
            return Ok(PreprintReport {
                failure_reason: Some(reason),
                ..PreprintReport::default()
            });
        };

        let mut report = PreprintReport::default();

        if article.abstract_text.is_none() {
            if let Some(abstract_text) = metadata.abstract_text.clone() {
                article.abstract_text = Some(abstract_text);
                article.abstract_source = Some(platform.as_str().to_string());
                report.abstract_set = true;
            }
        }

        let published_doi = metadata
            .published_doi
            .as_deref()
            .and_then(normalize_doi)
            .filter(|doi| Some(doi.as_str()) != article.doi_norm.as_deref());

        if let Some(published_doi) = published_doi {
            report.published = Some(
                self.link_published_version(article, &published_doi, platform, store, &metadata)
                    .await?,
            );
        }

        info!(
            abstract_set = report.abstract_set,
            published_found = report.published.is_some(),
            "preprint enriched"
        );
        Ok(report)
    }

    async fn fetch_platform(
        &self,
        article: &ResearchArticle,
        platform: PreprintPlatform,
        limiters: &RateLimiterSet,
    ) -> PreprintFetch {
        match platform {
            PreprintPlatform::Arxiv => {
                limiters.acquire(self.arxiv.rate_key()).await;
                self.arxiv.fetch_preprint(article).await
            }
            PreprintPlatform::Biorxiv | PreprintPlatform::Medrxiv => {
                limiters.acquire(self.biorxiv.rate_key()).await;
                self.biorxiv.fetch_preprint(article, platform).await
            }
            PreprintPlatform::PreprintsOrg => {
                limiters.acquire(self.preprints_org.rate_key()).await;
                self.preprints_org.fetch_preprint(article).await
            }
        }
    }

    /// Finds or creates the published-version record and links it.
    async fn link_published_version(
        &self,
        preprint: &ResearchArticle,
        published_doi: &str,
        platform: PreprintPlatform,
        store: &Store,
        metadata: &super::sources::PreprintMetadata,
    ) -> Result<PublishedDiscovery, StoreError> {
        let (record_id, record_created) = match store.find_by_doi(published_doi).await? {
            Some(existing) => {
                debug!(published_id = existing.id, "published version already known");
                (existing.id, false)
            }
            None => {
                // The new record inherits what the platform knows; the rest is
                // filled in by its own enrichment pass (it starts with
                // enrichment_datetime NULL, which is what schedules it).
                let mut published = NewArticle::new(
                    metadata
                        .title
                        .clone()
                        .unwrap_or_else(|| preprint.title.clone()),
                    timestamp::now_iso(),
                );
                published.doi_raw = Some(published_doi.to_string());
                published.doi_norm = Some(published_doi.to_string());
                published.pub_date = metadata.published_date.clone();
                published.authors = preprint.authors.clone();
                published.source_title = metadata.published_journal.clone();
                published.is_preprint = false;

                match store.insert_article(&published).await? {
                    ImportOutcome::Inserted(id) => {
                        info!(published_id = id, published_doi, "published version created");
                        (id, true)
                    }
                    // A concurrent task created it between lookup and insert.
                    ImportOutcome::SkippedDuplicate => {
                        let existing = store
                            .find_by_doi(published_doi)
                            .await?
                            .ok_or_else(|| StoreError::not_found("research_article", 0))?;
                        (existing.id, false)
                    }
                }
            }
        };

        let link = store
            .insert_article_version_link(
                preprint.id,
                record_id,
                platform.as_str(),
                &timestamp::now_iso(),
            )
            .await?;

        Ok(PublishedDiscovery {
            doi_norm: published_doi.to_string(),
            record_id,
            record_created,
            link_created: matches!(link, LinkOutcome::Created(_)),
        })
    }
}
