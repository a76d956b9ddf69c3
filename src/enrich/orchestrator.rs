//! Enrichment orchestrator: the multi-pass loop over eligible records.
//!
//! Each pass fetches the work list from the database (`enrichment_datetime
//! IS NULL`), enriches records with bounded concurrency, and persists the
//! results. Published versions discovered during a pass are created with a
//! NULL timestamp, so the next pass picks them up from the same query - the
//! database is the only work list, which makes the loop crash-safe.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};

use super::abstracts::{AbstractPipeline, compile_failure_reasons};
use super::oa::OaEnricher;
use super::preprint::PreprintEnricher;
use super::sources::UnpaywallAdapter;
use crate::config::{AppConfig, ConfigError};
use crate::identifiers::{self, PreprintPlatform};
use crate::net::{HttpClient, HttpError, RateLimiterSet};
use crate::store::{ResearchArticle, Store, StoreError};
use crate::timestamp;

/// Default bound on concurrently enriched records.
const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Default number of passes: the first sweep plus one for published versions
/// it discovered.
const DEFAULT_MAX_PASSES: u32 = 2;

/// Failures while assembling the enrichment stack. All are fatal at stage
/// start.
#[derive(Debug, Error)]
pub enum EnrichSetupError {
    /// A required configuration value is missing.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error(transparent)]
    Http(#[from] HttpError),
}

/// Tunables for one enrichment run.
#[derive(Debug, Clone, Copy)]
pub struct EnrichmentOptions {
    /// Upper bound on passes over the work list.
    pub max_passes: u32,
    /// Records in flight at once.
    pub max_concurrent: usize,
    /// When set, records that yielded no data at all keep their NULL
    /// timestamp and stay eligible for a later run.
    pub retry_empty: bool,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            retry_empty: false,
        }
    }
}

/// Counters for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub pass_number: u32,
    pub processed: usize,
    pub abstracts_found: usize,
    pub oa_found: usize,
    pub published_versions_created: usize,
    pub failed: usize,
}

/// Counters for a whole run.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentSummary {
    pub passes: Vec<PassSummary>,
}

impl EnrichmentSummary {
    /// Total records processed across all passes.
    #[must_use]
    pub fn total_processed(&self) -> usize {
        self.passes.iter().map(|pass| pass.processed).sum()
    }

    /// Total record-level failures across all passes.
    #[must_use]
    pub fn total_failed(&self) -> usize {
        self.passes.iter().map(|pass| pass.failed).sum()
    }

    /// Total published versions discovered and created.
    #[must_use]
    pub fn total_published_created(&self) -> usize {
        self.passes
            .iter()
            .map(|pass| pass.published_versions_created)
            .sum()
    }
}

/// Outcome of enriching one record.
#[derive(Debug, Default)]
struct RecordOutcome {
    abstract_found: bool,
    oa_found: bool,
    published_created: usize,
}

/// Drives per-record enrichment with per-source rate limits and the
/// multi-pass published-version discovery loop.
#[derive(Clone)]
pub struct EnrichmentOrchestrator {
    store: Store,
    limiters: Arc<RateLimiterSet>,
    abstracts: Arc<AbstractPipeline>,
    preprints: PreprintEnricher,
    oa: OaEnricher,
}

impl EnrichmentOrchestrator {
    /// Assembles the full stack from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichSetupError::Config`] when the contact email is
    /// missing (Unpaywall requires it), or [`EnrichSetupError::Http`] when
    /// the HTTP client cannot be built.
    pub fn from_config(store: Store, config: &AppConfig) -> Result<Self, EnrichSetupError> {
        let email = config.require_contact_email()?.to_string();
        let http = HttpClient::new(&config.api_user_agent())?;

        Ok(Self::new(
            store,
            Arc::new(RateLimiterSet::with_defaults()),
            AbstractPipeline::with_default_order(&http, config),
            PreprintEnricher::new(&http),
            OaEnricher::new(UnpaywallAdapter::new(http, email)),
        ))
    }

    /// Assembles the orchestrator from explicit components (tests).
    #[must_use]
    pub fn new(
        store: Store,
        limiters: Arc<RateLimiterSet>,
        abstracts: AbstractPipeline,
        preprints: PreprintEnricher,
        oa: OaEnricher,
    ) -> Self {
        Self {
            store,
            limiters,
            abstracts: Arc::new(abstracts),
            preprints,
            oa,
        }
    }

    /// Runs the multi-pass enrichment loop.
    ///
    /// ```text
    /// pass = 1
    /// while pass <= max_passes:
    ///     batch = records with enrichment_datetime NULL
    ///     if batch empty: break
    ///     created = enrich_batch(batch)
    ///     if pass > 1 and created == 0: break
    ///     pass += 1
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the work list itself cannot be read;
    /// per-record failures are counted, not raised.
    #[instrument(skip_all)]
    pub async fn run(&self, options: EnrichmentOptions) -> Result<EnrichmentSummary, StoreError> {
        let mut summary = EnrichmentSummary::default();
        let mut pass = 1;

        while pass <= options.max_passes {
            let batch = self.store.articles_needing_enrichment().await?;
            if batch.is_empty() {
                break;
            }

            info!(pass, records = batch.len(), "enrichment pass started");
            let pass_summary = self.enrich_batch(batch, pass, options).await;
            let created = pass_summary.published_versions_created;
            info!(
                pass,
                processed = pass_summary.processed,
                abstracts = pass_summary.abstracts_found,
                published_created = created,
                failed = pass_summary.failed,
                "enrichment pass completed"
            );
            summary.passes.push(pass_summary);

            if pass > 1 && created == 0 {
                break;
            }
            pass += 1;
        }

        Ok(summary)
    }

    /// Enriches one batch with bounded concurrency.
    async fn enrich_batch(
        &self,
        batch: Vec<ResearchArticle>,
        pass_number: u32,
        options: EnrichmentOptions,
    ) -> PassSummary {
        let semaphore = Arc::new(Semaphore::new(options.max_concurrent.max(1)));
        let mut handles = Vec::with_capacity(batch.len());

        for article in batch {
            let orchestrator = self.clone();
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                // Closed only on shutdown; treat as a skipped record.
                let Ok(_permit) = semaphore.acquire().await else {
                    return Err(StoreError::not_found("semaphore", 0));
                };
                orchestrator.enrich_one(article, options).await
            }));
        }

        let mut summary = PassSummary {
            pass_number,
            ..PassSummary::default()
        };
        for handle in handles {
            summary.processed += 1;
            match handle.await {
                Ok(Ok(outcome)) => {
                    summary.abstracts_found += usize::from(outcome.abstract_found);
                    summary.oa_found += usize::from(outcome.oa_found);
                    summary.published_versions_created += outcome.published_created;
                }
                Ok(Err(store_error)) => {
                    error!(error = %store_error, "record enrichment failed");
                    summary.failed += 1;
                }
                Err(join_error) => {
                    error!(error = %join_error, "enrichment task panicked");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Enriches a single record. Steps run strictly in order - preprint,
    /// abstract, OA, provenance merge, timestamp - and the timestamp is set
    /// last so a crash leaves the record eligible for retry.
    #[instrument(skip(self, article, options), fields(record_id = article.id))]
    async fn enrich_one(
        &self,
        mut article: ResearchArticle,
        options: EnrichmentOptions,
    ) -> Result<RecordOutcome, StoreError> {
        let mut outcome = RecordOutcome::default();
        let mut provenance = article.provenance_map();
        let mut preprint_got_data = false;

        // Step 1: preprint detection + platform enrichment.
        let platform = identifiers::detect_preprint_platform(
            article.doi_norm.as_deref(),
            article.arxiv_id.as_deref(),
            article.source_title.as_deref(),
        );
        match platform {
            Some(platform) => {
                article.is_preprint = true;
                article.preprint_source = Some(platform.as_str().to_string());
                if platform == PreprintPlatform::Arxiv && article.arxiv_id.is_none() {
                    article.arxiv_id = article
                        .doi_norm
                        .as_deref()
                        .and_then(identifiers::arxiv_id_from_doi);
                }

                let report = self
                    .preprints
                    .enrich(
                        &mut article,
                        platform,
                        &self.store,
                        &self.limiters,
                        &mut provenance,
                    )
                    .await?;
                preprint_got_data = report.failure_reason.is_none();
                if let Some(discovery) = report.published {
                    outcome.published_created += usize::from(discovery.record_created);
                }
            }
            None => {
                article.is_preprint = false;
                article.preprint_source = None;
            }
        }

        // Step 2: abstract fallback chain (skipped when the platform already
        // supplied one).
        let attempts = if article.abstract_text.is_none() {
            self.abstracts
                .enrich(&mut article, &self.limiters, &mut provenance)
                .await
        } else {
            Vec::new()
        };

        // Step 3: open-access status.
        let oa_report = self
            .oa
            .enrich(&mut article, &self.limiters, &mut provenance)
            .await;
        outcome.oa_found = oa_report.succeeded;

        // Step 4: compiled failure reasons and provenance.
        outcome.abstract_found = article.abstract_text.is_some();
        article.abstract_no_retrieval_reason = if outcome.abstract_found {
            None
        } else {
            Some(
                compile_failure_reasons(&attempts)
                    .unwrap_or_else(|| "No enrichment sources attempted".to_string()),
            )
        };
        if !outcome.abstract_found {
            warn!(
                reason = article.abstract_no_retrieval_reason.as_deref().unwrap_or("-"),
                "abstract not retrieved"
            );
        }
        article.set_provenance_map(&provenance)?;

        // Step 5: the timestamp is what takes the record off the work list.
        // A record that yielded nothing still gets stamped (no retry loops)
        // unless the caller opted into retrying empties.
        let got_data = outcome.abstract_found || outcome.oa_found || preprint_got_data;
        if got_data || !options.retry_empty {
            article.enrichment_datetime = Some(timestamp::now_iso());
        }

        self.store.update_enrichment(&article).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = EnrichmentOptions::default();
        assert_eq!(options.max_passes, 2);
        assert_eq!(options.max_concurrent, 8);
        assert!(!options.retry_empty);
    }

    #[test]
    fn test_summary_totals() {
        let summary = EnrichmentSummary {
            passes: vec![
                PassSummary {
                    pass_number: 1,
                    processed: 10,
                    abstracts_found: 7,
                    oa_found: 5,
                    published_versions_created: 2,
                    failed: 1,
                },
                PassSummary {
                    pass_number: 2,
                    processed: 2,
                    abstracts_found: 2,
                    oa_found: 2,
                    published_versions_created: 0,
                    failed: 0,
                },
            ],
        };
        assert_eq!(summary.total_processed(), 12);
        assert_eq!(summary.total_failed(), 1);
        assert_eq!(summary.total_published_created(), 2);
    }
}
