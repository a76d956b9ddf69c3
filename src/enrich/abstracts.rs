//! Ordered fallback chain for abstract retrieval.
//!
//! Sources are tried in a fixed order of precedence; the first non-empty
//! abstract wins and the chain short-circuits. Every attempted source that
//! did not supply the abstract contributes a failure token so the record can
//! explain *why* it has no abstract.

use tracing::{debug, info, instrument};

use super::sources::{
    AbstractSource, CrossrefAdapter, EuropePmcAdapter, OpenAlexAdapter, PubMedAdapter,
    SemanticScholarAdapter,
};
use crate::config::AppConfig;
use crate::net::{HttpClient, RateLimiterSet};
use crate::provenance::ProvenanceMap;
use crate::store::ResearchArticle;

/// Report of one attempted source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptReport {
    /// Source tag (e.g. `"crossref"`).
    pub source_key: &'static str,
    /// Human-readable source name used in compiled failure reasons.
    pub source_name: &'static str,
    /// Whether this source supplied the abstract.
    pub supplied_abstract: bool,
    /// Failure reason when it did not.
    pub reason: Option<String>,
}

/// Chain of abstract sources with first-hit-wins semantics.
pub struct AbstractPipeline {
    sources: Vec<Box<dyn AbstractSource>>,
}

impl AbstractPipeline {
    /// Builds the canonical chain: Semantic Scholar → Crossref → OpenAlex →
    /// EuropePMC → PubMed. Semantic Scholar is left out entirely when no API
    /// key is configured.
    #[must_use]
    pub fn with_default_order(http: &HttpClient, config: &AppConfig) -> Self {
        let mut sources: Vec<Box<dyn AbstractSource>> = Vec::new();
        if let Some(api_key) = &config.semantic_scholar_api_key {
            sources.push(Box::new(SemanticScholarAdapter::new(
                http.clone(),
                api_key.clone(),
            )));
        }
        sources.push(Box::new(CrossrefAdapter::new(
            http.clone(),
            config.contact_email.clone(),
        )));
        sources.push(Box::new(OpenAlexAdapter::new(http.clone())));
        sources.push(Box::new(EuropePmcAdapter::new(http.clone())));
        sources.push(Box::new(PubMedAdapter::new(http.clone())));
        Self { sources }
    }

    /// Builds a pipeline from an explicit source list (tests).
    #[must_use]
    pub fn new(sources: Vec<Box<dyn AbstractSource>>) -> Self {
        Self { sources }
    }

    /// Number of sources in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// True when the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Runs the chain for one record.
    ///
    /// Sources are queried serially (provenance ordering stays
    /// deterministic), each under its own rate limiter. On the first hit the
    /// abstract and its source are written onto the record and the chain
    /// stops. Provenance from every attempted source is merged into
    /// `provenance`.
    #[instrument(skip_all, fields(record_id = article.id))]
    pub async fn enrich(
        &self,
        article: &mut ResearchArticle,
        limiters: &RateLimiterSet,
        provenance: &mut ProvenanceMap,
    ) -> Vec<AttemptReport> {
        let mut attempts = Vec::new();

        for source in &self.sources {
            if article.abstract_text.is_some() {
                break;
            }

            limiters.acquire(source.rate_key()).await;
            let outcome = source.fetch_abstract(article).await;

            if let Some(entry) = outcome.provenance {
                provenance.insert(source.key().to_string(), entry);
            }
            if article.pmid.is_none() {
                article.pmid = outcome.pmid;
            }

            match outcome.abstract_text {
                Some(text) => {
                    article.abstract_text = Some(text);
                    article.abstract_source = Some(source.key().to_string());
                    info!(source = source.key(), "abstract retrieved");
                    attempts.push(AttemptReport {
                        source_key: source.key(),
                        source_name: source.display_name(),
                        supplied_abstract: true,
                        reason: None,
                    });
                    break;
                }
                None => {
                    let reason = outcome
                        .failure_reason
                        .unwrap_or_else(|| "no abstract".to_string());
                    debug!(source = source.key(), reason = %reason, "source without abstract");
                    attempts.push(AttemptReport {
                        source_key: source.key(),
                        source_name: source.display_name(),
                        supplied_abstract: false,
                        reason: Some(reason),
                    });
                }
            }
        }

        attempts
    }
}

/// Joins failure tokens of unsuccessful attempts into the persisted
/// `abstract_no_retrieval_reason` string, in attempt order.
#[must_use]
pub fn compile_failure_reasons(attempts: &[AttemptReport]) -> Option<String> {
    let reasons: Vec<String> = attempts
        .iter()
        .filter(|attempt| !attempt.supplied_abstract)
        .map(|attempt| {
            format!(
                "{}: {}",
                attempt.source_name,
                attempt.reason.as_deref().unwrap_or("no abstract")
            )
        })
        .collect();
    if reasons.is_empty() {
        None
    } else {
        Some(reasons.join("; "))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::enrich::sources::{AbstractFetch, test_support};
    use crate::provenance::ProvenanceEntry;
    use async_trait::async_trait;
    use serde_json::json;

    /// Scripted source used to drive the chain deterministically.
    struct ScriptedSource {
        key: &'static str,
        name: &'static str,
        abstract_text: Option<&'static str>,
        reason: Option<&'static str>,
    }

    #[async_trait]
    impl AbstractSource for ScriptedSource {
        fn key(&self) -> &'static str {
            self.key
        }
        fn display_name(&self) -> &'static str {
            self.name
        }
        fn rate_key(&self) -> &'static str {
            "openalex"
        }
        async fn fetch_abstract(&self, _article: &ResearchArticle) -> AbstractFetch {
            let entry = ProvenanceEntry::new("u", "t", json!({"source": self.key}));
            match self.abstract_text {
                Some(text) => AbstractFetch::found(text.to_string(), entry),
                None => AbstractFetch::missing(self.reason.unwrap_or("down"), Some(entry)),
            }
        }
    }

    fn miss(key: &'static str, name: &'static str, reason: &'static str) -> Box<dyn AbstractSource> {
        Box::new(ScriptedSource {
            key,
            name,
            abstract_text: None,
            reason: Some(reason),
        })
    }

    fn hit(key: &'static str, name: &'static str, text: &'static str) -> Box<dyn AbstractSource> {
        Box::new(ScriptedSource {
            key,
            name,
            abstract_text: Some(text),
            reason: None,
        })
    }

    #[tokio::test]
    async fn test_first_hit_wins_and_short_circuits() {
        let pipeline = AbstractPipeline::new(vec![
            miss("s2", "Semantic Scholar", "HTTP 404"),
            hit("crossref", "Crossref", "From Crossref."),
            hit("openalex", "OpenAlex", "never reached"),
        ]);
        let limiters = RateLimiterSet::with_rates([("openalex", 1000.0)]);
        let mut article = test_support::article(Some("10.1/x"));
        let mut provenance = ProvenanceMap::new();

        let attempts = pipeline
            .enrich(&mut article, &limiters, &mut provenance)
            .await;

        assert_eq!(article.abstract_text.as_deref(), Some("From Crossref."));
        assert_eq!(article.abstract_source.as_deref(), Some("crossref"));
        assert_eq!(attempts.len(), 2, "openalex never attempted");
        assert!(provenance.contains_key("s2"));
        assert!(provenance.contains_key("crossref"));
        assert!(!provenance.contains_key("openalex"));
    }

    #[tokio::test]
    async fn test_all_sources_fail_reports_every_reason() {
        let pipeline = AbstractPipeline::new(vec![
            miss("crossref", "Crossref", "HTTP 404"),
            miss("openalex", "OpenAlex", "no abstract field in response"),
            miss("pubmed", "PubMed", "DOI not indexed in PubMed"),
        ]);
        let limiters = RateLimiterSet::with_rates([("openalex", 1000.0)]);
        let mut article = test_support::article(Some("10.1/x"));
        let mut provenance = ProvenanceMap::new();

        let attempts = pipeline
            .enrich(&mut article, &limiters, &mut provenance)
            .await;

        assert!(article.abstract_text.is_none());
        let compiled = compile_failure_reasons(&attempts).unwrap();
        assert_eq!(
            compiled,
            "Crossref: HTTP 404; OpenAlex: no abstract field in response; \
             PubMed: DOI not indexed in PubMed"
        );
    }

    #[tokio::test]
    async fn test_existing_abstract_skips_chain() {
        let pipeline = AbstractPipeline::new(vec![hit("crossref", "Crossref", "unused")]);
        let limiters = RateLimiterSet::with_rates([("openalex", 1000.0)]);
        let mut article = test_support::article(Some("10.1/x"));
        article.abstract_text = Some("From the preprint server.".to_string());
        article.abstract_source = Some("arxiv".to_string());
        let mut provenance = ProvenanceMap::new();

        let attempts = pipeline
            .enrich(&mut article, &limiters, &mut provenance)
            .await;

        assert!(attempts.is_empty());
        assert_eq!(article.abstract_source.as_deref(), Some("arxiv"));
    }

    #[test]
    fn test_compile_failure_reasons_none_when_all_supplied() {
        let attempts = vec![AttemptReport {
            source_key: "crossref",
            source_name: "Crossref",
            supplied_abstract: true,
            reason: None,
        }];
        assert_eq!(compile_failure_reasons(&attempts), None);
    }
}
