//! The filter executor: bounded-concurrency LLM calls over the corpus with a
//! full audit trail.
//!
//! One [`FilteringQuery`](crate::store::FilteringQuery) row is created per
//! run; every record gets exactly one decision row, inserted in a single
//! batch at the end. No record is ever silently dropped - model failures
//! become `ERROR:`-prefixed decisions.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, instrument};

use super::decision::{error_explanation, parse_decision};
use super::llm::{LlmClient, complete_with_retry};
use super::prompts::build_filter_prompt;
use crate::store::{FilteringDecision, ResearchArticle, Store, StoreError};
use crate::timestamp;

/// Output-token budget for one decision.
const MAX_OUTPUT_TOKENS: u32 = 5000;

/// Default bound on concurrent model calls.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Parameters of one filter run.
#[derive(Debug, Clone)]
pub struct FilterRequest {
    /// Inclusion criteria, natural language.
    pub query: String,
    /// Exclusion criteria, natural language (may be empty).
    pub exclude: String,
    /// Model identifier recorded with the run.
    pub model: String,
    /// Bound on concurrent model calls.
    pub max_concurrent: usize,
}

/// Final statistics of a run, mirrored into `filtering_queries`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRunSummary {
    pub filtering_query_id: i64,
    pub total: usize,
    pub matched: usize,
    pub failed: usize,
    pub warnings: usize,
}

/// Runs LLM relevance decisions over the whole corpus.
#[derive(Clone)]
pub struct FilterExecutor {
    store: Store,
    llm: Arc<dyn LlmClient>,
}

impl FilterExecutor {
    /// Creates an executor over the given store and model client.
    #[must_use]
    pub fn new(store: Store, llm: Arc<dyn LlmClient>) -> Self {
        Self { store, llm }
    }

    /// Executes one filter run over every article in the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for persistence failures. Model failures never
    /// abort the run; they are recorded per record.
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn run(&self, request: &FilterRequest) -> Result<FilterRunSummary, StoreError> {
        let articles = self.store.all_articles().await?;
        let started_at = timestamp::now_iso();

        let filtering_query_id = self
            .store
            .create_filtering_query(
                &started_at,
                &request.query,
                &request.exclude,
                &request.model,
                request.max_concurrent as i64,
            )
            .await?;

        info!(
            filtering_query_id,
            records = articles.len(),
            max_concurrent = request.max_concurrent,
            "filter run started"
        );

        let decisions = self.decide_all(&articles, request).await;

        // One batch at the end: a crash mid-run loses only in-flight
        // decisions, and the run row without results is detectable.
        self.store
            .batch_insert_filtering_results(filtering_query_id, &timestamp::now_iso(), &decisions)
            .await?;

        let matched = decisions
            .iter()
            .filter(|decision| decision.match_result && !decision.is_error())
            .count();
        let failed = decisions.iter().filter(|d| d.is_error()).count();
        let warnings = decisions.iter().filter(|d| d.is_warning()).count();

        self.store
            .update_filtering_query_stats(
                filtering_query_id,
                articles.len() as i64,
                matched as i64,
                failed as i64,
                warnings as i64,
            )
            .await?;

        info!(
            filtering_query_id,
            total = articles.len(),
            matched,
            failed,
            warnings,
            "filter run completed"
        );

        Ok(FilterRunSummary {
            filtering_query_id,
            total: articles.len(),
            matched,
            failed,
            warnings,
        })
    }

    /// Fans decisions out under the concurrency bound, preserving one
    /// decision per record.
    async fn decide_all(
        &self,
        articles: &[ResearchArticle],
        request: &FilterRequest,
    ) -> Vec<FilteringDecision> {
        let semaphore = Arc::new(Semaphore::new(request.max_concurrent.max(1)));
        let mut handles = Vec::with_capacity(articles.len());

        for article in articles {
            let executor = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let record_id = article.id;
            let title = article.title.clone();
            let abstract_text = article.abstract_text.clone();
            let query = request.query.clone();
            let exclude = request.exclude.clone();
            let model = request.model.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return FilteringDecision {
                        record_id,
                        match_result: false,
                        explanation: error_explanation("Cancelled", "executor shut down"),
                    };
                };
                executor
                    .decide_one(record_id, &title, abstract_text.as_deref(), &query, &exclude, &model)
                    .await
            }));
        }

        let mut decisions = Vec::with_capacity(handles.len());
        for (handle, article) in handles.into_iter().zip(articles) {
            match handle.await {
                Ok(decision) => decisions.push(decision),
                Err(join_error) => {
                    error!(record_id = article.id, error = %join_error, "decision task panicked");
                    decisions.push(FilteringDecision {
                        record_id: article.id,
                        match_result: false,
                        explanation: error_explanation("TaskPanic", &join_error.to_string()),
                    });
                }
            }
        }
        decisions
    }

    async fn decide_one(
        &self,
        record_id: i64,
        title: &str,
        abstract_text: Option<&str>,
        query: &str,
        exclude: &str,
        model: &str,
    ) -> FilteringDecision {
        let prompt = build_filter_prompt(query, exclude, title, abstract_text);

        match complete_with_retry(
            self.llm.as_ref(),
            &prompt.system,
            &prompt.user,
            model,
            MAX_OUTPUT_TOKENS,
        )
        .await
        {
            Ok(content) => {
                let decision = parse_decision(&content);
                FilteringDecision {
                    record_id,
                    match_result: decision.match_result,
                    explanation: decision.explanation,
                }
            }
            Err(llm_error) => {
                error!(record_id, error = %llm_error, "model call failed after retries");
                FilteringDecision {
                    record_id,
                    match_result: false,
                    explanation: error_explanation(llm_error.kind(), &llm_error.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::filter::llm::LlmError;
    use crate::store::{ImportOutcome, NewArticle};
    use async_trait::async_trait;

    /// Scripted model: answers by matching against the article title
    /// embedded in the user prompt.
    struct ScriptedModel;

    #[async_trait]
    impl LlmClient for ScriptedModel {
        async fn complete(
            &self,
            _system: &str,
            user: &str,
            _model: &str,
            _max_output_tokens: u32,
        ) -> Result<String, LlmError> {
            if user.contains("Article A") {
                Ok(r#"{"match": true, "explanation": "matches because it is about X"}"#.to_string())
            } else if user.contains("Article B") {
                Ok(r#"{"match": true}"#.to_string())
            } else {
                Err(LlmError::Api {
                    status: 429,
                    message: "Too Many Requests".to_string(),
                })
            }
        }
    }

    async fn seed(store: &Store, title: &str, doi: &str) -> i64 {
        let mut article = NewArticle::new(title, "2025-01-01T00:00:00Z");
        article.doi_norm = Some(doi.to_string());
        let ImportOutcome::Inserted(id) = store.insert_article(&article).await.unwrap() else {
            panic!("seed failed");
        };
        id
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_outcome_run() {
        let store = Store::new_in_memory().await.unwrap();
        let id_a = seed(&store, "Article A", "10.1/a").await;
        let id_b = seed(&store, "Article B", "10.1/b").await;
        let id_c = seed(&store, "Article C", "10.1/c").await;

        let executor = FilterExecutor::new(store.clone(), Arc::new(ScriptedModel));
        let summary = executor
            .run(&FilterRequest {
                query: "about X".to_string(),
                exclude: String::new(),
                model: "scripted".to_string(),
                max_concurrent: 10,
            })
            .await
            .unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.warnings, 1);

        let rows = store.filtering_results(summary.filtering_query_id).await.unwrap();
        assert_eq!(rows.len(), 3, "one decision per record, none dropped");

        let by_id = |id: i64| rows.iter().find(|row| row.record_id == id).unwrap();
        assert!(by_id(id_a).match_result);
        assert_eq!(
            by_id(id_a).explanation.as_deref(),
            Some("matches because it is about X")
        );
        assert_eq!(
            by_id(id_b).explanation.as_deref(),
            Some("WARNING: LLM returned match=true without explanation")
        );
        assert!(!by_id(id_c).match_result);
        assert!(by_id(id_c).explanation.as_deref().unwrap().starts_with("ERROR:"));

        // Export population contains only the clean match.
        let matched = store.matched_articles(summary.filtering_query_id).await.unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, id_a);

        // Stats persisted on the run row.
        let run = store
            .filtering_query(summary.filtering_query_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(run.total_records, Some(3));
        assert_eq!(run.matched_count, Some(2));
        assert_eq!(run.failed_count, Some(1));
        assert_eq!(run.warning_count, Some(1));
    }

    #[tokio::test]
    async fn test_empty_corpus_creates_run_with_zero_rows() {
        let store = Store::new_in_memory().await.unwrap();
        let executor = FilterExecutor::new(store.clone(), Arc::new(ScriptedModel));
        let summary = executor
            .run(&FilterRequest {
                query: "q".to_string(),
                exclude: String::new(),
                model: "scripted".to_string(),
                max_concurrent: 5,
            })
            .await
            .unwrap();

        assert_eq!(summary.total, 0);
        let rows = store.filtering_results(summary.filtering_query_id).await.unwrap();
        assert!(rows.is_empty());
    }
}
