//! Filter runs and per-record decisions.
//!
//! One `filtering_queries` row per run; exactly one `records_filterings` row
//! per (record, run) pair, inserted in a single batch at the end of the run.
//! The `ERROR:` / `WARNING:` explanation prefixes partition decisions for
//! downstream stages and are part of the external contract.

use sqlx::{FromRow, Row};
use tracing::{debug, instrument};

use super::article::ResearchArticle;
use super::error::Result;
use super::Store;

/// One filter run.
#[derive(Debug, Clone, FromRow)]
pub struct FilteringQuery {
    pub id: i64,
    pub filtering_query_datetime: String,
    pub query: String,
    pub exclude_criteria: Option<String>,
    pub llm_model: String,
    pub max_concurrent: Option<i64>,
    pub total_records: Option<i64>,
    pub matched_count: Option<i64>,
    pub failed_count: Option<i64>,
    pub warning_count: Option<i64>,
}

/// One persisted decision row (join-friendly view).
#[derive(Debug, Clone, FromRow)]
pub struct FilteringResult {
    pub id: i64,
    pub record_id: i64,
    pub filtering_query_id: i64,
    pub match_result: bool,
    pub explanation: Option<String>,
    pub decision_datetime: Option<String>,
}

/// Decision produced by the filter executor for one record, before it is
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteringDecision {
    pub record_id: i64,
    pub match_result: bool,
    pub explanation: String,
}

impl FilteringDecision {
    /// True when this decision counts as a processing failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.explanation.starts_with("ERROR:")
    }

    /// True when this decision is flagged suspicious.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.explanation.starts_with("WARNING:")
    }
}

impl Store {
    /// Creates a filtering query row at the start of a run. Counts start at
    /// zero and are written once at the end.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] on failure.
    #[instrument(skip(self, query, exclude), fields(model = llm_model))]
    pub async fn create_filtering_query(
        &self,
        timestamp: &str,
        query: &str,
        exclude: &str,
        llm_model: &str,
        max_concurrent: i64,
    ) -> Result<i64> {
        let row = sqlx::query(
            r"INSERT INTO filtering_queries (
                  filtering_query_datetime, query, exclude_criteria, llm_model,
                  max_concurrent, total_records, matched_count, failed_count,
                  warning_count
              ) VALUES (?, ?, ?, ?, ?, 0, 0, 0, 0)
              RETURNING id",
        )
        .bind(timestamp)
        .bind(query)
        .bind(exclude)
        .bind(llm_model)
        .bind(max_concurrent)
        .fetch_one(self.pool())
        .await?;
        Ok(row.get("id"))
    }

    /// Writes the final statistics for a run.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] on failure.
    #[instrument(skip(self))]
    pub async fn update_filtering_query_stats(
        &self,
        filtering_query_id: i64,
        total_records: i64,
        matched_count: i64,
        failed_count: i64,
        warning_count: i64,
    ) -> Result<()> {
        sqlx::query(
            r"UPDATE filtering_queries
              SET total_records = ?, matched_count = ?, failed_count = ?, warning_count = ?
              WHERE id = ?",
        )
        .bind(total_records)
        .bind(matched_count)
        .bind(failed_count)
        .bind(warning_count)
        .bind(filtering_query_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Fetches a filter run by id.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] on failure.
    pub async fn filtering_query(&self, id: i64) -> Result<Option<FilteringQuery>> {
        let query =
            sqlx::query_as::<_, FilteringQuery>(r"SELECT * FROM filtering_queries WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
        Ok(query)
    }

    /// Inserts all decisions of a run in one transaction.
    ///
    /// The UNIQUE(record_id, filtering_query_id) constraint makes decision
    /// rows write-once per pair; a violated constraint aborts the batch so a
    /// re-run never half-overwrites a previous run.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] on failure.
    #[instrument(skip(self, decisions), fields(count = decisions.len()))]
    pub async fn batch_insert_filtering_results(
        &self,
        filtering_query_id: i64,
        timestamp: &str,
        decisions: &[FilteringDecision],
    ) -> Result<()> {
        if decisions.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool().begin().await?;
        for decision in decisions {
            sqlx::query(
                r"INSERT INTO records_filterings (
                      record_id, filtering_query_id, match_result, explanation,
                      decision_datetime
                  ) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(decision.record_id)
            .bind(filtering_query_id)
            .bind(decision.match_result)
            .bind(&decision.explanation)
            .bind(timestamp)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(count = decisions.len(), "filter decisions persisted");
        Ok(())
    }

    /// Returns decision rows for a run, ordered by record id.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] on failure.
    pub async fn filtering_results(&self, filtering_query_id: i64) -> Result<Vec<FilteringResult>> {
        let rows = sqlx::query_as::<_, FilteringResult>(
            r"SELECT * FROM records_filterings
              WHERE filtering_query_id = ?
              ORDER BY record_id",
        )
        .bind(filtering_query_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Returns the articles a run matched cleanly: `match_result = 1` and an
    /// explanation carrying neither reserved prefix. This is the population
    /// that feeds export and the PDF stage.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] on failure.
    #[instrument(skip(self))]
    pub async fn matched_articles(&self, filtering_query_id: i64) -> Result<Vec<ResearchArticle>> {
        let articles = sqlx::query_as::<_, ResearchArticle>(
            r"SELECT r.* FROM research_articles r
              JOIN records_filterings rf ON r.id = rf.record_id
              WHERE rf.filtering_query_id = ?
                AND rf.match_result = 1
                AND rf.explanation NOT LIKE 'ERROR:%'
                AND rf.explanation NOT LIKE 'WARNING:%'
              ORDER BY r.id",
        )
        .bind(filtering_query_id)
        .fetch_all(self.pool())
        .await?;
        Ok(articles)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::NewArticle;

    async fn seed_articles(store: &Store, count: usize) -> Vec<i64> {
        let mut ids = Vec::new();
        for n in 0..count {
            let mut article =
                NewArticle::new(format!("Article {n}"), "2025-01-01T00:00:00Z");
            article.doi_norm = Some(format!("10.1234/seed.{n}"));
            let crate::store::ImportOutcome::Inserted(id) =
                store.insert_article(&article).await.unwrap()
            else {
                panic!("seed insert failed");
            };
            ids.push(id);
        }
        ids
    }

    fn decision(record_id: i64, matched: bool, explanation: &str) -> FilteringDecision {
        FilteringDecision {
            record_id,
            match_result: matched,
            explanation: explanation.to_string(),
        }
    }

    #[tokio::test]
    async fn test_run_lifecycle_and_stats() {
        let store = Store::new_in_memory().await.unwrap();
        let qid = store
            .create_filtering_query("2025-02-01T00:00:00Z", "2d segmentation", "3d", "gpt-x", 10)
            .await
            .unwrap();

        store
            .update_filtering_query_stats(qid, 3, 2, 1, 1)
            .await
            .unwrap();

        let run = store.filtering_query(qid).await.unwrap().unwrap();
        assert_eq!(run.total_records, Some(3));
        assert_eq!(run.matched_count, Some(2));
        assert_eq!(run.failed_count, Some(1));
        assert_eq!(run.warning_count, Some(1));
    }

    #[tokio::test]
    async fn test_matched_articles_excludes_reserved_prefixes() {
        let store = Store::new_in_memory().await.unwrap();
        let ids = seed_articles(&store, 4).await;
        let qid = store
            .create_filtering_query("2025-02-01T00:00:00Z", "q", "", "gpt-x", 10)
            .await
            .unwrap();

        store
            .batch_insert_filtering_results(
                qid,
                "2025-02-01T00:01:00Z",
                &[
                    decision(ids[0], true, "matches because it is about X"),
                    decision(ids[1], true, "WARNING: LLM returned match=true without explanation"),
                    decision(ids[2], false, "ERROR: TooManyRequests: 429"),
                    decision(ids[3], false, "not about X"),
                ],
            )
            .await
            .unwrap();

        let matched = store.matched_articles(qid).await.unwrap();
        assert_eq!(matched.len(), 1, "only the clean match is exported");
        assert_eq!(matched[0].id, ids[0]);
    }

    #[tokio::test]
    async fn test_one_decision_per_pair_enforced() {
        let store = Store::new_in_memory().await.unwrap();
        let ids = seed_articles(&store, 1).await;
        let qid = store
            .create_filtering_query("2025-02-01T00:00:00Z", "q", "", "gpt-x", 10)
            .await
            .unwrap();

        store
            .batch_insert_filtering_results(
                qid,
                "t",
                &[decision(ids[0], true, "first decision")],
            )
            .await
            .unwrap();

        let dup = store
            .batch_insert_filtering_results(
                qid,
                "t",
                &[decision(ids[0], false, "second decision")],
            )
            .await;
        assert!(dup.is_err(), "second decision for the same pair must fail");

        let rows = store.filtering_results(qid).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].explanation.as_deref(), Some("first decision"));
    }

    #[tokio::test]
    async fn test_cascade_delete_from_filtering_query() {
        let store = Store::new_in_memory().await.unwrap();
        let ids = seed_articles(&store, 1).await;
        let qid = store
            .create_filtering_query("2025-02-01T00:00:00Z", "q", "", "gpt-x", 10)
            .await
            .unwrap();
        store
            .batch_insert_filtering_results(qid, "t", &[decision(ids[0], true, "ok")])
            .await
            .unwrap();

        sqlx::query("DELETE FROM filtering_queries WHERE id = ?")
            .bind(qid)
            .execute(store.pool())
            .await
            .unwrap();

        let rows = store.filtering_results(qid).await.unwrap();
        assert!(rows.is_empty(), "decisions cascade with their run");
    }
}
