//! Article CRUD: ingest inserts, the enrichment work list, and enrichment
//! write-back.

use sqlx::Row;
use tracing::{debug, instrument};

use super::article::{ImportOutcome, NewArticle, ResearchArticle};
use super::error::{Result, StoreError};
use super::Store;

impl Store {
    /// Inserts a new article row.
    ///
    /// A duplicate normalized DOI is not an error: it surfaces as
    /// [`ImportOutcome::SkippedDuplicate`] so ingest can report it and move
    /// on. Any other integrity violation fails this row only.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] for non-duplicate failures.
    #[instrument(skip(self, article), fields(doi = article.doi_norm.as_deref().unwrap_or("-")))]
    pub async fn insert_article(&self, article: &NewArticle) -> Result<ImportOutcome> {
        let result = sqlx::query(
            r"INSERT INTO research_articles (
                  title, doi_raw, doi_norm, pub_date, total_citations,
                  citations_per_year, authors, source_title, arxiv_id,
                  is_preprint, preprint_source, import_datetime
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              RETURNING id",
        )
        .bind(&article.title)
        .bind(&article.doi_raw)
        .bind(&article.doi_norm)
        .bind(&article.pub_date)
        .bind(article.total_citations)
        .bind(article.citations_per_year)
        .bind(&article.authors)
        .bind(&article.source_title)
        .bind(&article.arxiv_id)
        .bind(article.is_preprint)
        .bind(&article.preprint_source)
        .bind(&article.import_datetime)
        .fetch_one(self.pool())
        .await;

        match result {
            Ok(row) => Ok(ImportOutcome::Inserted(row.get("id"))),
            Err(error) => {
                let wrapped = StoreError::from(error);
                if wrapped.is_unique_violation() {
                    debug!("duplicate doi_norm, skipping");
                    Ok(ImportOutcome::SkippedDuplicate)
                } else {
                    Err(wrapped)
                }
            }
        }
    }

    /// Updates the row matching `doi_norm`, or inserts when absent.
    ///
    /// The update path never touches `import_datetime` or
    /// `enrichment_datetime`; articles without a DOI always insert.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    #[instrument(skip(self, article), fields(doi = article.doi_norm.as_deref().unwrap_or("-")))]
    pub async fn upsert_by_doi(&self, article: &NewArticle) -> Result<i64> {
        if let Some(doi_norm) = &article.doi_norm {
            let updated = sqlx::query(
                r"UPDATE research_articles SET
                      title = ?, doi_raw = ?, pub_date = ?, total_citations = ?,
                      citations_per_year = ?, authors = ?, source_title = ?,
                      arxiv_id = ?, is_preprint = ?, preprint_source = ?
                  WHERE doi_norm = ?
                  RETURNING id",
            )
            .bind(&article.title)
            .bind(&article.doi_raw)
            .bind(&article.pub_date)
            .bind(article.total_citations)
            .bind(article.citations_per_year)
            .bind(&article.authors)
            .bind(&article.source_title)
            .bind(&article.arxiv_id)
            .bind(article.is_preprint)
            .bind(&article.preprint_source)
            .bind(doi_norm)
            .fetch_optional(self.pool())
            .await?;

            if let Some(row) = updated {
                return Ok(row.get("id"));
            }
        }

        match self.insert_article(article).await? {
            ImportOutcome::Inserted(id) => Ok(id),
            // Unreachable in practice: the UPDATE above matched nothing, so
            // the insert cannot collide unless a concurrent writer raced us.
            // Resolve by reading the winner's row.
            ImportOutcome::SkippedDuplicate => {
                let doi = article.doi_norm.as_deref().unwrap_or_default();
                let existing = self.find_by_doi(doi).await?;
                existing
                    .map(|a| a.id)
                    .ok_or_else(|| StoreError::not_found("research_article", 0))
            }
        }
    }

    /// Fetches an article by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    #[instrument(skip(self))]
    pub async fn article(&self, id: i64) -> Result<Option<ResearchArticle>> {
        let article =
            sqlx::query_as::<_, ResearchArticle>(r"SELECT * FROM research_articles WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
        Ok(article)
    }

    /// Fetches an article by normalized DOI.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    #[instrument(skip(self))]
    pub async fn find_by_doi(&self, doi_norm: &str) -> Result<Option<ResearchArticle>> {
        let article = sqlx::query_as::<_, ResearchArticle>(
            r"SELECT * FROM research_articles WHERE doi_norm = ?",
        )
        .bind(doi_norm)
        .fetch_optional(self.pool())
        .await?;
        Ok(article)
    }

    /// Returns every article, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    #[instrument(skip(self))]
    pub async fn all_articles(&self) -> Result<Vec<ResearchArticle>> {
        let articles =
            sqlx::query_as::<_, ResearchArticle>(r"SELECT * FROM research_articles ORDER BY id")
                .fetch_all(self.pool())
                .await?;
        Ok(articles)
    }

    /// The enrichment work list: articles whose `enrichment_datetime` is
    /// still NULL. This query is the single source of truth for the
    /// multi-pass loop - newly discovered published versions join it
    /// automatically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    #[instrument(skip(self))]
    pub async fn articles_needing_enrichment(&self) -> Result<Vec<ResearchArticle>> {
        let articles = sqlx::query_as::<_, ResearchArticle>(
            r"SELECT * FROM research_articles WHERE enrichment_datetime IS NULL ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(articles)
    }

    /// Writes enrichment results back to the row.
    ///
    /// Only enrichment-owned columns are touched; ingest columns (title,
    /// citation counts, import_datetime) stay as imported.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the row vanished, or
    /// [`StoreError::Database`] on failure.
    #[instrument(skip(self, article), fields(id = article.id))]
    pub async fn update_enrichment(&self, article: &ResearchArticle) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE research_articles SET
                  abstract_text = ?, abstract_source = ?,
                  abstract_no_retrieval_reason = ?, pmid = ?, arxiv_id = ?,
                  is_preprint = ?, preprint_source = ?, is_oa = ?,
                  oa_status = ?, license = ?, oa_pdf_url = ?, provenance = ?,
                  enrichment_datetime = ?
              WHERE id = ?",
        )
        .bind(&article.abstract_text)
        .bind(&article.abstract_source)
        .bind(&article.abstract_no_retrieval_reason)
        .bind(&article.pmid)
        .bind(&article.arxiv_id)
        .bind(article.is_preprint)
        .bind(&article.preprint_source)
        .bind(article.is_oa)
        .bind(&article.oa_status)
        .bind(&article.license)
        .bind(&article.oa_pdf_url)
        .bind(&article.provenance)
        .bind(&article.enrichment_datetime)
        .bind(article.id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("research_article", article.id));
        }
        Ok(())
    }

    /// Total number of articles.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    pub async fn article_count(&self) -> Result<i64> {
        let row = sqlx::query(r"SELECT COUNT(*) AS count FROM research_articles")
            .fetch_one(self.pool())
            .await?;
        Ok(row.get("count"))
    }
}
