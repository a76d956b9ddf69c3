//! Preprint ↔ published-version links.
//!
//! The relation lives in `article_versions` - no bidirectional foreign keys
//! on the article rows. At most one link per ordered pair, self-links
//! forbidden, and link insertion is idempotent.

use std::collections::BTreeMap;

use sqlx::Row;
use tracing::instrument;

use super::error::{Result, StoreError};
use super::Store;

/// Outcome of an idempotent link insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// New link row created.
    Created(i64),
    /// The ordered pair was already linked; nothing written.
    AlreadyLinked,
}

/// Aggregate view of the version-linking state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionLinkingStats {
    pub total_preprints: i64,
    pub preprints_with_published_version: i64,
    pub published_with_preprint_version: i64,
    pub by_preprint_source: BTreeMap<String, i64>,
    pub by_discovery_source: BTreeMap<String, i64>,
}

impl Store {
    /// Inserts a preprint → published link if the pair is not linked yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SelfLink`] when both ids are equal, otherwise
    /// [`StoreError::Database`] on failure.
    #[instrument(skip(self))]
    pub async fn insert_article_version_link(
        &self,
        preprint_id: i64,
        published_id: i64,
        discovery_source: &str,
        link_datetime: &str,
    ) -> Result<LinkOutcome> {
        if preprint_id == published_id {
            return Err(StoreError::SelfLink(preprint_id));
        }

        let result = sqlx::query(
            r"INSERT OR IGNORE INTO article_versions (
                  preprint_id, published_id, discovery_source, link_datetime
              ) VALUES (?, ?, ?, ?)",
        )
        .bind(preprint_id)
        .bind(published_id)
        .bind(discovery_source)
        .bind(link_datetime)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(LinkOutcome::AlreadyLinked);
        }
        Ok(LinkOutcome::Created(result.last_insert_rowid()))
    }

    /// The published-version record id linked from a preprint, when any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    pub async fn published_version_id(&self, preprint_id: i64) -> Result<Option<i64>> {
        let row = sqlx::query(
            r"SELECT published_id FROM article_versions WHERE preprint_id = ? LIMIT 1",
        )
        .bind(preprint_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|row| row.get("published_id")))
    }

    /// Aggregates linking statistics for reporting.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    #[instrument(skip(self))]
    pub async fn version_linking_stats(&self) -> Result<VersionLinkingStats> {
        let mut stats = VersionLinkingStats::default();

        let row = sqlx::query(
            r"SELECT COUNT(*) AS count FROM research_articles WHERE is_preprint = 1",
        )
        .fetch_one(self.pool())
        .await?;
        stats.total_preprints = row.get("count");

        let row = sqlx::query(
            r"SELECT COUNT(DISTINCT preprint_id) AS count FROM article_versions",
        )
        .fetch_one(self.pool())
        .await?;
        stats.preprints_with_published_version = row.get("count");

        let row = sqlx::query(
            r"SELECT COUNT(DISTINCT published_id) AS count FROM article_versions",
        )
        .fetch_one(self.pool())
        .await?;
        stats.published_with_preprint_version = row.get("count");

        let rows = sqlx::query(
            r"SELECT preprint_source, COUNT(*) AS count FROM research_articles
              WHERE is_preprint = 1 AND preprint_source IS NOT NULL
              GROUP BY preprint_source",
        )
        .fetch_all(self.pool())
        .await?;
        stats.by_preprint_source = rows
            .iter()
            .map(|row| (row.get("preprint_source"), row.get("count")))
            .collect();

        let rows = sqlx::query(
            r"SELECT discovery_source, COUNT(*) AS count FROM article_versions
              WHERE discovery_source IS NOT NULL
              GROUP BY discovery_source",
        )
        .fetch_all(self.pool())
        .await?;
        stats.by_discovery_source = rows
            .iter()
            .map(|row| (row.get("discovery_source"), row.get("count")))
            .collect();

        Ok(stats)
    }
}
