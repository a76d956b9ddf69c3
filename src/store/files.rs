//! File-artifact tracking: PDF resolutions and downloads, DOCX renditions,
//! HTML fulltext pages, and converted Markdown.
//!
//! Download statuses are literal contract strings used in aggregation
//! queries; see the status enums below.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row};
use tracing::{debug, instrument};

use super::error::{Result, StoreError};
use super::Store;

/// Outcome of one PDF download attempt. The string forms are part of the
/// external contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Downloaded,
    Unavailable,
    TooLarge,
    NoCandidates,
    Error,
}

impl DownloadStatus {
    /// Database string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Downloaded => "downloaded",
            Self::Unavailable => "unavailable",
            Self::TooLarge => "too_large",
            Self::NoCandidates => "no_candidates",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one HTML fulltext download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlDownloadStatus {
    Downloaded,
    NoUrl,
    Error,
}

impl HtmlDownloadStatus {
    /// Database string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Downloaded => "downloaded",
            Self::NoUrl => "no_url",
            Self::Error => "error",
        }
    }
}

/// Which artifact a Markdown rendition was converted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkdownSource {
    Docx,
    Html,
}

impl MarkdownSource {
    /// Database string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Html => "html",
        }
    }
}

/// Conversion flavor of a Markdown rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkdownVariant {
    NoImages,
    WithImages,
}

impl MarkdownVariant {
    /// Database string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoImages => "no_images",
            Self::WithImages => "with_images",
        }
    }
}

/// A (url, source) pair the resolver believes may yield a PDF, with the
/// license when the source advertises one. Persisted as ordered JSON in
/// `pdf_resolutions.candidates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfCandidate {
    pub url: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

impl PdfCandidate {
    /// Creates a candidate without license information.
    #[must_use]
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
            license: None,
        }
    }
}

/// One persisted PDF download attempt.
#[derive(Debug, Clone, FromRow)]
pub struct PdfDownload {
    pub id: i64,
    pub record_id: i64,
    pub filtering_query_id: Option<i64>,
    pub download_datetime: String,
    pub url: String,
    pub source: String,
    pub status: String,
    pub pdf_local_path: Option<String>,
    pub sha1: Option<String>,
    pub final_url: Option<String>,
    pub error_message: Option<String>,
    pub file_size_bytes: Option<i64>,
}

/// Insert form for a PDF download attempt.
#[derive(Debug, Clone)]
pub struct NewPdfDownload<'a> {
    pub record_id: i64,
    pub filtering_query_id: Option<i64>,
    pub timestamp: &'a str,
    pub url: &'a str,
    pub source: &'a str,
    pub status: DownloadStatus,
    pub pdf_local_path: Option<&'a str>,
    pub sha1: Option<&'a str>,
    pub final_url: Option<&'a str>,
    pub error_message: Option<&'a str>,
    pub file_size_bytes: Option<i64>,
}

/// One located DOCX rendition (or a recorded miss).
#[derive(Debug, Clone, FromRow)]
pub struct DocxVersion {
    pub id: i64,
    pub record_id: i64,
    pub docx_local_path: Option<String>,
    pub retrieved_datetime: String,
    pub file_size_bytes: Option<i64>,
    pub error_message: Option<String>,
}

/// One converted Markdown rendition (or a recorded conversion failure).
#[derive(Debug, Clone, FromRow)]
pub struct MarkdownVersion {
    pub id: i64,
    pub record_id: i64,
    pub docx_version_id: Option<i64>,
    pub html_version_id: Option<i64>,
    pub source_type: String,
    pub variant: String,
    pub md_local_path: Option<String>,
    pub created_datetime: String,
    pub file_size_bytes: Option<i64>,
    pub error_message: Option<String>,
}

/// Insert form for a Markdown rendition.
#[derive(Debug, Clone)]
pub struct NewMarkdownVersion<'a> {
    pub record_id: i64,
    pub docx_version_id: Option<i64>,
    pub html_version_id: Option<i64>,
    pub source_type: MarkdownSource,
    pub variant: MarkdownVariant,
    pub md_local_path: Option<&'a str>,
    pub created_datetime: &'a str,
    pub file_size_bytes: Option<i64>,
    pub error_message: Option<&'a str>,
}

/// Insert form for an HTML fulltext download attempt.
#[derive(Debug, Clone)]
pub struct NewHtmlDownload<'a> {
    pub record_id: i64,
    pub filtering_query_id: Option<i64>,
    pub timestamp: &'a str,
    pub url: &'a str,
    pub source: &'a str,
    pub status: HtmlDownloadStatus,
    pub html_local_path: Option<&'a str>,
    pub file_size_bytes: Option<i64>,
    pub error_message: Option<&'a str>,
}

impl Store {
    /// Stores the ordered candidate snapshot for one resolution attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database or serialization failure.
    #[instrument(skip(self, candidates), fields(count = candidates.len()))]
    pub async fn insert_pdf_resolution(
        &self,
        record_id: i64,
        filtering_query_id: Option<i64>,
        timestamp: &str,
        candidates: &[PdfCandidate],
    ) -> Result<i64> {
        let serialized = serde_json::to_string(candidates)?;
        let row = sqlx::query(
            r"INSERT INTO pdf_resolutions (
                  record_id, filtering_query_id, resolution_datetime, candidates
              ) VALUES (?, ?, ?, ?)
              RETURNING id",
        )
        .bind(record_id)
        .bind(filtering_query_id)
        .bind(timestamp)
        .bind(serialized)
        .fetch_one(self.pool())
        .await?;
        Ok(row.get("id"))
    }

    /// Returns the most recent candidate snapshot for a record, or `None`
    /// when the record was never resolved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database or deserialization failure.
    pub async fn latest_candidates(&self, record_id: i64) -> Result<Option<Vec<PdfCandidate>>> {
        let row = sqlx::query(
            r"SELECT candidates FROM pdf_resolutions
              WHERE record_id = ?
              ORDER BY id DESC
              LIMIT 1",
        )
        .bind(record_id)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => {
                let raw: String = row.get("candidates");
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    /// Record ids that have at least one resolution snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    pub async fn resolved_record_ids(&self) -> Result<HashSet<i64>> {
        let rows = sqlx::query(r"SELECT DISTINCT record_id FROM pdf_resolutions")
            .fetch_all(self.pool())
            .await?;
        Ok(rows.iter().map(|row| row.get("record_id")).collect())
    }

    /// Record ids with at least one successful PDF download.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    pub async fn downloaded_record_ids(&self) -> Result<HashSet<i64>> {
        let rows = sqlx::query(
            r"SELECT DISTINCT record_id FROM pdf_downloads WHERE status = 'downloaded'",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.iter().map(|row| row.get("record_id")).collect())
    }

    /// Persists one download attempt (success or failure alike - every
    /// attempt is audit trail).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    #[instrument(
        skip(self, attempt),
        fields(record_id = attempt.record_id, status = %attempt.status)
    )]
    pub async fn record_pdf_download_attempt(&self, attempt: &NewPdfDownload<'_>) -> Result<i64> {
        let row = sqlx::query(
            r"INSERT INTO pdf_downloads (
                  record_id, filtering_query_id, download_datetime, url, source,
                  status, pdf_local_path, sha1, final_url, error_message,
                  file_size_bytes
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              RETURNING id",
        )
        .bind(attempt.record_id)
        .bind(attempt.filtering_query_id)
        .bind(attempt.timestamp)
        .bind(attempt.url)
        .bind(attempt.source)
        .bind(attempt.status.as_str())
        .bind(attempt.pdf_local_path)
        .bind(attempt.sha1)
        .bind(attempt.final_url)
        .bind(attempt.error_message)
        .bind(attempt.file_size_bytes)
        .fetch_one(self.pool())
        .await?;
        Ok(row.get("id"))
    }

    /// Status → count aggregation over download attempts, optionally scoped
    /// to one filter run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    pub async fn pdf_download_stats(
        &self,
        filtering_query_id: Option<i64>,
    ) -> Result<BTreeMap<String, i64>> {
        let rows = match filtering_query_id {
            Some(qid) => {
                sqlx::query(
                    r"SELECT status, COUNT(*) AS count FROM pdf_downloads
                      WHERE filtering_query_id = ?
                      GROUP BY status",
                )
                .bind(qid)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query(
                    r"SELECT status, COUNT(*) AS count FROM pdf_downloads GROUP BY status",
                )
                .fetch_all(self.pool())
                .await?
            }
        };
        Ok(rows
            .iter()
            .map(|row| (row.get("status"), row.get("count")))
            .collect())
    }

    /// Latest successfully downloaded PDF for a record, as (path, sha1).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    pub async fn latest_downloaded_pdf(
        &self,
        record_id: i64,
    ) -> Result<Option<(String, Option<String>)>> {
        let row = sqlx::query(
            r"SELECT pdf_local_path, sha1 FROM pdf_downloads
              WHERE record_id = ? AND status = 'downloaded' AND pdf_local_path IS NOT NULL
              ORDER BY id DESC
              LIMIT 1",
        )
        .bind(record_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|row| (row.get("pdf_local_path"), row.get("sha1"))))
    }

    /// Records a DOCX lookup (hit or miss).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    #[instrument(skip(self))]
    pub async fn insert_docx_version(
        &self,
        record_id: i64,
        docx_local_path: Option<&str>,
        retrieved_datetime: &str,
        file_size_bytes: Option<i64>,
        error_message: Option<&str>,
    ) -> Result<i64> {
        let row = sqlx::query(
            r"INSERT INTO docx_versions (
                  record_id, docx_local_path, retrieved_datetime, file_size_bytes,
                  error_message
              ) VALUES (?, ?, ?, ?, ?)
              RETURNING id",
        )
        .bind(record_id)
        .bind(docx_local_path)
        .bind(retrieved_datetime)
        .bind(file_size_bytes)
        .bind(error_message)
        .fetch_one(self.pool())
        .await?;
        Ok(row.get("id"))
    }

    /// Fetches a DOCX version row by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    pub async fn docx_version(&self, id: i64) -> Result<Option<DocxVersion>> {
        let version = sqlx::query_as::<_, DocxVersion>(r"SELECT * FROM docx_versions WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(version)
    }

    /// Record ids that already have a located DOCX.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    pub async fn records_with_docx(&self) -> Result<HashSet<i64>> {
        let rows = sqlx::query(
            r"SELECT DISTINCT record_id FROM docx_versions
              WHERE docx_local_path IS NOT NULL AND error_message IS NULL",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.iter().map(|row| row.get("record_id")).collect())
    }

    /// DOCX rows with a located file that no Markdown rendition references
    /// yet - the batch-conversion work list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    pub async fn docx_versions_pending_conversion(&self) -> Result<Vec<DocxVersion>> {
        let versions = sqlx::query_as::<_, DocxVersion>(
            r"SELECT d.* FROM docx_versions d
              WHERE d.docx_local_path IS NOT NULL
                AND d.error_message IS NULL
                AND NOT EXISTS (
                    SELECT 1 FROM markdown_versions m WHERE m.docx_version_id = d.id
                )
              ORDER BY d.id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(versions)
    }

    /// Inserts a Markdown rendition row.
    ///
    /// Exactly one of `docx_version_id` / `html_version_id` must be set,
    /// matching `source_type`. The table CHECK enforces this for fresh
    /// databases; this method enforces it for migrated ones.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidMarkdownParents`] when the parent
    /// reference is missing/ambiguous, otherwise [`StoreError::Database`].
    #[instrument(skip(self, version), fields(record_id = version.record_id))]
    pub async fn insert_markdown_version(&self, version: &NewMarkdownVersion<'_>) -> Result<i64> {
        let parents_valid = match version.source_type {
            MarkdownSource::Docx => {
                version.docx_version_id.is_some() && version.html_version_id.is_none()
            }
            MarkdownSource::Html => {
                version.html_version_id.is_some() && version.docx_version_id.is_none()
            }
        };
        if !parents_valid {
            return Err(StoreError::InvalidMarkdownParents);
        }

        let row = sqlx::query(
            r"INSERT INTO markdown_versions (
                  record_id, docx_version_id, html_version_id, source_type,
                  variant, md_local_path, created_datetime, file_size_bytes,
                  error_message
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
              RETURNING id",
        )
        .bind(version.record_id)
        .bind(version.docx_version_id)
        .bind(version.html_version_id)
        .bind(version.source_type.as_str())
        .bind(version.variant.as_str())
        .bind(version.md_local_path)
        .bind(version.created_datetime)
        .bind(version.file_size_bytes)
        .bind(version.error_message)
        .fetch_one(self.pool())
        .await?;
        Ok(row.get("id"))
    }

    /// All Markdown renditions for a record, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    pub async fn markdown_versions_for(&self, record_id: i64) -> Result<Vec<MarkdownVersion>> {
        let versions = sqlx::query_as::<_, MarkdownVersion>(
            r"SELECT * FROM markdown_versions WHERE record_id = ? ORDER BY id",
        )
        .bind(record_id)
        .fetch_all(self.pool())
        .await?;
        Ok(versions)
    }

    /// Persists one HTML fulltext download attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    #[instrument(
        skip(self, attempt),
        fields(record_id = attempt.record_id, status = attempt.status.as_str())
    )]
    pub async fn record_html_download_attempt(
        &self,
        attempt: &NewHtmlDownload<'_>,
    ) -> Result<i64> {
        let row = sqlx::query(
            r"INSERT INTO html_versions (
                  record_id, filtering_query_id, download_datetime, url, source,
                  status, html_local_path, file_size_bytes, error_message
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
              RETURNING id",
        )
        .bind(attempt.record_id)
        .bind(attempt.filtering_query_id)
        .bind(attempt.timestamp)
        .bind(attempt.url)
        .bind(attempt.source)
        .bind(attempt.status.as_str())
        .bind(attempt.html_local_path)
        .bind(attempt.file_size_bytes)
        .bind(attempt.error_message)
        .fetch_one(self.pool())
        .await?;
        debug!(id = row.get::<i64, _>("id"), "html attempt recorded");
        Ok(row.get("id"))
    }

    /// Record ids with a successfully downloaded HTML page.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    pub async fn html_downloaded_record_ids(&self) -> Result<HashSet<i64>> {
        let rows = sqlx::query(
            r"SELECT DISTINCT record_id FROM html_versions WHERE status = 'downloaded'",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.iter().map(|row| row.get("record_id")).collect())
    }

    /// Status → count aggregation over HTML download attempts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    pub async fn html_download_stats(
        &self,
        filtering_query_id: Option<i64>,
    ) -> Result<BTreeMap<String, i64>> {
        let rows = match filtering_query_id {
            Some(qid) => {
                sqlx::query(
                    r"SELECT status, COUNT(*) AS count FROM html_versions
                      WHERE filtering_query_id = ?
                      GROUP BY status",
                )
                .bind(qid)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query(r"SELECT status, COUNT(*) AS count FROM html_versions GROUP BY status")
                    .fetch_all(self.pool())
                    .await?
            }
        };
        Ok(rows
            .iter()
            .map(|row| (row.get("status"), row.get("count")))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{ImportOutcome, NewArticle};

    async fn seed_article(store: &Store) -> i64 {
        let article = NewArticle::new("Seed", "2025-01-01T00:00:00Z");
        let ImportOutcome::Inserted(id) = store.insert_article(&article).await.unwrap() else {
            panic!("seed insert failed");
        };
        id
    }

    #[tokio::test]
    async fn test_resolution_snapshot_round_trip() {
        let store = Store::new_in_memory().await.unwrap();
        let record_id = seed_article(&store).await;

        let candidates = vec![
            PdfCandidate::new("https://arxiv.org/pdf/2103.12345.pdf", "arxiv"),
            PdfCandidate {
                url: "https://oa.example.org/paper.pdf".to_string(),
                source: "unpaywall".to_string(),
                license: Some("cc-by".to_string()),
            },
        ];
        store
            .insert_pdf_resolution(record_id, None, "2025-03-01T00:00:00Z", &candidates)
            .await
            .unwrap();

        let loaded = store.latest_candidates(record_id).await.unwrap().unwrap();
        assert_eq!(loaded, candidates, "order and licenses preserved");
        assert!(store.resolved_record_ids().await.unwrap().contains(&record_id));
    }

    #[tokio::test]
    async fn test_latest_candidates_none_when_unresolved() {
        let store = Store::new_in_memory().await.unwrap();
        let record_id = seed_article(&store).await;
        assert!(store.latest_candidates(record_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_download_attempts_and_stats() {
        let store = Store::new_in_memory().await.unwrap();
        let record_id = seed_article(&store).await;

        for (status, sha1) in [
            (DownloadStatus::Unavailable, None),
            (DownloadStatus::Downloaded, Some("abc123")),
        ] {
            store
                .record_pdf_download_attempt(&NewPdfDownload {
                    record_id,
                    filtering_query_id: None,
                    timestamp: "2025-03-01T00:00:00Z",
                    url: "https://example.org/p.pdf",
                    source: "unpaywall",
                    status,
                    pdf_local_path: sha1.map(|_| "data/pdfs/abc123.pdf"),
                    sha1,
                    final_url: Some("https://example.org/p.pdf"),
                    error_message: None,
                    file_size_bytes: sha1.map(|_| 1024),
                })
                .await
                .unwrap();
        }

        let stats = store.pdf_download_stats(None).await.unwrap();
        assert_eq!(stats.get("downloaded"), Some(&1));
        assert_eq!(stats.get("unavailable"), Some(&1));
        assert!(store.downloaded_record_ids().await.unwrap().contains(&record_id));

        let (path, sha1) = store
            .latest_downloaded_pdf(record_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path, "data/pdfs/abc123.pdf");
        assert_eq!(sha1.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_markdown_parent_validation() {
        let store = Store::new_in_memory().await.unwrap();
        let record_id = seed_article(&store).await;
        let docx_id = store
            .insert_docx_version(record_id, Some("data/docx/x.docx"), "t", Some(10), None)
            .await
            .unwrap();

        // source_type docx with an html parent: rejected before SQL.
        let invalid = NewMarkdownVersion {
            record_id,
            docx_version_id: None,
            html_version_id: Some(docx_id),
            source_type: MarkdownSource::Docx,
            variant: MarkdownVariant::NoImages,
            md_local_path: None,
            created_datetime: "t",
            file_size_bytes: None,
            error_message: None,
        };
        assert!(matches!(
            store.insert_markdown_version(&invalid).await,
            Err(StoreError::InvalidMarkdownParents)
        ));

        // Valid docx rendition.
        let valid = NewMarkdownVersion {
            docx_version_id: Some(docx_id),
            html_version_id: None,
            ..invalid
        };
        let id = store.insert_markdown_version(&valid).await.unwrap();
        assert!(id > 0);

        let versions = store.markdown_versions_for(record_id).await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].source_type, "docx");
        assert_eq!(versions[0].variant, "no_images");
    }

    #[tokio::test]
    async fn test_failed_conversion_row_keeps_null_size() {
        let store = Store::new_in_memory().await.unwrap();
        let record_id = seed_article(&store).await;
        let docx_id = store
            .insert_docx_version(record_id, Some("data/docx/x.docx"), "t", Some(10), None)
            .await
            .unwrap();

        let failed = NewMarkdownVersion {
            record_id,
            docx_version_id: Some(docx_id),
            html_version_id: None,
            source_type: MarkdownSource::Docx,
            variant: MarkdownVariant::WithImages,
            md_local_path: None,
            created_datetime: "t",
            file_size_bytes: None,
            error_message: Some("pandoc exited with status 1"),
        };
        store.insert_markdown_version(&failed).await.unwrap();

        let versions = store.markdown_versions_for(record_id).await.unwrap();
        assert_eq!(versions[0].file_size_bytes, None);
        assert!(versions[0].error_message.is_some());
    }

    #[tokio::test]
    async fn test_html_attempts_and_stats() {
        let store = Store::new_in_memory().await.unwrap();
        let record_id = seed_article(&store).await;

        store
            .record_html_download_attempt(&NewHtmlDownload {
                record_id,
                filtering_query_id: None,
                timestamp: "t",
                url: "https://arxiv.org/html/2103.12345",
                source: "arxiv",
                status: HtmlDownloadStatus::Downloaded,
                html_local_path: Some("data/html/2103.12345.html"),
                file_size_bytes: Some(2048),
                error_message: None,
            })
            .await
            .unwrap();

        let stats = store.html_download_stats(None).await.unwrap();
        assert_eq!(stats.get("downloaded"), Some(&1));
        assert!(
            store
                .html_downloaded_record_ids()
                .await
                .unwrap()
                .contains(&record_id)
        );
    }

    #[tokio::test]
    async fn test_cascade_delete_from_article() {
        let store = Store::new_in_memory().await.unwrap();
        let record_id = seed_article(&store).await;
        store
            .insert_pdf_resolution(record_id, None, "t", &[])
            .await
            .unwrap();
        store
            .record_pdf_download_attempt(&NewPdfDownload {
                record_id,
                filtering_query_id: None,
                timestamp: "t",
                url: "",
                source: "none",
                status: DownloadStatus::NoCandidates,
                pdf_local_path: None,
                sha1: None,
                final_url: None,
                error_message: None,
                file_size_bytes: None,
            })
            .await
            .unwrap();

        sqlx::query("DELETE FROM research_articles WHERE id = ?")
            .bind(record_id)
            .execute(store.pool())
            .await
            .unwrap();

        assert!(store.resolved_record_ids().await.unwrap().is_empty());
        assert!(store.pdf_download_stats(None).await.unwrap().is_empty());
    }
}
