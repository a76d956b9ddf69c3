//! Typed persistence layer.
//!
//! The [`Store`] owns all access to the embedded database: every other
//! component holds transient in-memory copies keyed by surrogate id and
//! hands ownership back through these methods. Writes go through the SQLite
//! writer (WAL mode, busy timeout); readers proceed concurrently.
//!
//! Submodules group the API by entity:
//! - [`article`] / article CRUD - ingest, enrichment work list, upserts
//! - [`filtering`] - filter runs and per-record decisions
//! - [`files`] - PDF resolutions/downloads, DOCX/HTML/Markdown artifacts
//! - [`versions`] - preprint ↔ published links

mod article;
mod articles;
mod error;
mod files;
mod filtering;
mod versions;

pub use article::{ImportOutcome, NewArticle, ResearchArticle};
pub use error::{Result, StoreError};
pub use files::{
    DocxVersion, DownloadStatus, HtmlDownloadStatus, MarkdownSource, MarkdownVariant,
    MarkdownVersion, NewHtmlDownload, NewMarkdownVersion, NewPdfDownload, PdfCandidate,
    PdfDownload,
};
pub use filtering::{FilteringDecision, FilteringQuery, FilteringResult};
pub use versions::{LinkOutcome, VersionLinkingStats};

use crate::db::Database;

/// Typed facade over the embedded database.
#[derive(Debug, Clone)]
pub struct Store {
    db: Database,
}

impl Store {
    /// Wraps an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens an in-memory store for tests.
    ///
    /// # Errors
    ///
    /// Returns the database error if migrations fail.
    pub async fn new_in_memory() -> std::result::Result<Self, crate::db::DbError> {
        Ok(Self::new(Database::new_in_memory().await?))
    }

    pub(crate) fn pool(&self) -> &sqlx::SqlitePool {
        self.db.pool()
    }
}
