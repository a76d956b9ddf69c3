//! Record ingest.
//!
//! Spreadsheet parsing proper lives outside the core: the pipeline consumes
//! typed [`ImportRow`]s through [`import_rows`]. A thin CSV reader is
//! provided for the CLI edge; it recognizes the known columns, ignores
//! everything else, and maps empty cells to `None`.

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::hashing::normalize_doi;
use crate::identifiers::{self, PreprintPlatform};
use crate::store::{ImportOutcome, NewArticle, Store, StoreError};
use crate::timestamp;

/// Recognized input columns. Unknown columns are ignored by the reader.
const COLUMN_TITLE: &str = "Title";
const COLUMN_PUB_DATE: &str = "Publication Date";
const COLUMN_DOI: &str = "DOI";
const COLUMN_TOTAL_CITATIONS: &str = "Total Citations";
const COLUMN_CITATIONS_PER_YEAR: &str = "Average per Year";
const COLUMN_AUTHORS: &str = "Authors";
const COLUMN_SOURCE_TITLE: &str = "Source Title";

/// Ingest errors from the CSV edge.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The file could not be read or parsed as CSV.
    #[error("failed to read input: {0}")]
    Csv(#[from] csv::Error),

    /// The required `Title` column is absent.
    #[error("input must have a 'Title' column")]
    MissingTitleColumn,
}

/// One tabular input row in typed form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportRow {
    /// Title; rows without one are rejected.
    pub title: Option<String>,
    pub publication_date: Option<String>,
    pub doi: Option<String>,
    pub total_citations: Option<i64>,
    pub citations_per_year: Option<f64>,
    pub authors: Option<String>,
    pub source_title: Option<String>,
}

/// Outcome counts of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Rows inserted.
    pub imported: usize,
    /// Rows skipped because their DOI already exists.
    pub skipped_duplicates: usize,
    /// Rows rejected (missing title).
    pub rejected: usize,
}

/// Reads the recognized columns from a CSV file.
///
/// # Errors
///
/// Returns [`IngestError`] for unreadable input or a missing `Title` column.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_csv(path: &Path) -> Result<Vec<ImportRow>, IngestError> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|header| header.trim() == name);
    let Some(title_idx) = column(COLUMN_TITLE) else {
        return Err(IngestError::MissingTitleColumn);
    };
    let pub_date_idx = column(COLUMN_PUB_DATE);
    let doi_idx = column(COLUMN_DOI);
    let citations_idx = column(COLUMN_TOTAL_CITATIONS);
    let per_year_idx = column(COLUMN_CITATIONS_PER_YEAR);
    let authors_idx = column(COLUMN_AUTHORS);
    let source_idx = column(COLUMN_SOURCE_TITLE);

    let cell = |record: &csv::StringRecord, idx: Option<usize>| -> Option<String> {
        idx.and_then(|idx| record.get(idx))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(ImportRow {
            title: cell(&record, Some(title_idx)),
            publication_date: cell(&record, pub_date_idx),
            doi: cell(&record, doi_idx),
            total_citations: cell(&record, citations_idx).and_then(|value| parse_count(&value)),
            citations_per_year: cell(&record, per_year_idx)
                .and_then(|value| value.parse::<f64>().ok()),
            authors: cell(&record, authors_idx),
            source_title: cell(&record, source_idx),
        });
    }

    debug!(rows = rows.len(), "csv read");
    Ok(rows)
}

/// Citation counts occasionally arrive as floats ("12.0"); accept both.
fn parse_count(value: &str) -> Option<i64> {
    value
        .parse::<i64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().map(|n| n as i64))
}

/// Imports rows into the store with DOI deduplication.
///
/// Duplicate DOIs are counted and skipped, not errors; rows without a title
/// are rejected. Detected preprints are tagged at import time, and legacy
/// `arxiv:`-style DOIs are rewritten into the registered namespace.
///
/// # Errors
///
/// Returns [`StoreError`] for database failures other than duplicates.
#[instrument(skip_all, fields(rows = rows.len()))]
pub async fn import_rows(store: &Store, rows: &[ImportRow]) -> Result<ImportSummary, StoreError> {
    let import_datetime = timestamp::now_iso();
    let mut summary = ImportSummary::default();

    for row in rows {
        let Some(title) = row.title.as_deref().filter(|title| !title.is_empty()) else {
            warn!("row without title rejected");
            summary.rejected += 1;
            continue;
        };

        let doi_norm = row
            .doi
            .as_deref()
            .and_then(normalize_doi)
            .map(|doi| identifiers::canonicalize_arxiv_doi(&doi));

        let mut article = NewArticle::new(title, import_datetime.clone());
        article.doi_raw = row.doi.clone();
        article.doi_norm = doi_norm;
        article.pub_date = row.publication_date.clone();
        article.total_citations = row.total_citations;
        article.citations_per_year = row.citations_per_year;
        article.authors = row.authors.clone();
        article.source_title = row.source_title.clone();

        if let Some(platform) = identifiers::detect_preprint_platform(
            article.doi_norm.as_deref(),
            None,
            article.source_title.as_deref(),
        ) {
            article.is_preprint = true;
            article.preprint_source = Some(platform.as_str().to_string());
            if platform == PreprintPlatform::Arxiv {
                article.arxiv_id = article
                    .doi_norm
                    .as_deref()
                    .and_then(identifiers::arxiv_id_from_doi);
            }
        }

        match store.insert_article(&article).await? {
            ImportOutcome::Inserted(_) => summary.imported += 1,
            ImportOutcome::SkippedDuplicate => {
                info!(
                    doi = article.doi_norm.as_deref().unwrap_or("-"),
                    title = %article.title,
                    "skipped duplicate DOI"
                );
                summary.skipped_duplicates += 1;
            }
        }
    }

    info!(
        imported = summary.imported,
        skipped = summary.skipped_duplicates,
        rejected = summary.rejected,
        "import completed"
    );
    Ok(summary)
}
