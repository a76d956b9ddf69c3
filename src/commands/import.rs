//! `curator import` - CSV ingest with DOI deduplication.

use std::path::Path;

use anyhow::Result;
use curator::Store;
use curator::ingest;

use super::StageOutcome;

pub async fn run_import(store: &Store, path: &Path) -> Result<StageOutcome> {
    let rows = ingest::read_csv(path)?;
    let summary = ingest::import_rows(store, &rows).await?;

    println!(
        "Imported {} research articles from {} (skipped {} duplicates, rejected {})",
        summary.imported,
        path.display(),
        summary.skipped_duplicates,
        summary.rejected,
    );
    Ok(StageOutcome::from_failed(summary.rejected))
}
