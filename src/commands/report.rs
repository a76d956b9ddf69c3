//! Reporting commands: provenance display and aggregate statistics.

use anyhow::{Result, bail};
use curator::Store;

use super::StageOutcome;

/// Pretty-prints the provenance map of one record.
pub async fn run_provenance(store: &Store, record_id: i64) -> Result<StageOutcome> {
    let Some(article) = store.article(record_id).await? else {
        bail!("record {record_id} not found");
    };

    let provenance = article.provenance_map();
    if provenance.is_empty() {
        println!("No provenance recorded for record {record_id}.");
        return Ok(StageOutcome::Success);
    }

    for (source, entry) in &provenance {
        println!("=== {source} ===");
        if let Some(url) = &entry.url {
            println!("  url: {url}");
        }
        if let Some(retrieved_at) = &entry.retrieved_at {
            println!("  retrieved_at: {retrieved_at}");
        }
        if let Some(status) = entry.status {
            println!("  status: {status}");
        }
        println!("{}", serde_json::to_string_pretty(&entry.payload)?);
        println!();
    }
    Ok(StageOutcome::Success)
}

/// Prints preprint ↔ published linking statistics.
pub async fn run_version_stats(store: &Store) -> Result<StageOutcome> {
    let stats = store.version_linking_stats().await?;

    println!("\n=== Preprint to Published Version Linking Statistics ===\n");
    println!("Total preprints: {}", stats.total_preprints);
    println!(
        "Preprints with published version: {}",
        stats.preprints_with_published_version
    );
    println!(
        "Published articles with preprint version: {}",
        stats.published_with_preprint_version
    );

    if !stats.by_preprint_source.is_empty() {
        println!("\nPreprints by source:");
        for (source, count) in &stats.by_preprint_source {
            println!("  - {source}: {count}");
        }
    }
    if !stats.by_discovery_source.is_empty() {
        println!("\nVersion links discovered by:");
        for (source, count) in &stats.by_discovery_source {
            println!("  - {source}: {count}");
        }
    }
    Ok(StageOutcome::Success)
}

/// Prints PDF and HTML download status counts.
pub async fn run_download_stats(store: &Store, query_id: Option<i64>) -> Result<StageOutcome> {
    let pdf_stats = store.pdf_download_stats(query_id).await?;
    let html_stats = store.html_download_stats(query_id).await?;

    println!("\nPDF download attempts:");
    if pdf_stats.is_empty() {
        println!("  (none)");
    }
    for (status, count) in &pdf_stats {
        println!("  {status}: {count}");
    }

    println!("\nHTML download attempts:");
    if html_stats.is_empty() {
        println!("  (none)");
    }
    for (status, count) in &html_stats {
        println!("  {status}: {count}");
    }
    Ok(StageOutcome::Success)
}
