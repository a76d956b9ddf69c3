//! `curator pdfs` - PDF resolution and download for a filter run.
//!
//! Phase 1 resolves candidates for matched records that have no snapshot
//! yet. Phase 2 walks candidates for every matched record; files are
//! content-addressed, so a re-run re-verifies against the live source while
//! leaving identical bytes on disk untouched.

use std::sync::Arc;

use anyhow::Result;
use curator::net::{HttpClient, RateLimiterSet};
use curator::pdfs::{PdfDownloader, resolve_pdf_candidates};
use curator::store::PdfCandidate;
use curator::{AppConfig, Store, timestamp};
use tokio::sync::Semaphore;
use tracing::error;

use super::StageOutcome;
use crate::cli::PdfsArgs;

pub async fn run_pdfs(config: &AppConfig, store: &Store, args: &PdfsArgs) -> Result<StageOutcome> {
    let dest = args.dest.clone().unwrap_or_else(|| config.pdf_dir());
    let run_timestamp = timestamp::now_iso();

    println!("\nFetching matched records from filtering query {}...", args.query_id);
    let matched = store.matched_articles(args.query_id).await?;
    if matched.is_empty() {
        println!("No matched records found for this filtering query.");
        return Ok(StageOutcome::Success);
    }
    println!("Found {} matched records to process.", matched.len());
    println!("Destination: {}", dest.display());

    // Phase 1: resolve candidates for records without a snapshot.
    let resolved_ids = store.resolved_record_ids().await?;
    let unresolved: Vec<_> = matched
        .iter()
        .filter(|article| !resolved_ids.contains(&article.id))
        .collect();
    println!("  Already resolved: {} records", matched.len() - unresolved.len());
    println!("  Need resolution: {} records", unresolved.len());

    let mut with_candidates = 0usize;
    let mut without_candidates = 0usize;
    for article in &unresolved {
        let candidates = resolve_pdf_candidates(article);
        store
            .insert_pdf_resolution(article.id, Some(args.query_id), &run_timestamp, &candidates)
            .await?;
        if candidates.is_empty() {
            without_candidates += 1;
        } else {
            with_candidates += 1;
        }
    }
    if !unresolved.is_empty() {
        println!("  Resolved with candidates: {with_candidates}");
        println!("  No candidates found: {without_candidates}");
    }

    // Phase 2: attempt downloads for every matched record.
    let downloader = PdfDownloader::new(
        HttpClient::new(&config.api_user_agent())?,
        Arc::new(RateLimiterSet::with_defaults()),
        &dest,
        config.max_pdf_size,
    );

    let semaphore = Arc::new(Semaphore::new(usize::from(args.max_concurrent).max(1)));
    let mut handles = Vec::with_capacity(matched.len());
    for article in matched {
        let store = store.clone();
        let downloader = downloader.clone();
        let semaphore = Arc::clone(&semaphore);
        let timestamp = run_timestamp.clone();
        let query_id = args.query_id;

        handles.push(tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return Err(curator::store::StoreError::not_found("semaphore", 0));
            };
            let candidates: Vec<PdfCandidate> = store
                .latest_candidates(article.id)
                .await?
                .unwrap_or_default();
            downloader
                .download_for_record(article.id, Some(query_id), &candidates, &store, &timestamp)
                .await
        }));
    }

    let mut failed = 0usize;
    for handle in handles {
        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(store_error)) => {
                error!(error = %store_error, "pdf download bookkeeping failed");
                failed += 1;
            }
            Err(join_error) => {
                error!(error = %join_error, "pdf download task panicked");
                failed += 1;
            }
        }
    }

    let stats = store.pdf_download_stats(Some(args.query_id)).await?;
    println!("\nPDF Download Results:");
    for (status, count) in &stats {
        println!("  {status}: {count}");
    }
    println!("\nPDFs saved to: {}", dest.display());
    println!("Results stored in database: {}", config.db_path().display());

    let errors = stats.get("error").copied().unwrap_or(0) as usize;
    Ok(StageOutcome::from_failed(failed + errors))
}
