//! `curator htmls` - fulltext HTML retrieval for matched preprints.

use std::sync::Arc;

use anyhow::Result;
use curator::html::HtmlDownloader;
use curator::net::{HttpClient, RateLimiterSet};
use curator::{AppConfig, Store, timestamp};
use tokio::sync::Semaphore;
use tracing::error;

use super::StageOutcome;
use crate::cli::HtmlsArgs;

pub async fn run_htmls(
    config: &AppConfig,
    store: &Store,
    args: &HtmlsArgs,
) -> Result<StageOutcome> {
    let run_timestamp = timestamp::now_iso();

    println!("\nFetching matched records from filtering query {}...", args.query_id);
    let matched = store.matched_articles(args.query_id).await?;
    if matched.is_empty() {
        println!("No matched records found for this filtering query.");
        return Ok(StageOutcome::Success);
    }

    let preprints: Vec<_> = matched.iter().filter(|a| a.is_preprint).cloned().collect();
    println!("  Preprints: {} records", preprints.len());
    println!("  Non-preprints (skipped): {}", matched.len() - preprints.len());
    if preprints.is_empty() {
        println!("No preprint records found for HTML download.");
        return Ok(StageOutcome::Success);
    }

    let already = store.html_downloaded_record_ids().await?;
    let preprint_count = preprints.len();
    let pending: Vec<_> = preprints
        .into_iter()
        .filter(|article| !already.contains(&article.id))
        .collect();
    println!("  Already downloaded: {}", preprint_count - pending.len());
    println!("  Need download: {}", pending.len());

    let downloader = HtmlDownloader::new(
        HttpClient::new(&config.api_user_agent())?,
        Arc::new(RateLimiterSet::with_defaults()),
        config.html_dir(),
    );

    let semaphore = Arc::new(Semaphore::new(usize::from(args.max_concurrent).max(1)));
    let mut handles = Vec::with_capacity(pending.len());
    for article in pending {
        let store = store.clone();
        let downloader = downloader.clone();
        let semaphore = Arc::clone(&semaphore);
        let timestamp = run_timestamp.clone();
        let query_id = args.query_id;

        handles.push(tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return Err(curator::store::StoreError::not_found("semaphore", 0));
            };
            downloader
                .download_for_record(&article, Some(query_id), &store, &timestamp)
                .await
        }));
    }

    let mut failed = 0usize;
    for handle in handles {
        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(store_error)) => {
                error!(error = %store_error, "html download bookkeeping failed");
                failed += 1;
            }
            Err(join_error) => {
                error!(error = %join_error, "html download task panicked");
                failed += 1;
            }
        }
    }

    let stats = store.html_download_stats(Some(args.query_id)).await?;
    println!("\nHTML Download Results:");
    for (status, count) in &stats {
        println!("  {status}: {count}");
    }
    println!("\nHTML files saved to: {}", config.html_dir().display());

    let errors = stats.get("error").copied().unwrap_or(0) as usize;
    Ok(StageOutcome::from_failed(failed + errors))
}
