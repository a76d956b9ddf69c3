//! `curator enrich` - the multi-pass enrichment stage.

use anyhow::Result;
use curator::enrich::{EnrichmentOptions, EnrichmentOrchestrator};
use curator::{AppConfig, Store};

use super::StageOutcome;
use crate::cli::EnrichArgs;

pub async fn run_enrich(
    config: &AppConfig,
    store: &Store,
    args: &EnrichArgs,
) -> Result<StageOutcome> {
    let orchestrator = EnrichmentOrchestrator::from_config(store.clone(), config)?;
    let summary = orchestrator
        .run(EnrichmentOptions {
            max_passes: u32::from(args.max_passes),
            max_concurrent: usize::from(args.max_concurrent),
            retry_empty: args.retry_empty,
        })
        .await?;

    if summary.passes.is_empty() {
        println!("No research articles found to enrich.");
        return Ok(StageOutcome::Success);
    }

    for pass in &summary.passes {
        println!(
            "Pass {}: {} records ({} abstracts, {} OA, {} published versions discovered, {} failed)",
            pass.pass_number,
            pass.processed,
            pass.abstracts_found,
            pass.oa_found,
            pass.published_versions_created,
            pass.failed,
        );
    }
    println!(
        "Enrichment complete: {} passes, {} records, {} failed",
        summary.passes.len(),
        summary.total_processed(),
        summary.total_failed(),
    );
    Ok(StageOutcome::from_failed(summary.total_failed()))
}
