//! `curator filter` - the LLM relevance filter stage.

use std::sync::Arc;

use anyhow::{Context, Result};
use curator::config::ConfigError;
use curator::filter::{FilterExecutor, FilterRequest, OpenAiClient};
use curator::{AppConfig, Store};

use super::StageOutcome;
use crate::cli::FilterArgs;

pub async fn run_filter(
    config: &AppConfig,
    store: &Store,
    args: &FilterArgs,
) -> Result<StageOutcome> {
    let api_key = config
        .llm_api_key
        .clone()
        .ok_or(ConfigError::MissingLlmApiKey)?;
    let model = config
        .llm_model
        .clone()
        .ok_or(ConfigError::MissingLlmModel)?;

    let client = match &config.llm_base_url {
        Some(base_url) => OpenAiClient::with_base_url(api_key, base_url.clone()),
        None => OpenAiClient::new(api_key),
    }
    .context("failed to build LLM client")?;

    let executor = FilterExecutor::new(store.clone(), Arc::new(client));
    let summary = executor
        .run(&FilterRequest {
            query: args.query.clone(),
            exclude: args.exclude.clone(),
            model,
            max_concurrent: usize::from(args.max_concurrent),
        })
        .await?;

    println!("Filtering completed:");
    println!("  Total research articles processed: {}", summary.total);
    println!("  Matched articles: {}", summary.matched);
    println!("  Failed articles (errors): {}", summary.failed);
    if summary.warnings > 0 {
        println!("  Warning articles (missing explanation): {}", summary.warnings);
    }
    println!("  Filtering query ID: {}", summary.filtering_query_id);
    println!("\nResults stored in database: {}", config.db_path().display());

    Ok(StageOutcome::from_failed(summary.failed))
}
