//! CLI entry point for the curator tool.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use curator::config::{AppConfig, EnvironmentMode};
use curator::db::Database;
use curator::store::Store;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;

use cli::{Cli, Command, DocxCommand, StatsCommand};
use commands::StageOutcome;

/// Process exit codes, as documented in the CLI help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    Success,
    Partial,
    Failure,
}

impl ProcessExit {
    const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Partial => 1,
            Self::Failure => 2,
        }
    }
}

impl From<StageOutcome> for ProcessExit {
    fn from(outcome: StageOutcome) -> Self {
        match outcome {
            StageOutcome::Success => Self::Success,
            StageOutcome::Partial => Self::Partial,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(outcome) => ExitCode::from(outcome.code()),
        Err(error) => {
            eprintln!("{error:#}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "curator=debug"
    } else if quiet {
        "curator=error"
    } else {
        "curator=info"
    };
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<ProcessExit> {
    let mode = if cli.test {
        EnvironmentMode::Test
    } else {
        EnvironmentMode::Production
    };
    let config = AppConfig::from_env(mode);
    config.ensure_directories()?;

    tracing::info!(
        mode = config.mode().as_str(),
        db = %config.db_path().display(),
        "curator started"
    );

    let db = Database::new(&config.db_path()).await?;
    let store = Store::new(db);

    let outcome = match &cli.command {
        Command::Import { path } => commands::run_import(&store, path).await?,
        Command::Enrich(args) => commands::run_enrich(&config, &store, args).await?,
        Command::Filter(args) => commands::run_filter(&config, &store, args).await?,
        Command::Pdfs(args) => commands::run_pdfs(&config, &store, args).await?,
        Command::Htmls(args) => commands::run_htmls(&config, &store, args).await?,
        Command::Docx { command } => match command {
            DocxCommand::Retrieve { record_id } => {
                commands::run_docx_retrieve(&config, &store, *record_id).await?
            }
            DocxCommand::Convert { docx_version_id } => {
                commands::run_docx_convert(&config, &store, *docx_version_id).await?
            }
        },
        Command::Provenance { record_id } => commands::run_provenance(&store, *record_id).await?,
        Command::Stats { command } => match command {
            StatsCommand::Versions => commands::run_version_stats(&store).await?,
            StatsCommand::Downloads { query_id } => {
                commands::run_download_stats(&store, *query_id).await?
            }
        },
    };

    Ok(outcome.into())
}
