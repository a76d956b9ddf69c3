//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Curate scholarly literature: ingest, enrich, filter, fetch, convert.
///
/// Every stage persists into one embedded database, so stages can be re-run
/// and resumed safely.
#[derive(Parser, Debug)]
#[command(name = "curator")]
#[command(author, version, about)]
#[command(
    after_help = "Exit codes:\n  0 = stage succeeded\n  1 = stage completed with failures\n  2 = fatal error"
)]
pub struct Cli {
    /// Use the isolated test environment (test_data/ instead of data/).
    #[arg(long, global = true)]
    pub test: bool,

    /// Enable verbose (DEBUG) logging.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-error output.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Pipeline stages and reporting commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a CSV of article references with DOI deduplication.
    Import {
        /// Path to the input CSV.
        path: PathBuf,
    },

    /// Enrich eligible records with abstracts, preprint links and OA status.
    Enrich(EnrichArgs),

    /// Filter the corpus against a natural-language relevance query.
    Filter(FilterArgs),

    /// Resolve and download OA PDFs for a filter run's matched records.
    Pdfs(PdfsArgs),

    /// Download fulltext HTML pages for matched preprint records.
    Htmls(HtmlsArgs),

    /// DOCX lookup and DOCX→Markdown conversion.
    Docx {
        #[command(subcommand)]
        command: DocxCommand,
    },

    /// Show provenance for one record.
    Provenance {
        /// Record id.
        record_id: i64,
    },

    /// Aggregate statistics.
    Stats {
        #[command(subcommand)]
        command: StatsCommand,
    },
}

/// Arguments for `curator enrich`.
#[derive(ClapArgs, Debug, Clone)]
pub struct EnrichArgs {
    /// Maximum records enriched concurrently.
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub max_concurrent: u8,

    /// Maximum passes over the work list (published versions discovered in
    /// pass N are enriched in pass N+1).
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_passes: u8,

    /// Leave records that yielded no data eligible for a later run.
    #[arg(long)]
    pub retry_empty: bool,
}

/// Arguments for `curator filter`.
#[derive(ClapArgs, Debug, Clone)]
pub struct FilterArgs {
    /// Inclusion criteria (natural language).
    #[arg(short, long)]
    pub query: String,

    /// Exclusion criteria (natural language).
    #[arg(long, default_value = "")]
    pub exclude: String,

    /// Maximum concurrent model calls.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub max_concurrent: u8,
}

/// Arguments for `curator pdfs`.
#[derive(ClapArgs, Debug, Clone)]
pub struct PdfsArgs {
    /// Filtering query whose matched records get their PDFs fetched.
    #[arg(long = "query-id")]
    pub query_id: i64,

    /// Destination directory (defaults to the configured PDF directory).
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Maximum concurrent downloads.
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub max_concurrent: u8,
}

/// Arguments for `curator htmls`.
#[derive(ClapArgs, Debug, Clone)]
pub struct HtmlsArgs {
    /// Filtering query whose matched preprints get their pages fetched.
    #[arg(long = "query-id")]
    pub query_id: i64,

    /// Maximum concurrent downloads.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub max_concurrent: u8,
}

/// DOCX stage commands.
#[derive(Subcommand, Debug)]
pub enum DocxCommand {
    /// Locate DOCX renditions for downloaded PDFs.
    Retrieve {
        /// Restrict to one record; omit to process every record with a
        /// downloaded PDF and no DOCX yet.
        #[arg(long)]
        record_id: Option<i64>,
    },

    /// Convert located DOCX files to both Markdown variants.
    Convert {
        /// Restrict to one docx_versions row; omit to process every located
        /// DOCX.
        #[arg(long)]
        docx_version_id: Option<i64>,
    },
}

/// Statistics subcommands.
#[derive(Subcommand, Debug)]
pub enum StatsCommand {
    /// Preprint ↔ published version linking statistics.
    Versions,

    /// PDF/HTML download status counts.
    Downloads {
        /// Restrict to one filtering query.
        #[arg(long = "query-id")]
        query_id: Option<i64>,
    },
}
