//! CLI command handlers.
//!
//! Each handler drives one pipeline stage end to end and prints its summary.
//! Handlers return a [`StageOutcome`] so `main` can map partial failures to
//! the documented exit codes.

mod docx;
mod enrich;
mod filter;
mod htmls;
mod import;
mod pdfs;
mod report;

pub use docx::{run_docx_convert, run_docx_retrieve};
pub use enrich::run_enrich;
pub use filter::run_filter;
pub use htmls::run_htmls;
pub use import::run_import;
pub use pdfs::run_pdfs;
pub use report::{run_download_stats, run_provenance, run_version_stats};

/// How a stage ended, for process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Everything the stage attempted succeeded.
    Success,
    /// The stage completed but some rows failed.
    Partial,
}

impl StageOutcome {
    /// Collapses a failure count into an outcome.
    #[must_use]
    pub fn from_failed(failed: usize) -> Self {
        if failed == 0 { Self::Success } else { Self::Partial }
    }
}
