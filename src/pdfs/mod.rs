//! Open-access PDF resolution and download.
//!
//! [`resolve_pdf_candidates`] builds the ranked candidate list from what
//! enrichment already learned; [`PdfDownloader`] walks it with source-aware
//! request policies and persists every attempt.

mod download;
mod policy;
mod resolve;

pub use download::{DownloadOutcome, PdfDownloader, RecordDownloadResult};
pub use policy::{BROWSER_USER_AGENT, RequestPolicy, policy_for};
pub use resolve::resolve_pdf_candidates;
