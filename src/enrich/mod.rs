//! Metadata enrichment: scholarly-API adapters, the abstract fallback chain,
//! preprint handling with published-version discovery, open-access lookup,
//! and the multi-pass orchestrator that drives it all.

mod abstracts;
mod oa;
mod orchestrator;
mod preprint;
pub mod sources;

pub use abstracts::{AbstractPipeline, AttemptReport, compile_failure_reasons};
pub use oa::{OaEnricher, OaReport};
pub use orchestrator::{
    EnrichSetupError, EnrichmentOptions, EnrichmentOrchestrator, EnrichmentSummary, PassSummary,
};
pub use preprint::{PreprintEnricher, PreprintReport, PublishedDiscovery};
