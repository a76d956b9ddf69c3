//! PDF candidate resolution.
//!
//! Builds the ranked candidate list for one record from data already on the
//! record and in its stored provenance - no I/O happens here. Ranking:
//! repository/preprint URLs first, then the Unpaywall OA location, then
//! publisher-advertised PDFs.

use std::collections::HashSet;

use url::Url;

use crate::enrich::sources as adapters;
use crate::store::{PdfCandidate, ResearchArticle};

/// Collects and ranks candidate PDF URLs for a record.
///
/// Duplicates across ranks collapse on the canonical URL form (first
/// occurrence, i.e. highest rank, wins).
#[must_use]
pub fn resolve_pdf_candidates(article: &ResearchArticle) -> Vec<PdfCandidate> {
    let provenance = article.provenance_map();
    let mut candidates = Vec::new();

    // Rank 1: repositories and preprint servers.
    if let Some(arxiv_id) = article.arxiv_id.as_deref().filter(|id| !id.is_empty()) {
        candidates.push(PdfCandidate::new(
            format!("https://arxiv.org/pdf/{arxiv_id}.pdf"),
            "arxiv",
        ));
    }
    if let Some(entry) = provenance.get("epmc") {
        for url in adapters::pdf_fulltext_urls_from_payload(&entry.payload) {
            candidates.push(PdfCandidate::new(url, "epmc"));
        }
    }
    if let Some(url) = article.manual_url_repository.as_deref().filter(|u| !u.is_empty()) {
        candidates.push(PdfCandidate::new(url, "manual-repository"));
    }

    // Rank 2: Unpaywall's best OA location.
    if article.is_oa == Some(true) {
        if let Some(url) = article.oa_pdf_url.as_deref().filter(|u| !u.is_empty()) {
            candidates.push(PdfCandidate {
                url: url.to_string(),
                source: "unpaywall".to_string(),
                license: article.license.clone(),
            });
        }
    }

    // Rank 3: publisher-advertised PDFs.
    if let Some(entry) = provenance.get("crossref") {
        if let Some(url) = adapters::pdf_link_from_payload(&entry.payload) {
            candidates.push(PdfCandidate::new(url, "crossref"));
        }
    }
    if let Some(entry) = provenance.get("s2") {
        if let Some(url) = adapters::open_access_pdf_from_payload(&entry.payload) {
            candidates.push(PdfCandidate::new(url, "s2"));
        }
    }
    if let Some(url) = article.manual_url_publisher.as_deref().filter(|u| !u.is_empty()) {
        candidates.push(PdfCandidate::new(url, "manual-publisher"));
    }

    dedup_by_canonical_url(candidates)
}

/// Collapses candidates that point at the same resource.
///
/// Canonical form: lowercased scheme and host, path with any trailing slash
/// stripped, query preserved. First occurrence wins, so higher ranks shadow
/// lower ones.
fn dedup_by_canonical_url(candidates: Vec<PdfCandidate>) -> Vec<PdfCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(canonical_url(&candidate.url)))
        .collect()
}

fn canonical_url(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return raw.trim().to_lowercase();
    };
    let host = parsed.host_str().unwrap_or_default().to_lowercase();
    let path = parsed.path().trim_end_matches('/');
    match parsed.query() {
        Some(query) => format!("{}://{}{}?{}", parsed.scheme(), host, path, query),
        None => format!("{}://{}{}", parsed.scheme(), host, path),
    }
}
