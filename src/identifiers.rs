//! Identifier parsing and preprint-platform detection.
//!
//! A record counts as a preprint when its DOI or arXiv id falls in a known
//! preprint namespace, or when its venue title names a preprint server.
//! Detection runs at import time and again during enrichment (records created
//! mid-pipeline skip ingest).

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// arXiv identifier embedded in a DOI, e.g. `10.48550/arxiv.2103.12345` or
/// legacy `arxiv:2103.12345v2`.
#[allow(clippy::expect_used)]
static ARXIV_ID_IN_DOI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)arxiv[:.](\d{4}\.\d{4,5})(v\d+)?").expect("static regex must compile")
});

/// DOI prefix shared by bioRxiv and medRxiv (Cold Spring Harbor Laboratory).
const BIORXIV_MEDRXIV_DOI_PREFIX: &str = "10.1101/";

/// DOI prefix of Preprints.org.
const PREPRINTS_ORG_DOI_PREFIX: &str = "10.20944/";

/// DOI prefix of arXiv-minted DOIs.
const ARXIV_DOI_PREFIX: &str = "10.48550/";

/// Preprint platform a record belongs to. The string forms are used as the
/// `preprint_source` tag and as provenance keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreprintPlatform {
    Arxiv,
    Biorxiv,
    Medrxiv,
    PreprintsOrg,
}

impl PreprintPlatform {
    /// Platform tag as persisted in `preprint_source`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Arxiv => "arxiv",
            Self::Biorxiv => "biorxiv",
            Self::Medrxiv => "medrxiv",
            Self::PreprintsOrg => "preprints",
        }
    }

    /// Parses a persisted platform tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "arxiv" => Some(Self::Arxiv),
            "biorxiv" => Some(Self::Biorxiv),
            "medrxiv" => Some(Self::Medrxiv),
            "preprints" => Some(Self::PreprintsOrg),
            _ => None,
        }
    }
}

impl fmt::Display for PreprintPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Extracts a bare arXiv id (`2103.12345`) from a DOI, if present.
#[must_use]
pub fn arxiv_id_from_doi(doi_norm: &str) -> Option<String> {
    ARXIV_ID_IN_DOI
        .captures(doi_norm)
        .map(|caps| caps[1].to_string())
}

/// Rewrites legacy `arxiv:2103.12345` DOIs into the registered
/// `10.48550/arxiv.<id>` namespace.
#[must_use]
pub fn canonicalize_arxiv_doi(doi_norm: &str) -> String {
    match doi_norm.strip_prefix("arxiv:") {
        Some(id) => format!("{ARXIV_DOI_PREFIX}arxiv.{id}"),
        None => doi_norm.to_string(),
    }
}

/// Detects the preprint platform from identifiers and the venue title.
///
/// Order of evidence: DOI namespace, then arXiv id, then source-title
/// substrings. bioRxiv and medRxiv share the `10.1101` namespace; the venue
/// title disambiguates, defaulting to bioRxiv when it cannot.
#[must_use]
pub fn detect_preprint_platform(
    doi_norm: Option<&str>,
    arxiv_id: Option<&str>,
    source_title: Option<&str>,
) -> Option<PreprintPlatform> {
    let title_lower = source_title.map(|t| t.trim().to_lowercase());

    if let Some(doi) = doi_norm {
        if doi.starts_with(ARXIV_DOI_PREFIX) || doi.starts_with("arxiv:") {
            return Some(PreprintPlatform::Arxiv);
        }
        if doi.starts_with(PREPRINTS_ORG_DOI_PREFIX) {
            return Some(PreprintPlatform::PreprintsOrg);
        }
        if doi.starts_with(BIORXIV_MEDRXIV_DOI_PREFIX) {
            let is_medrxiv = title_lower
                .as_deref()
                .is_some_and(|t| t.contains("medrxiv") || t.contains("med rxiv"));
            return Some(if is_medrxiv {
                PreprintPlatform::Medrxiv
            } else {
                PreprintPlatform::Biorxiv
            });
        }
    }

    if arxiv_id.is_some_and(|id| !id.trim().is_empty()) {
        return Some(PreprintPlatform::Arxiv);
    }

    let title = title_lower?;
    if title.contains("arxiv") || title.contains("ar xiv") {
        return Some(PreprintPlatform::Arxiv);
    }
    if title.contains("medrxiv") || title.contains("med rxiv") {
        return Some(PreprintPlatform::Medrxiv);
    }
    if title.contains("biorxiv") || title.contains("bio rxiv") {
        return Some(PreprintPlatform::Biorxiv);
    }
    if title.contains("preprints") {
        return Some(PreprintPlatform::PreprintsOrg);
    }
    None
}
