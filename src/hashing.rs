//! Content hashing and DOI normalization.
//!
//! Downloaded PDFs are content-addressed by SHA-1, and DOIs are stored in a
//! canonical lowercase form stripped of the resolver host so that the same
//! work imported from different spreadsheets dedupes to one row.

use sha1::{Digest, Sha1};

/// URL prefixes stripped from raw DOI strings during normalization.
const DOI_URL_PREFIXES: [&str; 4] = [
    "https://doi.org/",
    "https://dx.doi.org/",
    "http://doi.org/",
    "http://dx.doi.org/",
];

/// Normalizes a raw DOI string into its canonical form.
///
/// Lowercases, trims, and strips any `doi.org` / `dx.doi.org` URL prefix.
/// Returns `None` for empty input (including input that is empty after
/// stripping), so callers can treat "no DOI" and "blank cell" identically.
#[must_use]
pub fn normalize_doi(raw: &str) -> Option<String> {
    let mut doi = raw.trim().to_lowercase();
    if doi.is_empty() {
        return None;
    }
    for prefix in DOI_URL_PREFIXES {
        if let Some(stripped) = doi.strip_prefix(prefix) {
            doi = stripped.to_string();
            break;
        }
    }
    if doi.is_empty() { None } else { Some(doi) }
}

/// Returns the lowercase hex SHA-1 digest of `bytes`.
#[must_use]
pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== normalize_doi Tests ====================

    #[test]
    fn test_normalize_doi_plain() {
        assert_eq!(
            normalize_doi("10.1234/ABC.def"),
            Some("10.1234/abc.def".to_string())
        );
    }

    #[test]
    fn test_normalize_doi_strips_https_host() {
        assert_eq!(
            normalize_doi("https://doi.org/10.1234/abc"),
            Some("10.1234/abc".to_string())
        );
    }

    #[test]
    fn test_normalize_doi_strips_dx_host() {
        assert_eq!(
            normalize_doi("http://dx.doi.org/10.1234/abc"),
            Some("10.1234/abc".to_string())
        );
    }

    #[test]
    fn test_normalize_doi_trims_whitespace() {
        assert_eq!(
            normalize_doi("  10.1234/abc  "),
            Some("10.1234/abc".to_string())
        );
    }

    #[test]
    fn test_normalize_doi_empty_returns_none() {
        assert_eq!(normalize_doi(""), None);
        assert_eq!(normalize_doi("   "), None);
    }

    #[test]
    fn test_normalize_doi_bare_prefix_returns_none() {
        assert_eq!(normalize_doi("https://doi.org/"), None);
    }

    // ==================== sha1_hex Tests ====================

    #[test]
    fn test_sha1_hex_known_vector() {
        // FIPS 180-1 test vector for "abc"
        assert_eq!(
            sha1_hex(b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_sha1_hex_empty_input() {
        assert_eq!(
            sha1_hex(b""),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }
}
