//! Source-aware request policies for PDF downloads.
//!
//! Some hosts serve PDFs to browsers but not to plain HTTP clients. Each
//! known source gets a request transform: extra headers, an optional
//! cache-busting URL rewrite, and an optional randomized pre-request sleep.
//! New sources plug in by extending the dispatch in [`policy_for`]; the
//! downloader is source-agnostic otherwise.

use std::time::Duration;

use rand::Rng;
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue,
    PRAGMA, REFERER, USER_AGENT,
};

use crate::timestamp;

/// Browser-class User-Agent used for all PDF fetches.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Upper bound of the randomized pre-request sleep for cache-busted sources.
const MAX_PRE_SLEEP: Duration = Duration::from_secs(2);

/// Concrete request shape for one download attempt.
#[derive(Debug)]
pub struct RequestPolicy {
    /// Headers for the attempt (User-Agent included).
    pub headers: HeaderMap,
    /// URL to actually fetch; differs from the candidate URL when the
    /// source needs cache busting.
    pub url: String,
    /// Randomized delay before the request is issued.
    pub pre_sleep: Option<Duration>,
}

/// Builds the request policy for a candidate.
#[must_use]
pub fn policy_for(source: &str, url: &str) -> RequestPolicy {
    let mut headers = default_headers();

    match source {
        "arxiv" => {
            // arXiv fronts its PDFs with bot detection that serves cached
            // block pages; a full browser fingerprint plus a unique query
            // parameter gets a fresh response.
            headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
            headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
            headers.insert(
                HeaderName::from_static("sec-fetch-dest"),
                HeaderValue::from_static("document"),
            );
            headers.insert(
                HeaderName::from_static("sec-fetch-mode"),
                HeaderValue::from_static("navigate"),
            );
            headers.insert(
                HeaderName::from_static("sec-fetch-site"),
                HeaderValue::from_static("same-origin"),
            );
            headers.insert(
                HeaderName::from_static("sec-ch-ua"),
                HeaderValue::from_static(r#""Chromium";v="131", "Not_A Brand";v="24""#),
            );
            headers.insert(
                HeaderName::from_static("sec-ch-ua-mobile"),
                HeaderValue::from_static("?0"),
            );
            headers.insert(
                HeaderName::from_static("sec-ch-ua-platform"),
                HeaderValue::from_static(r#""macOS""#),
            );
            headers.insert(
                CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-store, must-revalidate"),
            );
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
            headers.insert(REFERER, HeaderValue::from_static("https://arxiv.org/"));

            RequestPolicy {
                headers,
                url: append_cache_buster(url),
                pre_sleep: Some(random_pre_sleep()),
            }
        }
        "biorxiv" | "medrxiv" => {
            headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
            RequestPolicy {
                headers,
                url: url.to_string(),
                pre_sleep: None,
            }
        }
        "preprints" => {
            if let Ok(referer) = HeaderValue::from_str(&manuscript_landing_url(url)) {
                headers.insert(REFERER, referer);
            }
            RequestPolicy {
                headers,
                url: url.to_string(),
                pre_sleep: None,
            }
        }
        _ => RequestPolicy {
            headers,
            url: url.to_string(),
            pre_sleep: None,
        },
    }
}

/// Headers every PDF fetch carries.
fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/pdf,*/*;q=0.8"),
    );
    headers
}

/// Appends a `_cb=<unix millis>` query parameter so caches in front of the
/// host cannot replay a stale (blocked) response.
fn append_cache_buster(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}_cb={}", timestamp::unix_millis())
}

/// The Preprints.org manuscript landing page backing a PDF URL
/// (`.../manuscript/<id>/<version>/download` → the page without `/download`).
fn manuscript_landing_url(pdf_url: &str) -> String {
    pdf_url
        .strip_suffix("/download")
        .map_or_else(|| pdf_url.to_string(), str::to_string)
}

fn random_pre_sleep() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_PRE_SLEEP.as_millis() as u64))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn header(policy: &RequestPolicy, name: &str) -> Option<String> {
        policy
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    #[test]
    fn test_default_policy_headers() {
        let policy = policy_for("unpaywall", "https://journal.example.org/a.pdf");
        assert_eq!(header(&policy, "User-Agent").unwrap(), BROWSER_USER_AGENT);
        assert_eq!(
            header(&policy, "Accept").unwrap(),
            "application/pdf,*/*;q=0.8"
        );
        assert!(policy.pre_sleep.is_none());
        assert_eq!(policy.url, "https://journal.example.org/a.pdf");
    }

    #[test]
    fn test_arxiv_policy_cache_busts_and_fingerprints() {
        let policy = policy_for("arxiv", "https://arxiv.org/pdf/0705.2011.pdf");

        assert!(policy.url.starts_with("https://arxiv.org/pdf/0705.2011.pdf?_cb="));
        let cb_digits = policy.url.split("_cb=").nth(1).unwrap();
        assert!(!cb_digits.is_empty());
        assert!(cb_digits.chars().all(|c| c.is_ascii_digit()));

        assert_eq!(
            header(&policy, "Cache-Control").unwrap(),
            "no-cache, no-store, must-revalidate"
        );
        assert_eq!(header(&policy, "Pragma").unwrap(), "no-cache");
        assert_eq!(header(&policy, "Referer").unwrap(), "https://arxiv.org/");
        assert!(header(&policy, "User-Agent").unwrap().contains("Chrome"));
        assert!(header(&policy, "sec-ch-ua").is_some());
        assert!(header(&policy, "sec-fetch-mode").is_some());

        let sleep = policy.pre_sleep.unwrap();
        assert!(sleep <= Duration::from_secs(2));
    }

    #[test]
    fn test_arxiv_cache_buster_appends_to_existing_query() {
        let policy = policy_for("arxiv", "https://arxiv.org/pdf/0705.2011.pdf?download=1");
        assert!(policy.url.contains("?download=1&_cb="));
    }

    #[test]
    fn test_biorxiv_policy_google_referer() {
        let policy = policy_for("biorxiv", "https://www.biorxiv.org/x.full.pdf");
        assert_eq!(
            header(&policy, "Referer").unwrap(),
            "https://www.google.com/"
        );
        assert_eq!(policy.url, "https://www.biorxiv.org/x.full.pdf");
    }

    #[test]
    fn test_medrxiv_uses_same_referer_policy() {
        let policy = policy_for("medrxiv", "https://www.medrxiv.org/x.full.pdf");
        assert_eq!(
            header(&policy, "Referer").unwrap(),
            "https://www.google.com/"
        );
    }

    #[test]
    fn test_preprints_policy_derives_landing_referer() {
        let policy = policy_for(
            "preprints",
            "https://www.preprints.org/manuscript/202401.0001/v1/download",
        );
        assert_eq!(
            header(&policy, "Referer").unwrap(),
            "https://www.preprints.org/manuscript/202401.0001/v1"
        );
    }

    #[test]
    fn test_unknown_source_gets_no_referer() {
        let policy = policy_for("some-new-repo", "https://repo.example.org/a.pdf");
        assert!(header(&policy, "Referer").is_none());
    }
}
