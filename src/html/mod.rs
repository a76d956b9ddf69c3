//! HTML fulltext retrieval for preprints.
//!
//! Preprint servers publish browsable fulltext pages whose URLs derive from
//! the DOI (or arXiv id). Matched preprints get their page downloaded and
//! recorded in `html_versions`; converted Markdown later references these
//! rows with `source_type = 'html'`.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::hashing::sha1_hex;
use crate::net::{HttpClient, RateLimiterSet};
use crate::pdfs::policy_for;
use crate::store::{HtmlDownloadStatus, NewHtmlDownload, ResearchArticle, Store, StoreError};

/// arXiv id (with optional version) inside a DOI.
#[allow(clippy::expect_used)]
static ARXIV_ID_WITH_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)arxiv[:.](\d{4}\.\d{4,5})(v\d+)?").expect("static regex must compile")
});

/// Preprints.org manuscript id and version inside a DOI,
/// e.g. `10.20944/preprints202311.1954.v2` → (`202311.1954`, `v2`).
#[allow(clippy::expect_used)]
static PREPRINTS_ID_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)10\.20944/preprints(\d+\.\d+)\.(v\d+)").expect("static regex must compile")
});

/// Builds the fulltext HTML URL for a preprint record.
///
/// Returns `None` for non-preprints, records without the needed identifier,
/// and platforms without a derivable page URL.
#[must_use]
pub fn fulltext_html_url(article: &ResearchArticle) -> Option<String> {
    if !article.is_preprint {
        return None;
    }
    let source = article.preprint_source.as_deref()?;

    match source {
        "arxiv" => {
            let id = article.arxiv_id.clone().or_else(|| {
                let doi = article.doi_norm.as_deref()?;
                let caps = ARXIV_ID_WITH_VERSION.captures(doi)?;
                let version = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                Some(format!("{}{}", &caps[1], version))
            })?;
            Some(format!("https://arxiv.org/html/{id}"))
        }
        "biorxiv" => {
            let doi = article.doi_norm.as_deref()?;
            Some(format!("https://www.biorxiv.org/content/{doi}.full"))
        }
        "medrxiv" => {
            let doi = article.doi_norm.as_deref()?;
            Some(format!("https://www.medrxiv.org/content/{doi}.full-text"))
        }
        "preprints" => {
            let doi = article.doi_norm.as_deref()?;
            let caps = PREPRINTS_ID_VERSION.captures(doi)?;
            Some(format!(
                "https://www.preprints.org/manuscript/{}/{}",
                &caps[1], &caps[2]
            ))
        }
        _ => None,
    }
}

/// Result of one record's HTML fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlDownloadResult {
    pub status: HtmlDownloadStatus,
}

/// Downloads preprint fulltext pages under the source rate limits.
#[derive(Clone)]
pub struct HtmlDownloader {
    http: HttpClient,
    limiters: Arc<RateLimiterSet>,
    dest_dir: PathBuf,
}

impl HtmlDownloader {
    /// Creates a downloader writing into `dest_dir`.
    #[must_use]
    pub fn new(
        http: HttpClient,
        limiters: Arc<RateLimiterSet>,
        dest_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            http,
            limiters,
            dest_dir: dest_dir.into(),
        }
    }

    /// Fetches and records the fulltext page for one preprint. Every
    /// outcome - including an underivable URL - yields an `html_versions`
    /// row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the attempt row cannot be written.
    #[instrument(skip(self, article, store), fields(record_id = article.id))]
    pub async fn download_for_record(
        &self,
        article: &ResearchArticle,
        filtering_query_id: Option<i64>,
        store: &Store,
        timestamp: &str,
    ) -> Result<HtmlDownloadResult, StoreError> {
        let source = article.preprint_source.as_deref().unwrap_or("unknown");

        let Some(url) = fulltext_html_url(article) else {
            debug!("no fulltext URL derivable");
            store
                .record_html_download_attempt(&NewHtmlDownload {
                    record_id: article.id,
                    filtering_query_id,
                    timestamp,
                    url: "",
                    source,
                    status: HtmlDownloadStatus::NoUrl,
                    html_local_path: None,
                    file_size_bytes: None,
                    error_message: Some("cannot construct fulltext URL for this record"),
                })
                .await?;
            return Ok(HtmlDownloadResult {
                status: HtmlDownloadStatus::NoUrl,
            });
        };

        self.download_from_url(article, &url, filtering_query_id, store, timestamp)
            .await
    }

    /// Fetches a known fulltext URL for a record and records the attempt.
    /// Split from [`download_for_record`](Self::download_for_record) so the
    /// fetch path is drivable without real platform hosts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the attempt row cannot be written.
    pub async fn download_from_url(
        &self,
        article: &ResearchArticle,
        url: &str,
        filtering_query_id: Option<i64>,
        store: &Store,
        timestamp: &str,
    ) -> Result<HtmlDownloadResult, StoreError> {
        let source = article.preprint_source.as_deref().unwrap_or("unknown");

        self.limiters.acquire(source).await;
        let policy = policy_for(source, url);
        let outcome = self.fetch_page(&policy.url, policy.headers).await;

        let (status, path, size, error) = match outcome {
            Ok((path, size)) => {
                info!(url = %url, size, "html fulltext downloaded");
                (HtmlDownloadStatus::Downloaded, Some(path), Some(size), None)
            }
            Err(message) => {
                warn!(url = %url, error = %message, "html fulltext failed");
                (HtmlDownloadStatus::Error, None, None, Some(message))
            }
        };

        store
            .record_html_download_attempt(&NewHtmlDownload {
                record_id: article.id,
                filtering_query_id,
                timestamp,
                url,
                source,
                status,
                html_local_path: path.as_deref(),
                file_size_bytes: size,
                error_message: error.as_deref(),
            })
            .await?;

        Ok(HtmlDownloadResult { status })
    }

    async fn fetch_page(
        &self,
        url: &str,
        headers: reqwest::header::HeaderMap,
    ) -> Result<(String, i64), String> {
        let response = self
            .http
            .get_with_retry(url, headers)
            .await
            .map_err(|error| error.to_string())?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(format!("HTTP {status}"));
        }

        let body = response.bytes().await.map_err(|error| error.to_string())?;
        let sha1 = sha1_hex(&body);
        let path = self.dest_dir.join(format!("{sha1}.html"));

        tokio::fs::create_dir_all(&self.dest_dir)
            .await
            .map_err(|error| error.to_string())?;
        tokio::fs::write(&path, &body)
            .await
            .map_err(|error| error.to_string())?;

        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|error| error.to_string())?
            .len() as i64;

        path.to_str()
            .map(|p| (p.to_string(), size))
            .ok_or_else(|| "destination path is not valid UTF-8".to_string())
    }
}
