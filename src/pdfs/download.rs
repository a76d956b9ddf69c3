//! The PDF downloader.
//!
//! Walks a record's candidate list in rank order, applying the source policy
//! to each attempt, validating content, and persisting every attempt -
//! winners and losers - as audit trail. Downloaded files are content-
//! addressed as `dest_dir/<sha1>.pdf`, so re-downloading identical bytes is
//! a no-op on disk.
//!
//! This module never raises to its caller: every failure maps to a status.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::Url;

use super::policy::policy_for;
use crate::hashing::sha1_hex;
use crate::net::{HttpClient, RateLimiterSet};
use crate::store::{DownloadStatus, NewPdfDownload, PdfCandidate, Store, StoreError};

/// Outcome of one candidate fetch.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub status: DownloadStatus,
    pub path: Option<PathBuf>,
    pub sha1: Option<String>,
    /// URL after redirects (including any cache-busting rewrite).
    pub final_url: Option<String>,
    /// Size of the file as written to disk.
    pub file_size_bytes: Option<i64>,
    pub error: Option<String>,
}

impl DownloadOutcome {
    fn failed(status: DownloadStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            path: None,
            sha1: None,
            final_url: None,
            file_size_bytes: None,
            error: Some(error.into()),
        }
    }
}

/// Result of processing one record's candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordDownloadResult {
    /// Whether any candidate produced a PDF.
    pub downloaded: bool,
    /// Number of attempts made (0 means a synthetic no-candidates row).
    pub attempts: usize,
}

/// Streams candidate URLs with source-aware policies and validation.
#[derive(Clone)]
pub struct PdfDownloader {
    http: HttpClient,
    limiters: Arc<RateLimiterSet>,
    dest_dir: PathBuf,
    max_pdf_size: u64,
}

impl PdfDownloader {
    /// Creates a downloader writing into `dest_dir`.
    #[must_use]
    pub fn new(
        http: HttpClient,
        limiters: Arc<RateLimiterSet>,
        dest_dir: impl Into<PathBuf>,
        max_pdf_size: u64,
    ) -> Self {
        Self {
            http,
            limiters,
            dest_dir: dest_dir.into(),
            max_pdf_size,
        }
    }

    /// Tries candidates in rank order until one succeeds, recording every
    /// attempt. An empty candidate list is recorded as a single synthetic
    /// `no_candidates` row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the attempt rows cannot be written;
    /// download failures are data, not errors.
    #[instrument(skip(self, candidates, store), fields(record_id, candidates = candidates.len()))]
    pub async fn download_for_record(
        &self,
        record_id: i64,
        filtering_query_id: Option<i64>,
        candidates: &[PdfCandidate],
        store: &Store,
        timestamp: &str,
    ) -> Result<RecordDownloadResult, StoreError> {
        if candidates.is_empty() {
            store
                .record_pdf_download_attempt(&NewPdfDownload {
                    record_id,
                    filtering_query_id,
                    timestamp,
                    url: "",
                    source: "none",
                    status: DownloadStatus::NoCandidates,
                    pdf_local_path: None,
                    sha1: None,
                    final_url: None,
                    error_message: Some("no PDF candidates found"),
                    file_size_bytes: None,
                })
                .await?;
            return Ok(RecordDownloadResult {
                downloaded: false,
                attempts: 0,
            });
        }

        let mut attempts = 0;
        for candidate in candidates {
            attempts += 1;
            let outcome = self.fetch_candidate(candidate).await;

            store
                .record_pdf_download_attempt(&NewPdfDownload {
                    record_id,
                    filtering_query_id,
                    timestamp,
                    // The original candidate URL is stored; the transformed
                    // URL is visible through final_url.
                    url: &candidate.url,
                    source: &candidate.source,
                    status: outcome.status,
                    pdf_local_path: outcome.path.as_deref().and_then(Path::to_str),
                    sha1: outcome.sha1.as_deref(),
                    final_url: outcome.final_url.as_deref(),
                    error_message: outcome.error.as_deref(),
                    file_size_bytes: outcome.file_size_bytes,
                })
                .await?;

            if outcome.status == DownloadStatus::Downloaded {
                info!(
                    record_id,
                    source = %candidate.source,
                    sha1 = outcome.sha1.as_deref().unwrap_or("-"),
                    "pdf downloaded"
                );
                return Ok(RecordDownloadResult {
                    downloaded: true,
                    attempts,
                });
            }
            debug!(
                record_id,
                source = %candidate.source,
                status = %outcome.status,
                "candidate did not yield a pdf"
            );
        }

        Ok(RecordDownloadResult {
            downloaded: false,
            attempts,
        })
    }

    /// One GET for one candidate: policy applied, content validated, bytes
    /// hashed and persisted. Never returns an error.
    #[instrument(skip(self, candidate), fields(source = %candidate.source))]
    pub async fn fetch_candidate(&self, candidate: &PdfCandidate) -> DownloadOutcome {
        // Pre-flight: reject empty or scheme-less URLs before any I/O.
        if candidate.url.trim().is_empty() {
            return DownloadOutcome::failed(DownloadStatus::Error, "candidate has no URL");
        }
        if Url::parse(&candidate.url).is_err() {
            return DownloadOutcome::failed(
                DownloadStatus::Error,
                format!("candidate URL is not absolute: {}", candidate.url),
            );
        }

        let policy = policy_for(&candidate.source, &candidate.url);
        if let Some(delay) = policy.pre_sleep {
            tokio::time::sleep(delay).await;
        }
        self.limiters.acquire(&candidate.source).await;

        let response = match self.http.get_with_retry(&policy.url, policy.headers).await {
            Ok(response) => response,
            Err(error) => {
                warn!(error = %error, "candidate fetch failed");
                return DownloadOutcome::failed(DownloadStatus::Error, error.to_string());
            }
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        if status != 200 {
            return DownloadOutcome {
                final_url: Some(final_url),
                ..DownloadOutcome::failed(DownloadStatus::Unavailable, format!("HTTP {status}"))
            };
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("application/pdf") {
            return DownloadOutcome {
                final_url: Some(final_url),
                ..DownloadOutcome::failed(
                    DownloadStatus::Unavailable,
                    format!("wrong content type: {content_type}"),
                )
            };
        }

        // Header-declared size first, so oversized bodies are never pulled.
        if let Some(declared) = response.content_length() {
            if declared > self.max_pdf_size {
                return DownloadOutcome {
                    final_url: Some(final_url),
                    ..DownloadOutcome::failed(
                        DownloadStatus::TooLarge,
                        format!("declared size {declared} exceeds limit"),
                    )
                };
            }
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(error) => {
                return DownloadOutcome::failed(DownloadStatus::Error, error.to_string());
            }
        };
        if bytes.len() as u64 > self.max_pdf_size {
            return DownloadOutcome {
                final_url: Some(final_url),
                ..DownloadOutcome::failed(
                    DownloadStatus::TooLarge,
                    format!("body size {} exceeds limit", bytes.len()),
                )
            };
        }

        let sha1 = sha1_hex(&bytes);
        let path = self.dest_dir.join(format!("{sha1}.pdf"));
        if let Err(error) = tokio::fs::create_dir_all(&self.dest_dir).await {
            return DownloadOutcome::failed(DownloadStatus::Error, error.to_string());
        }
        // Content-addressed path: overwriting with identical bytes is a no-op.
        if let Err(error) = tokio::fs::write(&path, &bytes).await {
            return DownloadOutcome::failed(DownloadStatus::Error, error.to_string());
        }

        // The recorded size is what landed on disk, not Content-Length.
        let file_size_bytes = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata.len() as i64,
            Err(error) => {
                return DownloadOutcome::failed(DownloadStatus::Error, error.to_string());
            }
        };

        DownloadOutcome {
            status: DownloadStatus::Downloaded,
            path: Some(path),
            sha1: Some(sha1),
            final_url: Some(final_url),
            file_size_bytes: Some(file_size_bytes),
            error: None,
        }
    }
}
