//! Artifact conversion: locating DOCX renditions and converting them to
//! Markdown.
//!
//! The converter binary itself sits behind [`DocxConverter`]; the bundled
//! [`PandocConverter`] shells out to pandoc. Conversion always runs twice -
//! once without and once with image extraction - and every outcome lands in
//! `markdown_versions`, failures included.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::store::{
    DocxVersion, MarkdownSource, MarkdownVariant, NewMarkdownVersion, ResearchArticle, Store,
    StoreError,
};
use crate::timestamp;

/// Conversion failures surfaced by a [`DocxConverter`].
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Filesystem error around the conversion.
    #[error("IO error during conversion: {0}")]
    Io(#[from] std::io::Error),

    /// The converter process exited unsuccessfully.
    #[error("converter exited with {status}: {stderr}")]
    ConverterFailed {
        /// Exit status description.
        status: String,
        /// Captured stderr (truncated).
        stderr: String,
    },

    /// The converter reported success but produced no output file.
    #[error("converter produced no output at {0}")]
    MissingOutput(PathBuf),
}

/// External DOCX → Markdown converter.
#[async_trait]
pub trait DocxConverter: Send + Sync {
    /// Converts `docx_path` into Markdown under `out_dir`, returning the
    /// written file's path.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError`] when the conversion fails; the caller
    /// records the failure instead of propagating it.
    async fn convert(
        &self,
        docx_path: &Path,
        out_dir: &Path,
        extract_images: bool,
    ) -> Result<PathBuf, ConvertError>;
}

/// Pandoc-backed converter (`pandoc -f docx -t gfm`).
#[derive(Debug, Clone)]
pub struct PandocConverter {
    binary: String,
}

impl PandocConverter {
    /// Uses `pandoc` from PATH.
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: "pandoc".to_string(),
        }
    }

    /// Uses an explicit binary path.
    #[must_use]
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for PandocConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocxConverter for PandocConverter {
    #[instrument(skip(self), fields(docx = %docx_path.display(), extract_images))]
    async fn convert(
        &self,
        docx_path: &Path,
        out_dir: &Path,
        extract_images: bool,
    ) -> Result<PathBuf, ConvertError> {
        tokio::fs::create_dir_all(out_dir).await?;

        let stem = docx_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let out_path = out_dir.join(format!("{stem}.md"));

        let mut command = tokio::process::Command::new(&self.binary);
        command
            .arg("-f")
            .arg("docx")
            .arg("-t")
            .arg("gfm")
            .arg("-o")
            .arg(&out_path);
        if extract_images {
            command.arg(format!("--extract-media={}", out_dir.join("media").display()));
        }
        command.arg(docx_path);

        let output = command.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr)
                .chars()
                .take(500)
                .collect();
            return Err(ConvertError::ConverterFailed {
                status: output.status.to_string(),
                stderr,
            });
        }
        if !out_path.exists() {
            return Err(ConvertError::MissingOutput(out_path));
        }
        Ok(out_path)
    }
}

/// Searches the DOCX directory for a rendition of this record.
///
/// Naming policy: the file stem is either the PDF's SHA-1 or the normalized
/// DOI with path separators flattened to underscores (matching how external
/// conversion tooling names its outputs). Comparison is case-insensitive.
#[must_use]
pub fn find_docx_for_record(
    docx_dir: &Path,
    article: &ResearchArticle,
    pdf_sha1: Option<&str>,
) -> Option<PathBuf> {
    let mut wanted_stems = Vec::new();
    if let Some(sha1) = pdf_sha1 {
        wanted_stems.push(sha1.to_lowercase());
    }
    if let Some(doi) = article.doi_norm.as_deref() {
        wanted_stems.push(doi.replace(['/', '.'], "_").to_lowercase());
    }
    if wanted_stems.is_empty() {
        return None;
    }

    let entries = std::fs::read_dir(docx_dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_docx = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"));
        if !is_docx {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if wanted_stems.iter().any(|wanted| stem.eq_ignore_ascii_case(wanted)) {
            return Some(path);
        }
    }
    None
}

/// Per-variant outcome of one conversion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantOutcome {
    pub variant: MarkdownVariant,
    pub markdown_path: Option<String>,
    pub error: Option<String>,
}

/// Orchestrates DOCX lookup and the two-variant Markdown conversion.
#[derive(Clone)]
pub struct ArtifactConverter {
    converter: Arc<dyn DocxConverter>,
    markdown_dir: PathBuf,
}

impl ArtifactConverter {
    /// Creates the orchestrator writing Markdown under `markdown_dir`
    /// (variant subdirectories keep the two outputs apart).
    #[must_use]
    pub fn new(converter: Arc<dyn DocxConverter>, markdown_dir: impl Into<PathBuf>) -> Self {
        Self {
            converter,
            markdown_dir: markdown_dir.into(),
        }
    }

    /// Looks up the DOCX rendition for a record and records the result
    /// (hit or miss) in `docx_versions`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the row cannot be written.
    #[instrument(skip(self, store, article), fields(record_id = article.id))]
    pub async fn retrieve_docx(
        &self,
        store: &Store,
        article: &ResearchArticle,
        docx_dir: &Path,
        pdf_sha1: Option<&str>,
    ) -> Result<DocxVersion, StoreError> {
        let now = timestamp::now_iso();
        let found = find_docx_for_record(docx_dir, article, pdf_sha1);

        let docx_id = match &found {
            Some(path) => {
                let size = std::fs::metadata(path).map(|m| m.len() as i64).ok();
                info!(path = %path.display(), "docx located");
                store
                    .insert_docx_version(article.id, path.to_str(), &now, size, None)
                    .await?
            }
            None => {
                debug!("docx not found");
                store
                    .insert_docx_version(article.id, None, &now, None, Some("not_found"))
                    .await?
            }
        };

        Ok(store
            .docx_version(docx_id)
            .await?
            .ok_or_else(|| StoreError::not_found("docx_version", docx_id))?)
    }

    /// Converts one located DOCX into both Markdown variants, recording a
    /// `markdown_versions` row per variant - with the error message and a
    /// NULL size when the converter fails.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when rows cannot be written. Converter
    /// failures are recorded, not raised.
    #[instrument(skip(self, store, docx), fields(record_id = docx.record_id, docx_id = docx.id))]
    pub async fn convert_to_markdown(
        &self,
        store: &Store,
        docx: &DocxVersion,
    ) -> Result<Vec<VariantOutcome>, StoreError> {
        let Some(docx_path) = docx.docx_local_path.as_deref() else {
            return Err(StoreError::not_found("docx_versions.docx_local_path", docx.id));
        };
        let docx_path = Path::new(docx_path);
        let now = timestamp::now_iso();
        let mut outcomes = Vec::with_capacity(2);

        for (variant, extract_images, subdir) in [
            (MarkdownVariant::NoImages, false, "no_images"),
            (MarkdownVariant::WithImages, true, "with_images"),
        ] {
            let out_dir = self.markdown_dir.join(subdir);
            let result = self
                .converter
                .convert(docx_path, &out_dir, extract_images)
                .await;

            let outcome = match result {
                Ok(markdown_path) => {
                    let size = std::fs::metadata(&markdown_path)
                        .map(|m| m.len() as i64)
                        .ok();
                    store
                        .insert_markdown_version(&NewMarkdownVersion {
                            record_id: docx.record_id,
                            docx_version_id: Some(docx.id),
                            html_version_id: None,
                            source_type: MarkdownSource::Docx,
                            variant,
                            md_local_path: markdown_path.to_str(),
                            created_datetime: &now,
                            file_size_bytes: size,
                            error_message: None,
                        })
                        .await?;
                    info!(variant = variant.as_str(), path = %markdown_path.display(), "markdown written");
                    VariantOutcome {
                        variant,
                        markdown_path: markdown_path.to_str().map(str::to_string),
                        error: None,
                    }
                }
                Err(convert_error) => {
                    let message = convert_error.to_string();
                    warn!(variant = variant.as_str(), error = %message, "conversion failed");
                    store
                        .insert_markdown_version(&NewMarkdownVersion {
                            record_id: docx.record_id,
                            docx_version_id: Some(docx.id),
                            html_version_id: None,
                            source_type: MarkdownSource::Docx,
                            variant,
                            md_local_path: None,
                            created_datetime: &now,
                            file_size_bytes: None,
                            error_message: Some(&message),
                        })
                        .await?;
                    VariantOutcome {
                        variant,
                        markdown_path: None,
                        error: Some(message),
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{ImportOutcome, NewArticle};

    /// Converter scripted per variant: succeeds without image extraction,
    /// fails with it (or any other combination).
    struct ScriptedConverter {
        fail_with_images: bool,
    }

    #[async_trait]
    impl DocxConverter for ScriptedConverter {
        async fn convert(
            &self,
            docx_path: &Path,
            out_dir: &Path,
            extract_images: bool,
        ) -> Result<PathBuf, ConvertError> {
            if extract_images && self.fail_with_images {
                return Err(ConvertError::ConverterFailed {
                    status: "exit status: 1".to_string(),
                    stderr: "cannot extract media".to_string(),
                });
            }
            tokio::fs::create_dir_all(out_dir).await?;
            let stem = docx_path.file_stem().unwrap().to_str().unwrap();
            let out = out_dir.join(format!("{stem}.md"));
            tokio::fs::write(&out, "# converted\n").await?;
            Ok(out)
        }
    }

    async fn seed_article(store: &Store, doi: Option<&str>) -> ResearchArticle {
        let mut new = NewArticle::new("Article", "2025-01-01T00:00:00Z");
        new.doi_norm = doi.map(str::to_string);
        let ImportOutcome::Inserted(id) = store.insert_article(&new).await.unwrap() else {
            panic!("seed failed");
        };
        store.article(id).await.unwrap().unwrap()
    }

    // ==================== DOCX Lookup Tests ====================

    #[test]
    fn test_find_docx_by_sha1_stem() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a9993e364706816aba3e25717850c26c9cd0d89d.docx");
        std::fs::write(&path, b"docx").unwrap();

        let article = crate::enrich::sources::test_support::article(None);
        let found = find_docx_for_record(
            tmp.path(),
            &article,
            Some("A9993E364706816ABA3E25717850C26C9CD0D89D"),
        );
        assert_eq!(found.unwrap(), path);
    }

    #[test]
    fn test_find_docx_by_flattened_doi() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("10_1234_abc_def.docx");
        std::fs::write(&path, b"docx").unwrap();

        let article = crate::enrich::sources::test_support::article(Some("10.1234/abc.def"));
        let found = find_docx_for_record(tmp.path(), &article, None);
        assert_eq!(found.unwrap(), path);
    }

    #[test]
    fn test_find_docx_ignores_other_extensions() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("deadbeef.pdf"), b"pdf").unwrap();

        let article = crate::enrich::sources::test_support::article(None);
        assert!(find_docx_for_record(tmp.path(), &article, Some("deadbeef")).is_none());
    }

    // ==================== Retrieval Tests ====================

    #[tokio::test]
    async fn test_retrieve_docx_records_hit_with_size() {
        let store = Store::new_in_memory().await.unwrap();
        let article = seed_article(&store, None).await;

        let docx_dir = tempfile::tempdir().unwrap();
        std::fs::write(docx_dir.path().join("cafe01.docx"), b"docx bytes here").unwrap();

        let converter = ArtifactConverter::new(
            Arc::new(ScriptedConverter {
                fail_with_images: false,
            }),
            tempfile::tempdir().unwrap().path(),
        );
        let docx = converter
            .retrieve_docx(&store, &article, docx_dir.path(), Some("cafe01"))
            .await
            .unwrap();

        assert!(docx.docx_local_path.is_some());
        assert_eq!(docx.file_size_bytes, Some(15));
        assert!(docx.error_message.is_none());
    }

    #[tokio::test]
    async fn test_retrieve_docx_records_miss() {
        let store = Store::new_in_memory().await.unwrap();
        let article = seed_article(&store, None).await;
        let docx_dir = tempfile::tempdir().unwrap();

        let converter = ArtifactConverter::new(
            Arc::new(ScriptedConverter {
                fail_with_images: false,
            }),
            tempfile::tempdir().unwrap().path(),
        );
        let docx = converter
            .retrieve_docx(&store, &article, docx_dir.path(), Some("missing"))
            .await
            .unwrap();

        assert!(docx.docx_local_path.is_none());
        assert_eq!(docx.error_message.as_deref(), Some("not_found"));
    }

    // ==================== Conversion Tests ====================

    #[tokio::test]
    async fn test_partial_conversion_records_both_variants() {
        let store = Store::new_in_memory().await.unwrap();
        let article = seed_article(&store, None).await;

        let docx_dir = tempfile::tempdir().unwrap();
        let docx_path = docx_dir.path().join("doc.docx");
        std::fs::write(&docx_path, b"docx").unwrap();
        let docx_id = store
            .insert_docx_version(article.id, docx_path.to_str(), "t", Some(4), None)
            .await
            .unwrap();
        let docx = store.docx_version(docx_id).await.unwrap().unwrap();

        let markdown_dir = tempfile::tempdir().unwrap();
        let converter = ArtifactConverter::new(
            Arc::new(ScriptedConverter {
                fail_with_images: true,
            }),
            markdown_dir.path(),
        );

        let outcomes = converter.convert_to_markdown(&store, &docx).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].markdown_path.is_some());
        assert!(outcomes[1].error.is_some());

        let versions = store.markdown_versions_for(article.id).await.unwrap();
        assert_eq!(versions.len(), 2);

        let no_images = versions.iter().find(|v| v.variant == "no_images").unwrap();
        assert_eq!(no_images.source_type, "docx");
        assert_eq!(no_images.docx_version_id, Some(docx_id));
        assert!(no_images.html_version_id.is_none());
        assert!(no_images.file_size_bytes.unwrap() > 0);
        assert!(no_images.error_message.is_none());

        let with_images = versions.iter().find(|v| v.variant == "with_images").unwrap();
        assert_eq!(with_images.docx_version_id, Some(docx_id));
        assert!(with_images.file_size_bytes.is_none());
        assert!(with_images.error_message.as_deref().unwrap().contains("exit status"));
    }

    #[tokio::test]
    async fn test_full_conversion_writes_both_files() {
        let store = Store::new_in_memory().await.unwrap();
        let article = seed_article(&store, None).await;

        let docx_dir = tempfile::tempdir().unwrap();
        let docx_path = docx_dir.path().join("doc.docx");
        std::fs::write(&docx_path, b"docx").unwrap();
        let docx_id = store
            .insert_docx_version(article.id, docx_path.to_str(), "t", Some(4), None)
            .await
            .unwrap();
        let docx = store.docx_version(docx_id).await.unwrap().unwrap();

        let markdown_dir = tempfile::tempdir().unwrap();
        let converter = ArtifactConverter::new(
            Arc::new(ScriptedConverter {
                fail_with_images: false,
            }),
            markdown_dir.path(),
        );

        let outcomes = converter.convert_to_markdown(&store, &docx).await.unwrap();
        assert!(outcomes.iter().all(|o| o.error.is_none()));
        assert!(markdown_dir.path().join("no_images").join("doc.md").exists());
        assert!(markdown_dir.path().join("with_images").join("doc.md").exists());
    }
}
