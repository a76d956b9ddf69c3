//! Immutable application configuration.
//!
//! The configuration is built once in `main` (or a test fixture) and injected
//! by value into every component. There is no global state and no mode
//! switching after construction: production and test runs get completely
//! separate data roots.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Default maximum accepted PDF size (50 MiB).
pub const DEFAULT_MAX_PDF_SIZE: u64 = 50 * 1024 * 1024;

/// Environment variable holding the contact email placed in every outbound
/// User-Agent (and required by Unpaywall).
pub const CONTACT_EMAIL_VAR: &str = "CURATOR_CONTACT_EMAIL";

/// Environment variable holding the optional Semantic Scholar API key.
pub const SEMANTIC_SCHOLAR_KEY_VAR: &str = "SEMANTIC_SCHOLAR_API_KEY";

/// Environment variables for the LLM filter stage.
pub const LLM_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const LLM_MODEL_VAR: &str = "OPENAI_MODEL";
pub const LLM_BASE_URL_VAR: &str = "OPENAI_BASE_URL";

/// Configuration errors. All of these are fatal at the start of the stage
/// that needs the missing value.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The contact email is required for polite API access.
    #[error("contact email not configured: set {CONTACT_EMAIL_VAR}")]
    MissingContactEmail,

    /// The LLM API key is required by the filter stage.
    #[error("LLM API key not configured: set {LLM_API_KEY_VAR}")]
    MissingLlmApiKey,

    /// The LLM model name is required by the filter stage.
    #[error("LLM model not configured: set {LLM_MODEL_VAR}")]
    MissingLlmModel,
}

/// Which data root the process operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentMode {
    /// Real data under `data/`.
    Production,
    /// Isolated data under `test_data/`.
    Test,
}

impl EnvironmentMode {
    /// Returns the mode name as used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Immutable process-wide configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    mode: EnvironmentMode,
    data_root: PathBuf,
    /// Contact email for User-Agent strings and the Unpaywall API.
    pub contact_email: Option<String>,
    /// Optional Semantic Scholar API key; the adapter is skipped without it.
    pub semantic_scholar_api_key: Option<String>,
    /// LLM credentials/model for the filter stage.
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    /// Maximum accepted PDF size in bytes.
    pub max_pdf_size: u64,
}

impl AppConfig {
    /// Creates a configuration rooted at the default directory for `mode`
    /// without consulting the environment. Used by tests.
    #[must_use]
    pub fn new(mode: EnvironmentMode) -> Self {
        let data_root = match mode {
            EnvironmentMode::Production => PathBuf::from("data"),
            EnvironmentMode::Test => PathBuf::from("test_data"),
        };
        Self {
            mode,
            data_root,
            contact_email: None,
            semantic_scholar_api_key: None,
            llm_api_key: None,
            llm_model: None,
            llm_base_url: None,
            max_pdf_size: DEFAULT_MAX_PDF_SIZE,
        }
    }

    /// Creates a configuration for `mode`, reading credentials from the
    /// process environment once.
    #[must_use]
    pub fn from_env(mode: EnvironmentMode) -> Self {
        let mut config = Self::new(mode);
        config.contact_email = non_empty_env(CONTACT_EMAIL_VAR);
        config.semantic_scholar_api_key = non_empty_env(SEMANTIC_SCHOLAR_KEY_VAR);
        config.llm_api_key = non_empty_env(LLM_API_KEY_VAR);
        config.llm_model = non_empty_env(LLM_MODEL_VAR);
        config.llm_base_url = non_empty_env(LLM_BASE_URL_VAR);
        config
    }

    /// Creates a test configuration rooted at an arbitrary directory.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let mut config = Self::new(EnvironmentMode::Test);
        config.data_root = root.into();
        config
    }

    /// Returns the active environment mode.
    #[must_use]
    pub fn mode(&self) -> EnvironmentMode {
        self.mode
    }

    /// Returns the data root directory.
    #[must_use]
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Path of the embedded SQLite database file.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_root.join("cache").join("research_articles.db")
    }

    /// Directory for downloaded PDFs.
    #[must_use]
    pub fn pdf_dir(&self) -> PathBuf {
        self.data_root.join("pdfs")
    }

    /// Directory searched for DOCX renditions.
    #[must_use]
    pub fn docx_dir(&self) -> PathBuf {
        self.data_root.join("docx")
    }

    /// Output directory for Markdown converted from DOCX.
    #[must_use]
    pub fn markdown_from_docx_dir(&self) -> PathBuf {
        self.data_root.join("markdown").join("from_docx")
    }

    /// Output directory for Markdown converted from HTML.
    #[must_use]
    pub fn markdown_from_html_dir(&self) -> PathBuf {
        self.data_root.join("markdown").join("from_html")
    }

    /// Directory for downloaded HTML fulltext pages.
    #[must_use]
    pub fn html_dir(&self) -> PathBuf {
        self.data_root.join("html")
    }

    /// Creates all data directories (and the database parent) if missing.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error if a directory cannot be created.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [
            self.data_root.join("cache"),
            self.pdf_dir(),
            self.docx_dir(),
            self.markdown_from_docx_dir(),
            self.markdown_from_html_dir(),
            self.html_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Returns the contact email, or the fatal configuration error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingContactEmail`] when unset.
    pub fn require_contact_email(&self) -> Result<&str, ConfigError> {
        self.contact_email
            .as_deref()
            .ok_or(ConfigError::MissingContactEmail)
    }

    /// User-Agent string for outbound API requests, carrying the contact
    /// email when configured.
    #[must_use]
    pub fn api_user_agent(&self) -> String {
        let base = concat!("curator/", env!("CARGO_PKG_VERSION"));
        match &self.contact_email {
            Some(email) => format!("{base} (mailto:{email})"),
            None => base.to_string(),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
