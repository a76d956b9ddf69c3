//! Error types for store operations.

use thiserror::Error;

/// Errors surfaced by the typed store API.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON (de)serialization of a persisted column failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A row referenced by id does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Table/entity name.
        entity: &'static str,
        /// Row id looked up.
        id: i64,
    },

    /// A markdown version must reference exactly one of its DOCX or HTML
    /// parent. Enforced here for databases whose table predates the CHECK.
    #[error("markdown version must reference exactly one of docx_version_id / html_version_id")]
    InvalidMarkdownParents,

    /// A version link cannot relate a record to itself.
    #[error("article version link cannot relate record {0} to itself")]
    SelfLink(i64),
}

impl StoreError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// True when the underlying error is a UNIQUE constraint violation.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db_err)) => {
                db_err.kind() == sqlx::error::ErrorKind::UniqueViolation
            }
            _ => false,
        }
    }
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
