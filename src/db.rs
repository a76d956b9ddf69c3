//! Database connection and schema management.
//!
//! SQLite connectivity with:
//! - Connection pool management
//! - WAL mode for concurrent reads
//! - Automatic migration execution, plus additive column migration for
//!   databases created by earlier releases
//!
//! # Example
//!
//! ```no_run
//! use curator::db::Database;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(Path::new("data/cache/research_articles.db")).await?;
//! // Use db.pool() for queries...
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, instrument};

/// Default maximum number of connections in the pool.
/// Kept low for SQLite since it uses file-level locking.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in milliseconds. Connections wait this long for the
/// writer lock before returning SQLITE_BUSY.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Columns added after the initial schema shipped. Databases created by the
/// base migrations already have them; databases from earlier releases get
/// them via `ALTER TABLE` on startup (default NULL, existing rows preserved).
const ADDITIVE_COLUMNS: &[(&str, &str, &str)] = &[
    ("research_articles", "abstract_no_retrieval_reason", "TEXT"),
    ("pdf_downloads", "file_size_bytes", "INTEGER"),
    ("docx_versions", "file_size_bytes", "INTEGER"),
    ("html_versions", "file_size_bytes", "INTEGER"),
    ("markdown_versions", "file_size_bytes", "INTEGER"),
    ("markdown_versions", "html_version_id", "INTEGER"),
    ("markdown_versions", "source_type", "TEXT"),
];

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to connect to or query the database.
    #[error("failed to connect to database: {0}")]
    Connection(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Database connection wrapper with connection pool.
///
/// Handles SQLite connection pooling, WAL mode configuration,
/// and automatic migration execution.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Creates a new database connection to the specified path.
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Enable WAL mode and foreign-key enforcement
    /// 3. Run pending migrations and the additive column migration
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;

        // WAL allows concurrent readers alongside the single writer.
        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query(&format!("PRAGMA busy_timeout={BUSY_TIMEOUT_MS}"))
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        ensure_additive_columns(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates an in-memory database for testing.
    ///
    /// The database exists only for the lifetime of the connection. WAL mode
    /// is not enabled as it provides no benefit in memory.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        ensure_additive_columns(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Gracefully closes all connections in the pool.
    #[instrument(skip(self))]
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Issues `ALTER TABLE ... ADD COLUMN` for any known additive column the
/// database does not have yet. Idempotent: a second run adds nothing.
///
/// CHECK constraints are only applied at table-creation time; for tables that
/// predate a constraint the application enforces the invariant on writes.
async fn ensure_additive_columns(pool: &SqlitePool) -> Result<(), DbError> {
    for (table, column, sql_type) in ADDITIVE_COLUMNS {
        if !table_has_column(pool, table, column).await? {
            debug!(table, column, "adding missing column");
            sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column} {sql_type}"))
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

async fn table_has_column(pool: &SqlitePool, table: &str, column: &str) -> Result<bool, DbError> {
    let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .any(|row| row.get::<String, _>("name") == column))
}
