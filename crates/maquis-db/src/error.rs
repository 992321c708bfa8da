//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Constraint kind, transient or not             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EngineError (maquis-engine) ← CONFLICT / NOT_FOUND / TRANSIENT        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Client shows the message                                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - ID doesn't exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Invitation code already held by another bar
    /// - Second open drawer for the same cashier in the same bar
    /// - User already a member of the bar
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Order item pointing at a product that does not exist
    /// - Row pointing at a bar that does not exist
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (negative stock, bad status text, ...).
    #[error("Check constraint failed: {message}")]
    CheckViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Another connection holds the write lock.
    ///
    /// ## When This Occurs
    /// - `SQLITE_BUSY` / `SQLITE_LOCKED` under concurrent writers
    #[error("Database is busy: {0}")]
    Busy(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// I/O failure talking to the database file.
    #[error("Database I/O error: {0}")]
    Io(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }

    /// Failures worth retrying as-is: lock contention, pool exhaustion, I/O.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Busy(_) | DbError::PoolExhausted | DbError::Io(_)
        )
    }
}

/// SQLite primary result codes for lock contention.
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → constraint kind, or Busy on lock contention
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::Io             → DbError::Io
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if db_err.is_unique_violation() {
                    // "UNIQUE constraint failed: <table>.<column>[, <table>.<column>]"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if db_err.is_check_violation() {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else if is_lock_contention(db_err.code().as_deref(), msg) {
                    DbError::Busy(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(io_err) => DbError::Io(io_err.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

fn is_lock_contention(code: Option<&str>, message: &str) -> bool {
    // Extended codes (e.g. 517 SQLITE_BUSY_SNAPSHOT) keep the primary code in
    // the low byte.
    let primary = code
        .and_then(|c| c.parse::<u32>().ok())
        .map(|c| (c & 0xff).to_string());

    matches!(primary.as_deref(), Some(SQLITE_BUSY) | Some(SQLITE_LOCKED))
        || message.contains("database is locked")
        || message.contains("database table is locked")
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
