//! # Database Errors
//!
//! [`DbError`] classifies what went wrong in SQLite so the engine can tell
//! a lost race from a broken invariant.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sqlx::Error                                                            │
//! │     ├── constraint (UNIQUE / FOREIGN KEY / CHECK)  → *Violation         │
//! │     ├── SQLITE_BUSY / SQLITE_LOCKED                → Conflict           │
//! │     ├── pool timed out                             → PoolExhausted      │
//! │     └── anything else                              → QueryFailed etc.   │
//! │                                                                         │
//! │  Guarded UPDATEs that match no row also return Conflict.               │
//! │  EngineError retries Conflict once before reporting it.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::error::{DatabaseError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// ## When This Occurs
    /// - A second online shop
    /// - A second inventory row for the same shop + item
    /// - A second open cart for the same customer + shop
    /// - A second customer for the same user id
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK constraint, e.g. stock going negative.
    #[error("Check constraint failed: {message}")]
    CheckViolation { message: String },

    /// A concurrent writer got there first.
    ///
    /// ## When This Occurs
    /// - SQLITE_BUSY / SQLITE_LOCKED while another transaction writes
    /// - A guarded UPDATE matched no row because the guard no longer holds
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Every pooled connection stayed busy past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        DbError::Conflict(message.into())
    }

    /// True when retrying the whole unit of work may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict(_) | DbError::PoolExhausted)
    }

    fn from_database(err: &dyn DatabaseError) -> Self {
        let message = err.message().to_string();
        match err.kind() {
            ErrorKind::UniqueViolation => DbError::UniqueViolation {
                field: constrained_columns(&message),
                value: "unknown".to_string(),
            },
            ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
            ErrorKind::CheckViolation => DbError::CheckViolation { message },
            _ if is_busy_code(err.code().as_deref()) || message.contains("database is locked") => {
                DbError::Conflict(message)
            }
            _ => DbError::QueryFailed(message),
        }
    }
}

/// `"UNIQUE constraint failed: shops.location_kind"` → `"shops.location_kind"`.
fn constrained_columns(message: &str) -> String {
    message
        .split_once(": ")
        .map(|(_, cols)| cols.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// SQLite primary result codes that mean "someone else holds the lock".
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

fn is_busy_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        // extended codes carry the primary code in the low byte
        .map(|c| matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
        .unwrap_or(false)
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => DbError::from_database(db_err.as_ref()),
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
