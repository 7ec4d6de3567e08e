//! # Database Error Types
//!
//! ## Constraint Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sqlx::Error                         DbError                            │
//! │  ───────────                         ───────                            │
//! │  Database(kind = UniqueViolation) ─► UniqueViolation { constraint }     │
//! │     bills.number                       duplicate document number        │
//! │     products.sku                       duplicate SKU                    │
//! │     idx_one_open_session               second OPEN drawer               │
//! │  Database(kind = ForeignKey…)     ─► ForeignKeyViolation                │
//! │  Database(kind = Check…)          ─► CheckViolation                     │
//! │  Database(other)                  ─► Query                              │
//! │  PoolTimedOut                     ─► PoolExhausted                      │
//! │  PoolClosed / Io / Tls            ─► ConnectionFailed                   │
//! │  anything else                    ─► Internal                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Row-level absence is not an error at this layer: lookups return `Option`,
//! and writes that touch zero rows return [`DbError::NotFound`] themselves.

use sqlx::error::ErrorKind;
use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// `constraint` is SQLite's `table.column` list or index name.
    #[error("duplicate value for {constraint}")]
    UniqueViolation { constraint: String },

    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// A CHECK in the schema rejected the row (e.g. negative counted cash).
    #[error("check constraint failed: {0}")]
    CheckViolation(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection pool exhausted")]
    PoolExhausted,

    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// A JSON column (cart lines, outbox payload) did not encode or decode.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        constraint: message
                            .strip_prefix("UNIQUE constraint failed: ")
                            .unwrap_or(&message)
                            .to_string(),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation(message),
                    ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                        DbError::CheckViolation(message)
                    }
                    _ => DbError::Query(message),
                }
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DbError::ConnectionFailed(err.to_string())
            }
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}
