//! # Settlement Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Settlement Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Fatal (user)   │  │   Wrapped       │  │   Background            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  NoOpenCash-    │  │  Core (cart,    │  │  SyncFailed             │ │
//! │  │    Session      │  │   validation)   │  │  InvalidPayload         │ │
//! │  │  BillNotFound   │  │  Db (any write) │  │                         │ │
//! │  │  PartyNotFound  │  │                 │  │  Logged by the outbox   │ │
//! │  │  CreditTender-  │  │                 │  │  worker, never returned │ │
//! │  │   WithoutCust.  │  │                 │  │  to the cashier         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any error returned from a settlement leaves the database untouched: the
//! transaction is dropped without commit.

use thiserror::Error;
use till_core::{CoreError, PartyKind, ValidationError};
use till_db::DbError;

/// Result type alias for settlement operations.
pub type SettleResult<T> = Result<T, SettleError>;

#[derive(Debug, Error)]
pub enum SettleError {
    // =========================================================================
    // Fatal settlement errors
    // =========================================================================
    /// Cash was tendered but the drawer has no open session.
    #[error("no active cash session, open the register first")]
    NoOpenCashSession,

    /// A session is already open; close it before opening another.
    #[error("cash session {0} is already open")]
    SessionAlreadyOpen(i64),

    /// The session exists but is not open.
    #[error("cash session {0} is not open")]
    SessionNotOpen(i64),

    #[error("bill not found: {0}")]
    BillNotFound(String),

    #[error("{kind:?} not found: {id}")]
    PartyNotFound { kind: PartyKind, id: String },

    /// Store credit needs a customer to owe the amount.
    #[error("a credit tender requires a customer on the sale")]
    CreditTenderWithoutCustomer,

    // =========================================================================
    // Wrapped errors
    // =========================================================================
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),

    // =========================================================================
    // Background errors
    // =========================================================================
    /// The external sync target rejected or could not take a sale.
    #[error("sync push failed: {0}")]
    SyncFailed(String),

    /// An outbox row carried a payload its handler could not read.
    #[error("invalid outbox payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    // =========================================================================
    // Configuration
    // =========================================================================
    #[error("failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ValidationError> for SettleError {
    fn from(err: ValidationError) -> Self {
        SettleError::Core(CoreError::Validation(err))
    }
}

impl From<sqlx::Error> for SettleError {
    fn from(err: sqlx::Error) -> Self {
        SettleError::Db(err.into())
    }
}

impl From<std::io::Error> for SettleError {
    fn from(err: std::io::Error) -> Self {
        SettleError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SettleError {
    fn from(err: toml::de::Error) -> Self {
        SettleError::ConfigLoadFailed(err.to_string())
    }
}

impl SettleError {
    /// Maps a repository `NotFound` on a party lookup to [`SettleError::PartyNotFound`].
    pub(crate) fn party(kind: PartyKind, id: &str) -> impl FnOnce(DbError) -> SettleError + '_ {
        move |err| match err {
            DbError::NotFound { .. } => SettleError::PartyNotFound {
                kind,
                id: id.to_string(),
            },
            other => SettleError::Db(other),
        }
    }

    /// Whether the cashier can fix this and retry (as opposed to a fault).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SettleError::NoOpenCashSession
                | SettleError::SessionAlreadyOpen(_)
                | SettleError::SessionNotOpen(_)
                | SettleError::BillNotFound(_)
                | SettleError::PartyNotFound { .. }
                | SettleError::CreditTenderWithoutCustomer
                | SettleError::Core(_)
        )
    }
}
