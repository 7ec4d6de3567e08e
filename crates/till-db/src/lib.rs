//! # till-db: Database Layer for Till POS
//!
//! SQLite storage for the settlement engine, accessed through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till POS Data Flow                               │
//! │                                                                         │
//! │  SettlementEngine::finalize_sale                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ BillRepo      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ PartyRepo     │    │ 001_init.sql │  │   │
//! │  │   │ begin() → tx  │    │ CashRepo ...  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/till.db                                           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transactions
//!
//! Repository functions prefixed with `tx_` take a `&mut SqliteConnection`
//! and run on whatever the caller hands them, usually an open transaction
//! from [`Database::begin`]. Methods without the prefix use the pool.
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per aggregate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("till.db")).await?;
//!
//! let mut tx = db.begin().await?;
//! ProductRepository::tx_adjust_stock(&mut tx, &product_id, -qty).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, StoreLocation};

pub use repository::{
    BillRepository, CashRepository, DocumentRepository, EstimateRepository, HeldCart,
    HeldCartRepository, JournalLineRow, JournalRepository, NewBill, NewBillLine, NewLedgerEntry,
    OutboxRepository, PartyRepository, ProductRepository, PurchaseLineRow, PurchaseRepository,
    WorkingCartRepository,
};
