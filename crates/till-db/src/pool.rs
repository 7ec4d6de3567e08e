//! # Connection Pool
//!
//! One [`Database`] per process. Every repository handle borrows its pool,
//! and settlements take a single connection for their whole transaction.
//!
//! ```text
//!   DbConfig::new(path) ──► Database::new ──► pragmas ──► migrations
//!                                  │
//!            ┌─────────────────────┼──────────────────────┐
//!            ▼                     ▼                      ▼
//!     db.begin() (tx_*)     db.bills() lookups     outbox worker polls
//! ```
//!
//! Journal mode is WAL so lookups and the outbox worker read while a
//! settlement writes. `busy_timeout` covers the short window where two
//! writers meet.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::{
    BillRepository, CashRepository, DocumentRepository, EstimateRepository, HeldCartRepository,
    JournalRepository, OutboxRepository, PartyRepository, ProductRepository, PurchaseRepository,
    WorkingCartRepository,
};

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    /// Private to one connection. See [`DbConfig::in_memory`].
    Memory,
}

/// Pool settings.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/till/till.db").max_connections(3);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub location: StoreLocation,
    /// The register and the outbox worker each hold one at most.
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long `acquire` waits for a free connection.
    pub connect_timeout: Duration,
    /// How long SQLite waits on a locked database before `SQLITE_BUSY`.
    pub busy_timeout: Duration,
    pub run_migrations: bool,
}

impl DbConfig {
    /// File-backed store. The file is created on first connect.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            location: StoreLocation::File(path.into()),
            max_connections: 4,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Test store.
    ///
    /// Pinned to one connection because each `:memory:` connection is a
    /// separate database. Code holding a transaction must not touch the pool.
    pub fn in_memory() -> Self {
        DbConfig {
            location: StoreLocation::Memory,
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(1),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Path of the backing file, `None` for memory stores.
    pub fn database_path(&self) -> Option<&Path> {
        match &self.location {
            StoreLocation::File(path) => Some(path),
            StoreLocation::Memory => None,
        }
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let base = match &self.location {
            StoreLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            // WAL does not apply to memory databases
            StoreLocation::Memory => SqliteConnectOptions::new().in_memory(true),
        };

        base.synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
    }
}

/// Shared handle to the store. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        match config.database_path() {
            Some(path) => info!(path = %path.display(), "Opening database"),
            None => info!("Opening in-memory database"),
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections.min(config.max_connections))
            .acquire_timeout(config.connect_timeout)
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(max_connections = config.max_connections, "Pool ready");

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Applies pending migrations. Safe on every startup.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a transaction for the `tx_*` repository functions.
    pub async fn begin(&self) -> DbResult<Transaction<'static, Sqlite>> {
        self.pool.begin().await.map_err(DbError::from)
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn bills(&self) -> BillRepository {
        BillRepository::new(self.pool.clone())
    }

    /// Customers, suppliers and their ledgers.
    pub fn parties(&self) -> PartyRepository {
        PartyRepository::new(self.pool.clone())
    }

    pub fn cash(&self) -> CashRepository {
        CashRepository::new(self.pool.clone())
    }

    pub fn journal(&self) -> JournalRepository {
        JournalRepository::new(self.pool.clone())
    }

    pub fn purchases(&self) -> PurchaseRepository {
        PurchaseRepository::new(self.pool.clone())
    }

    pub fn estimates(&self) -> EstimateRepository {
        EstimateRepository::new(self.pool.clone())
    }

    pub fn documents(&self) -> DocumentRepository {
        DocumentRepository::new(self.pool.clone())
    }

    pub fn held_carts(&self) -> HeldCartRepository {
        HeldCartRepository::new(self.pool.clone())
    }

    pub fn working_carts(&self) -> WorkingCartRepository {
        WorkingCartRepository::new(self.pool.clone())
    }

    pub fn outbox(&self) -> OutboxRepository {
        OutboxRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections, then closes the pool.
    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}
