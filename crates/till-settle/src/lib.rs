//! # till-settle: Settlement Engine for Till POS
//!
//! Composes the till-core math and the till-db repositories into the
//! operations a register performs: finalize a sale, edit it, receive goods,
//! take payments, run the cash drawer.
//!
//! ## Module Organization
//! ```text
//! till_settle/
//! ├── lib.rs           ◄─── You are here (exports)
//! ├── engine.rs        ◄─── SettlementEngine: one transaction per settlement
//! ├── sequence.rs      ◄─── BILL/PO/EST-YYYYMMDD-NNNN numbering
//! ├── stock.rs         ◄─── Signed stock deltas
//! ├── ledger.rs        ◄─── Party running-balance ledgers
//! ├── cash.rs          ◄─── Cash session lifecycle and drawer movements
//! ├── accounting.rs    ◄─── Journal vouchers (idempotent, via outbox)
//! ├── outbox.rs        ◄─── Background worker + SyncSink
//! ├── events.rs        ◄─── Broadcast channel for committed settlements
//! ├── cart_session.rs  ◄─── Working cart with write-through CartStore
//! ├── config.rs        ◄─── TOML + env configuration
//! ├── telemetry.rs     ◄─── tracing subscriber setup
//! └── error.rs         ◄─── SettleError
//! ```
//!
//! ## Wiring
//! ```rust,ignore
//! let config = SettleConfig::load_or_default(None);
//! let db = Database::new(config.db_config()?).await?;
//!
//! let (worker, handle) = OutboxWorker::new(db.clone(), Arc::new(LogSink), config.outbox.clone());
//! tokio::spawn(worker.run());
//!
//! let engine = SettlementEngine::new(db)
//!     .with_outbox(handle)
//!     .with_loyalty(config.store.loyalty_enabled);
//!
//! let number = engine.finalize_sale(&cart, &tenders, &SaleOptions::default()).await?;
//! ```

pub mod accounting;
pub mod cart_session;
pub mod cash;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod outbox;
pub mod sequence;
pub mod stock;
pub mod telemetry;

pub use accounting::{AccountingPoster, PurchaseVoucherInput, SaleVoucherInput};
pub use cart_session::{CartSession, CartStore, MemoryCartStore, SqliteCartStore};
pub use cash::{CashSessionRecorder, SessionClose};
pub use config::SettleConfig;
pub use engine::SettlementEngine;
pub use error::{SettleError, SettleResult};
pub use events::{EventBus, SaleEvent};
pub use ledger::{LedgerPoster, Posting};
pub use outbox::{LogSink, OutboxHandle, OutboxWorker, SaleSyncRef, SyncSink};
pub use sequence::SequenceGenerator;
pub use stock::StockAdjuster;
pub use telemetry::init_tracing;
