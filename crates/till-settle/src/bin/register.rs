//! # Headless Register
//!
//! Opens the configured database, starts the outbox worker, makes sure a cash
//! session is open and rings up one demo sale from the seeded catalogue.
//!
//! ## Usage
//! ```bash
//! cargo run -p till-db --bin seed -- --db ./till_dev.db
//! TILL_DB_PATH=./till_dev.db cargo run -p till-settle --bin register
//! ```
//!
//! ## Startup Sequence
//! 1. Initialize tracing
//! 2. Load `till.toml` + environment overrides
//! 3. Connect to database & run migrations
//! 4. Spawn the outbox worker
//! 5. Restore the working cart, settle it, clear it
//! 6. Drain the outbox once and shut the worker down

use std::sync::Arc;
use tracing::{info, warn};

use till_core::{Money, Quantity, SaleOptions, Tender};
use till_db::Database;
use till_settle::{
    init_tracing, CartSession, LogSink, OutboxWorker, SettleConfig, SettlementEngine,
    SqliteCartStore,
};

const DEMO_SKU: &str = "SOAP-100";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = SettleConfig::load_or_default(None);
    info!(store = %config.store.code, "Starting register");

    let db = Database::new(config.db_config()?).await?;

    let (worker, outbox) = OutboxWorker::new(db.clone(), Arc::new(LogSink), config.outbox.clone());
    let worker_task = tokio::spawn(worker.run());

    let engine = SettlementEngine::new(db.clone())
        .with_outbox(outbox.clone())
        .with_loyalty(config.store.loyalty_enabled);

    let cash = engine.cash();
    if cash.open_session().await?.is_none() {
        cash.start_session(Money::from_cents(200_000)).await?;
    }

    let store = Arc::new(SqliteCartStore::new(&db, config.store.code.clone()));
    let session = CartSession::restore(store).await?;

    if session.snapshot().await.is_empty() {
        match db.products().get_by_sku(DEMO_SKU).await? {
            Some(product) => {
                session.add(&product, Quantity::from_units(2)).await?;
            }
            None => {
                warn!(sku = DEMO_SKU, "Demo product missing, run the seed binary first");
                outbox.shutdown().await?;
                worker_task.await?;
                db.close().await;
                return Ok(());
            }
        }
    }

    let cart = session.snapshot().await;
    let options = SaleOptions {
        tax_inclusive: true,
        ..SaleOptions::default()
    };
    let due = cart.totals(options.tax_inclusive, options.discount, options.is_inter_state);

    let number = engine
        .finalize_sale(&cart, &[Tender::cash(due.grand_total)], &options)
        .await?;
    session.clear().await?;

    if let Some(sale) = engine.get_sale_by_number(&number).await? {
        info!(
            number = %sale.bill.number,
            grand_total = %sale.bill.grand_total(),
            lines = sale.items.len(),
            "Receipt ready"
        );
    }

    outbox.shutdown().await?;
    worker_task.await?;
    db.close().await;

    Ok(())
}
