//! # Outbox Worker
//!
//! Runs the work a settlement queued but must not wait for.
//!
//! ## Processing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Worker Flow                                   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                       outbox Table                              │   │
//! │  │                                                                 │   │
//! │  │  topic               │ entity_id          │ attempts │ processed│   │
//! │  │  ────────────────────┼────────────────────┼──────────┼──────────│   │
//! │  │  ACCOUNTING_SALE     │ BILL-20261015-0001 │ 0        │ NULL     │   │
//! │  │  SALE_SYNC           │ BILL-20261015-0001 │ 2        │ NULL     │   │
//! │  │  ACCOUNTING_PURCHASE │ PO-20261015-0001   │ 0        │ NULL     │   │
//! │  └────────────────────────────┬────────────────────────────────────┘   │
//! │                               │                                         │
//! │                               ▼                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    OutboxWorker                                 │   │
//! │  │                                                                 │   │
//! │  │  1. Wake: poll interval tick, or a nudge after a commit        │   │
//! │  │  2. Poll: pending rows below max_attempts, oldest first        │   │
//! │  │  3. Dispatch:                                                  │   │
//! │  │       ACCOUNTING_*  → AccountingPoster (idempotent)            │   │
//! │  │       SALE_SYNC     → SyncSink::push(SaleRecord)               │   │
//! │  │  4. Mark: processed_at = NOW()  or  attempts += 1, last_error  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Failures are logged here and never reach the cashier.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::accounting::{AccountingPoster, PurchaseVoucherInput, SaleVoucherInput};
use crate::config::OutboxSettings;
use crate::engine::load_sale;
use crate::error::{SettleError, SettleResult};
use till_core::{OutboxEntry, OutboxTopic, SaleRecord};
use till_db::Database;

// =============================================================================
// Sync Sink
// =============================================================================

/// Outbox payload for `SALE_SYNC`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleSyncRef {
    pub bill_id: i64,
    pub number: String,
}

/// External target that receives finalized sales (head office, cloud).
#[async_trait]
pub trait SyncSink: Send + Sync {
    async fn push(&self, sale: &SaleRecord) -> SettleResult<()>;
}

/// Sink that only logs. Used when no sync target is configured.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl SyncSink for LogSink {
    async fn push(&self, sale: &SaleRecord) -> SettleResult<()> {
        info!(
            number = %sale.bill.number,
            grand_total = %sale.bill.grand_total(),
            items = sale.items.len(),
            "Sale ready for sync"
        );
        Ok(())
    }
}

// =============================================================================
// Worker
// =============================================================================

/// Drains the outbox table.
pub struct OutboxWorker {
    db: Database,
    accounting: AccountingPoster,
    sink: Arc<dyn SyncSink>,
    settings: OutboxSettings,
    wake_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling the outbox worker.
#[derive(Debug, Clone)]
pub struct OutboxHandle {
    wake_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl OutboxHandle {
    /// Asks the worker to poll now. Never waits.
    pub fn nudge(&self) {
        // Full means a wake-up is already pending
        let _ = self.wake_tx.try_send(());
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> SettleResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SettleError::InvalidConfig("outbox worker already stopped".into()))
    }
}

impl OutboxWorker {
    /// Creates a worker and returns its handle.
    pub fn new(db: Database, sink: Arc<dyn SyncSink>, settings: OutboxSettings) -> (Self, OutboxHandle) {
        let (wake_tx, wake_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let worker = OutboxWorker {
            accounting: AccountingPoster::new(db.clone()),
            db,
            sink,
            settings,
            wake_rx,
            shutdown_rx,
        };

        (worker, OutboxHandle { wake_tx, shutdown_tx })
    }

    /// Runs the worker loop. Spawn as a background task.
    pub async fn run(mut self) {
        info!(
            poll_interval_secs = self.settings.poll_interval_secs,
            batch_size = self.settings.batch_size,
            "Outbox worker starting"
        );

        let mut interval = tokio::time::interval(self.settings.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}

                Some(()) = self.wake_rx.recv() => {
                    debug!("Outbox worker nudged");
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Outbox worker shutting down");
                    break;
                }
            }

            if let Err(e) = self.process_batch().await {
                error!(error = %e, "Failed to process outbox batch");
            }
        }

        info!("Outbox worker stopped");
    }

    /// Processes one batch. Returns how many rows completed.
    pub async fn process_batch(&self) -> SettleResult<usize> {
        let outbox = self.db.outbox();
        let entries = outbox
            .get_pending(self.settings.batch_size, self.settings.max_attempts)
            .await?;

        if entries.is_empty() {
            return Ok(0);
        }

        debug!(count = entries.len(), "Processing outbox batch");

        let mut done = 0;
        for entry in &entries {
            match self.dispatch(entry).await {
                Ok(()) => {
                    outbox.mark_processed(&entry.id).await?;
                    done += 1;
                }
                Err(e) => {
                    warn!(
                        id = %entry.id,
                        topic = ?entry.topic,
                        entity_id = %entry.entity_id,
                        attempts = entry.attempts + 1,
                        error = %e,
                        "Outbox entry failed"
                    );
                    outbox.mark_failed(&entry.id, &e.to_string()).await?;

                    if entry.attempts + 1 >= i64::from(self.settings.max_attempts) {
                        warn!(
                            id = %entry.id,
                            entity_id = %entry.entity_id,
                            "Outbox entry exceeded max attempts, skipping from now on"
                        );
                    }
                }
            }
        }

        info!(processed = done, failed = entries.len() - done, "Outbox batch complete");
        Ok(done)
    }

    async fn dispatch(&self, entry: &OutboxEntry) -> SettleResult<()> {
        match entry.topic {
            OutboxTopic::AccountingSale => {
                let input: SaleVoucherInput = serde_json::from_str(&entry.payload)?;
                self.accounting.post_sale(&input).await?;
            }
            OutboxTopic::AccountingPurchase => {
                let input: PurchaseVoucherInput = serde_json::from_str(&entry.payload)?;
                self.accounting.post_purchase(&input).await?;
            }
            OutboxTopic::SaleSync => {
                let target: SaleSyncRef = serde_json::from_str(&entry.payload)?;
                let sale = load_sale(&self.db, target.bill_id)
                    .await?
                    .ok_or_else(|| SettleError::BillNotFound(target.number.clone()))?;
                self.sink.push(&sale).await?;
            }
        }
        Ok(())
    }
}
