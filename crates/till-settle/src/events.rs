//! # Settlement Events
//!
//! Messages the engine publishes after a commit. Listeners (receipt printer,
//! customer display, UI refresh) subscribe through
//! [`SettlementEngine::subscribe`](crate::SettlementEngine::subscribe).
//!
//! ```text
//!   SettlementEngine ──commit──► broadcast::Sender<SaleEvent>
//!                                      │
//!                        ┌─────────────┼─────────────┐
//!                        ▼             ▼             ▼
//!                    printer        display        UI
//! ```
//!
//! Publishing never blocks and never fails a sale. A listener that lags
//! behind the channel capacity misses the oldest events.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use till_core::Money;

/// Capacity of the event channel.
pub const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleEvent {
    /// A sale was finalized and committed.
    SaleCompleted {
        bill_id: i64,
        number: String,
        grand_total: Money,
        customer_id: Option<String>,
    },

    /// An existing sale was replaced through the edit path.
    SaleUpdated { bill_id: i64, number: String },

    /// A purchase order was received.
    PurchaseReceived { number: String, total: Money },
}

/// Publishing half of the event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SaleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        EventBus { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SaleEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SaleEvent) {
        // Err only means nobody is listening
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            trace!(?event, "No event subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
