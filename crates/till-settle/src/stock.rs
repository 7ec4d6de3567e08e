//! # Stock Adjuster
//!
//! Signed stock deltas. A sale line of quantity `q` moves stock by `-q`; a
//! return line already carries a negative quantity, so the same rule puts the
//! goods back. Edits reverse with `+q`. No lower bound: stock may go negative.

use sqlx::SqliteConnection;

use crate::error::SettleResult;
use till_core::Quantity;
use till_db::ProductRepository;

pub struct StockAdjuster;

impl StockAdjuster {
    /// `stock = stock + delta`.
    pub async fn adjust(
        conn: &mut SqliteConnection,
        product_id: &str,
        delta: Quantity,
    ) -> SettleResult<()> {
        ProductRepository::tx_adjust_stock(conn, product_id, delta).await?;
        Ok(())
    }

    /// Deducts a sold line.
    pub async fn deduct(
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: Quantity,
    ) -> SettleResult<()> {
        Self::adjust(conn, product_id, -quantity).await
    }

    /// Puts a previously deducted line back.
    pub async fn restore(
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: Quantity,
    ) -> SettleResult<()> {
        Self::adjust(conn, product_id, quantity).await
    }
}
