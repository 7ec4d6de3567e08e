//! # Purchase Repository
//!
//! Received purchase orders and their lines.

use chrono::Utc;
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use till_core::{Money, PurchaseLine, PurchaseOrder, Quantity};

/// A stored purchase line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PurchaseLineRow {
    pub id: i64,
    pub purchase_id: i64,
    pub product_id: String,
    pub quantity: Quantity,
    pub unit_cost_cents: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<PurchaseOrder>> {
        let order = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            SELECT id, number, supplier_id, total_cents, paid_cents, notes, created_at
            FROM purchase_orders
            WHERE number = ?1
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    pub async fn lines(&self, purchase_id: i64) -> DbResult<Vec<PurchaseLineRow>> {
        let rows = sqlx::query_as::<_, PurchaseLineRow>(
            r#"
            SELECT id, purchase_id, product_id, quantity, unit_cost_cents, amount_cents
            FROM purchase_items
            WHERE purchase_id = ?1
            ORDER BY id
            "#,
        )
        .bind(purchase_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn tx_insert_order(
        conn: &mut SqliteConnection,
        number: &str,
        supplier_id: &str,
        total: Money,
        paid: Money,
        notes: Option<&str>,
    ) -> DbResult<i64> {
        debug!(number = %number, supplier_id = %supplier_id, total = %total, "Inserting purchase order");

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO purchase_orders (number, supplier_id, total_cents, paid_cents, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING id
            "#,
        )
        .bind(number)
        .bind(supplier_id)
        .bind(total)
        .bind(paid)
        .bind(notes)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }

    pub async fn tx_insert_line(
        conn: &mut SqliteConnection,
        purchase_id: i64,
        line: &PurchaseLine,
    ) -> DbResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO purchase_items (
                purchase_id, product_id, quantity, unit_cost_cents, amount_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id
            "#,
        )
        .bind(purchase_id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_cost)
        .bind(line.amount())
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }
}
