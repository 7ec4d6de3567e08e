//! # Held Cart Repository
//!
//! Parked carts: a cashier sets a cart aside under a customer label, serves
//! the next customer, and resumes it later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use till_core::CartLine;

/// A parked cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeldCart {
    pub id: String,
    pub customer_label: String,
    pub items: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct HeldCartRow {
    id: String,
    customer_label: String,
    items_json: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<HeldCartRow> for HeldCart {
    type Error = DbError;

    fn try_from(row: HeldCartRow) -> DbResult<Self> {
        Ok(HeldCart {
            id: row.id,
            customer_label: row.customer_label,
            items: serde_json::from_str(&row.items_json)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HeldCartRepository {
    pool: SqlitePool,
}

impl HeldCartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        HeldCartRepository { pool }
    }

    pub async fn insert(&self, items: &[CartLine], customer_label: &str) -> DbResult<HeldCart> {
        let held = HeldCart {
            id: Uuid::new_v4().to_string(),
            customer_label: customer_label.to_string(),
            items: items.to_vec(),
            created_at: Utc::now(),
        };

        debug!(id = %held.id, label = %held.customer_label, lines = items.len(), "Holding cart");

        sqlx::query(
            r#"
            INSERT INTO held_carts (id, customer_label, items_json, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&held.id)
        .bind(&held.customer_label)
        .bind(serde_json::to_string(&held.items)?)
        .bind(held.created_at)
        .execute(&self.pool)
        .await?;

        Ok(held)
    }

    /// All held carts, oldest first.
    pub async fn list(&self) -> DbResult<Vec<HeldCart>> {
        let rows = sqlx::query_as::<_, HeldCartRow>(
            "SELECT id, customer_label, items_json, created_at FROM held_carts ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HeldCart::try_from).collect()
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM held_carts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Held cart", id));
        }

        Ok(())
    }
}
