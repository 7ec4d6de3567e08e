//! # Estimate Repository
//!
//! Quotations. Stored with their cart lines as JSON; they move no stock,
//! balances or cash.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use till_core::{CartLine, Estimate, Money};

#[derive(Debug, Clone)]
pub struct EstimateRepository {
    pool: SqlitePool,
}

impl EstimateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        EstimateRepository { pool }
    }

    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Estimate>> {
        let estimate = sqlx::query_as::<_, Estimate>(
            r#"
            SELECT id, number, customer_id, total_cents, items_json, notes, created_at
            FROM estimates
            WHERE number = ?1
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(estimate)
    }

    /// Decodes the stored cart lines of an estimate.
    pub fn items(estimate: &Estimate) -> DbResult<Vec<CartLine>> {
        Ok(serde_json::from_str(&estimate.items_json)?)
    }

    pub async fn tx_insert(
        conn: &mut SqliteConnection,
        number: &str,
        customer_id: Option<&str>,
        total: Money,
        items: &[CartLine],
        notes: Option<&str>,
    ) -> DbResult<i64> {
        debug!(number = %number, lines = items.len(), "Inserting estimate");

        let items_json = serde_json::to_string(items)?;
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO estimates (number, customer_id, total_cents, items_json, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING id
            "#,
        )
        .bind(number)
        .bind(customer_id)
        .bind(total)
        .bind(items_json)
        .bind(notes)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }
}
