//! # Working Cart Repository
//!
//! Last saved state of each register's live cart. Written after every cart
//! mutation so a crashed register comes back with the cart it had.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::DbResult;
use till_core::Cart;

#[derive(Debug, Clone)]
pub struct WorkingCartRepository {
    pool: SqlitePool,
}

impl WorkingCartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        WorkingCartRepository { pool }
    }

    pub async fn save(&self, register_id: &str, cart: &Cart) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO working_carts (register_id, cart_json, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(register_id) DO UPDATE SET
                cart_json = excluded.cart_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(register_id)
        .bind(serde_json::to_string(cart)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn load(&self, register_id: &str) -> DbResult<Option<Cart>> {
        let json: Option<String> =
            sqlx::query_scalar("SELECT cart_json FROM working_carts WHERE register_id = ?1")
                .bind(register_id)
                .fetch_optional(&self.pool)
                .await?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn clear(&self, register_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM working_carts WHERE register_id = ?1")
            .bind(register_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
