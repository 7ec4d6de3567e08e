//! # Outbox Repository
//!
//! Follow-up work (journal vouchers, sale sync) is written as an `outbox`
//! row inside the settlement transaction, so it exists exactly when the bill
//! does. The worker in till-settle drains it after commit.
//!
//! ```text
//!   settlement tx ──► outbox row (processed_at NULL, attempts 0)
//!                          │
//!        worker picks it up ┤
//!                          ├─ handler ok    ─► processed_at = now
//!                          └─ handler error ─► attempts + 1, last_error
//!                                               │
//!                          attempts >= ceiling ─► dead, listed by get_dead
//! ```
//!
//! Nothing here ever reverses a bill. A row that keeps failing just stops
//! being picked up.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use till_core::{OutboxEntry, OutboxTopic};

const SELECT_ENTRY: &str = "SELECT id, topic, entity_id, payload, attempts, last_error, \
     created_at, attempted_at, processed_at FROM outbox";

#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    /// Writes a row on the caller's connection. `entity_id` is the document
    /// number the handler will act on.
    pub async fn tx_enqueue(
        conn: &mut SqliteConnection,
        topic: OutboxTopic,
        entity_id: &str,
        payload: &str,
    ) -> DbResult<OutboxEntry> {
        let id = Uuid::new_v4().to_string();
        let created_at: DateTime<Utc> = Utc::now();

        sqlx::query(
            "INSERT INTO outbox (id, topic, entity_id, payload, attempts, created_at) \
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        )
        .bind(&id)
        .bind(topic)
        .bind(entity_id)
        .bind(payload)
        .bind(created_at)
        .execute(&mut *conn)
        .await?;

        debug!(%id, ?topic, entity_id, "Outbox row queued");

        Ok(OutboxEntry {
            id,
            topic,
            entity_id: entity_id.to_owned(),
            payload: payload.to_owned(),
            attempts: 0,
            last_error: None,
            created_at,
            attempted_at: None,
            processed_at: None,
        })
    }

    /// Unprocessed rows still under `max_attempts`, in enqueue order.
    pub async fn get_pending(&self, limit: u32, max_attempts: u32) -> DbResult<Vec<OutboxEntry>> {
        let sql = format!(
            "{SELECT_ENTRY} WHERE processed_at IS NULL AND attempts < ?1 \
             ORDER BY created_at, id LIMIT ?2"
        );
        Ok(sqlx::query_as::<_, OutboxEntry>(&sql)
            .bind(max_attempts)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Unprocessed rows that ran out of attempts.
    pub async fn get_dead(&self, max_attempts: u32) -> DbResult<Vec<OutboxEntry>> {
        let sql = format!(
            "{SELECT_ENTRY} WHERE processed_at IS NULL AND attempts >= ?1 ORDER BY created_at, id"
        );
        Ok(sqlx::query_as::<_, OutboxEntry>(&sql)
            .bind(max_attempts)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<OutboxEntry>> {
        let sql = format!("{SELECT_ENTRY} WHERE id = ?1");
        Ok(sqlx::query_as::<_, OutboxEntry>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn mark_processed(&self, id: &str) -> DbResult<()> {
        let done = sqlx::query(
            "UPDATE outbox SET processed_at = ?2, attempted_at = ?2 \
             WHERE id = ?1 AND processed_at IS NULL",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if done.rows_affected() == 0 {
            return Err(DbError::not_found("outbox entry", id));
        }
        Ok(())
    }

    /// Records one failed attempt and the handler's message.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE outbox SET attempts = attempts + 1, last_error = ?2, attempted_at = ?3 \
             WHERE id = ?1",
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_pending(&self) -> DbResult<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE processed_at IS NULL")
                .fetch_one(&self.pool)
                .await?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;

    #[tokio::test]
    async fn test_row_lifecycle() {
        let db = test_support::db().await;

        let mut tx = db.begin().await.unwrap();
        let entry = OutboxRepository::tx_enqueue(&mut tx, OutboxTopic::SaleSync, "BILL-1", "{}")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let outbox = db.outbox();
        assert_eq!(outbox.get_pending(10, 3).await.unwrap().len(), 1);

        outbox.mark_failed(&entry.id, "sink offline").await.unwrap();
        let after = outbox.get_by_id(&entry.id).await.unwrap().unwrap();
        assert_eq!(after.attempts, 1);
        assert_eq!(after.last_error.as_deref(), Some("sink offline"));

        // with a ceiling of one the row is dead rather than pending
        assert!(outbox.get_pending(10, 1).await.unwrap().is_empty());
        assert_eq!(outbox.get_dead(1).await.unwrap().len(), 1);

        outbox.mark_processed(&entry.id).await.unwrap();
        assert_eq!(outbox.count_pending().await.unwrap(), 0);

        let again = outbox.mark_processed(&entry.id).await.unwrap_err();
        assert!(again.is_not_found());
    }

    #[tokio::test]
    async fn test_pending_respects_limit() {
        let db = test_support::db().await;

        let mut tx = db.begin().await.unwrap();
        for n in 1..=3 {
            OutboxRepository::tx_enqueue(
                &mut tx,
                OutboxTopic::AccountingSale,
                &format!("BILL-{n}"),
                "{}",
            )
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();

        let batch = db.outbox().get_pending(2, 5).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(db.outbox().count_pending().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_rolled_back_enqueue_leaves_nothing() {
        let db = test_support::db().await;

        let mut tx = db.begin().await.unwrap();
        OutboxRepository::tx_enqueue(&mut tx, OutboxTopic::AccountingSale, "BILL-2", "{}")
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);
    }
}
