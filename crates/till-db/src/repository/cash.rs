//! # Cash Repository
//!
//! Cash-drawer sessions and their movements.
//!
//! ```text
//!   OPEN ──► OPENING, SALE, REFUND, PAYOUT, DROP ... ──► CLOSING ──► CLOSED
//! ```
//! A partial unique index allows at most one OPEN session.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::{CashSession, CashTransaction, CashTxKind, Money, SessionStatus};

const SESSION_COLUMNS: &str =
    "id, status, opening_float_cents, counted_cents, opened_at, closed_at";

/// Repository for cash sessions and drawer movements.
#[derive(Debug, Clone)]
pub struct CashRepository {
    pool: SqlitePool,
}

impl CashRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CashRepository { pool }
    }

    pub async fn get_session(&self, id: i64) -> DbResult<Option<CashSession>> {
        let session = sqlx::query_as::<_, CashSession>(&format!(
            "SELECT {} FROM cash_sessions WHERE id = ?1",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn open_session(&self) -> DbResult<Option<CashSession>> {
        let mut conn = self.pool.acquire().await?;
        Self::tx_open_session(&mut conn).await
    }

    /// Movements of a session in recording order.
    pub async fn transactions(&self, session_id: i64) -> DbResult<Vec<CashTransaction>> {
        let rows = sqlx::query_as::<_, CashTransaction>(
            r#"
            SELECT id, session_id, kind, amount_cents, reason, created_at
            FROM cash_transactions
            WHERE session_id = ?1
            ORDER BY id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// The currently open session, if any.
    pub async fn tx_open_session(conn: &mut SqliteConnection) -> DbResult<Option<CashSession>> {
        let session = sqlx::query_as::<_, CashSession>(&format!(
            "SELECT {} FROM cash_sessions WHERE status = ?1 ORDER BY id DESC LIMIT 1",
            SESSION_COLUMNS
        ))
        .bind(SessionStatus::Open)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(session)
    }

    /// Inserts a new OPEN session.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - another session is already open
    pub async fn tx_insert_session(conn: &mut SqliteConnection, opening_float: Money) -> DbResult<CashSession> {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO cash_sessions (status, opening_float_cents, opened_at)
            VALUES (?1, ?2, ?3)
            RETURNING id
            "#,
        )
        .bind(SessionStatus::Open)
        .bind(opening_float)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        debug!(session_id = id, opening_float = %opening_float, "Cash session opened");

        Ok(CashSession {
            id,
            status: SessionStatus::Open,
            opening_float_cents: opening_float.cents(),
            counted_cents: None,
            opened_at: now,
            closed_at: None,
        })
    }

    /// Marks a session CLOSED with the counted amount.
    pub async fn tx_close_session(conn: &mut SqliteConnection, session_id: i64, counted: Money) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET status = ?2, counted_cents = ?3, closed_at = ?4
            WHERE id = ?1 AND status = ?5
            "#,
        )
        .bind(session_id)
        .bind(SessionStatus::Closed)
        .bind(counted)
        .bind(Utc::now())
        .bind(SessionStatus::Open)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Open cash session", session_id.to_string()));
        }

        Ok(())
    }

    /// Records a movement. `amount` is unsigned; the kind carries direction.
    pub async fn tx_record(
        conn: &mut SqliteConnection,
        session_id: i64,
        kind: CashTxKind,
        amount: Money,
        reason: &str,
    ) -> DbResult<i64> {
        debug!(session_id, kind = ?kind, amount = %amount, "Recording cash movement");

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO cash_transactions (session_id, kind, amount_cents, reason, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id
            "#,
        )
        .bind(session_id)
        .bind(kind)
        .bind(amount)
        .bind(reason)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;

    #[tokio::test]
    async fn test_single_open_session() {
        let db = test_support::db().await;
        assert!(db.cash().open_session().await.unwrap().is_none());

        let mut tx = db.begin().await.unwrap();
        let session = CashRepository::tx_insert_session(&mut tx, Money::from_cents(5000))
            .await
            .unwrap();
        let err = CashRepository::tx_insert_session(&mut tx, Money::from_cents(100))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        tx.commit().await.unwrap();

        let open = db.cash().open_session().await.unwrap().unwrap();
        assert_eq!(open.id, session.id);
    }

    #[tokio::test]
    async fn test_record_and_close() {
        let db = test_support::db().await;
        let mut tx = db.begin().await.unwrap();
        let session = CashRepository::tx_insert_session(&mut tx, Money::from_cents(5000))
            .await
            .unwrap();
        CashRepository::tx_record(&mut tx, session.id, CashTxKind::Sale, Money::from_cents(23600), "BILL-1")
            .await
            .unwrap();
        CashRepository::tx_close_session(&mut tx, session.id, Money::from_cents(28600))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let rows = db.cash().transactions(session.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, CashTxKind::Sale);

        let closed = db.cash().get_session(session.id).await.unwrap().unwrap();
        assert_eq!(closed.status, SessionStatus::Closed);
        assert_eq!(closed.counted_cents, Some(28600));
        assert!(db.cash().open_session().await.unwrap().is_none());
    }
}
