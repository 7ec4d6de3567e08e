//! # Journal Repository
//!
//! Double-entry journal storage. One entry per source document; the
//! `reference` column is UNIQUE so a replayed outbox row cannot post twice.

use chrono::Utc;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::accounting::{Account, Voucher};
use till_core::Money;

/// A stored journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct JournalLineRow {
    pub account_code: String,
    pub debit_cents: i64,
    pub credit_cents: i64,
}

/// Repository for journal operations.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    pool: SqlitePool,
}

impl JournalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        JournalRepository { pool }
    }

    /// Whether a voucher was already posted for `reference`.
    pub async fn exists(&self, reference: &str) -> DbResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM journal_entries WHERE reference = ?1")
                .bind(reference)
                .fetch_one(&self.pool)
                .await?;

        Ok(count > 0)
    }

    /// Writes the entry and its lines atomically. Returns the entry id.
    pub async fn post(&self, voucher: &Voucher) -> DbResult<i64> {
        if !voucher.is_balanced() {
            return Err(DbError::Internal(format!(
                "unbalanced voucher {}: debit {} credit {}",
                voucher.reference,
                voucher.total_debit(),
                voucher.total_credit()
            )));
        }

        let mut tx = self.pool.begin().await?;

        let entry_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO journal_entries (reference, narration, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING id
            "#,
        )
        .bind(&voucher.reference)
        .bind(&voucher.narration)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        for line in &voucher.lines {
            sqlx::query(
                r#"
                INSERT INTO journal_lines (entry_id, account_code, debit_cents, credit_cents)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(entry_id)
            .bind(line.account.code())
            .bind(line.debit)
            .bind(line.credit)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(
            entry_id,
            reference = %voucher.reference,
            lines = voucher.lines.len(),
            "Journal entry posted"
        );

        Ok(entry_id)
    }

    /// Lines of the entry for `reference`, in posting order.
    pub async fn lines(&self, reference: &str) -> DbResult<Vec<JournalLineRow>> {
        let rows = sqlx::query_as::<_, JournalLineRow>(
            r#"
            SELECT l.account_code, l.debit_cents, l.credit_cents
            FROM journal_lines l
            JOIN journal_entries e ON e.id = l.entry_id
            WHERE e.reference = ?1
            ORDER BY l.id
            "#,
        )
        .bind(reference)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Debit-positive balance of an account across all entries.
    pub async fn account_balance(&self, account: Account) -> DbResult<Money> {
        let balance: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(debit_cents - credit_cents), 0)
            FROM journal_lines
            WHERE account_code = ?1
            "#,
        )
        .bind(account.code())
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(balance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;
    use till_core::Tender;

    #[tokio::test]
    async fn test_post_and_read_back() {
        let db = test_support::db().await;
        let voucher = Voucher::for_sale(
            "BILL-20260101-0001",
            &[Tender::cash(Money::from_cents(11800))],
            Money::from_cents(11800),
            Money::from_cents(1800),
        );

        db.journal().post(&voucher).await.unwrap();
        assert!(db.journal().exists("BILL-20260101-0001").await.unwrap());

        let lines = db.journal().lines("BILL-20260101-0001").await.unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            db.journal().account_balance(Account::Cash).await.unwrap().cents(),
            11800
        );
        assert_eq!(
            db.journal().account_balance(Account::Sales).await.unwrap().cents(),
            -10000
        );
    }

    #[tokio::test]
    async fn test_second_post_for_same_reference_rejected() {
        let db = test_support::db().await;
        let voucher = Voucher::for_purchase("PO-20260101-0001", Money::from_cents(100), Money::zero());

        db.journal().post(&voucher).await.unwrap();
        let err = db.journal().post(&voucher).await.unwrap_err();
        assert!(err.is_unique_violation());
    }
}
