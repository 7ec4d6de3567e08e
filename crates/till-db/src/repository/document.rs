//! # Document Repository
//!
//! Counts issued documents per date prefix, the input to numbering.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use till_core::DocumentKind;

/// `(table, number column)` holding documents of a kind.
const fn source(kind: DocumentKind) -> (&'static str, &'static str) {
    match kind {
        DocumentKind::Bill => ("bills", "number"),
        DocumentKind::PurchaseOrder => ("purchase_orders", "number"),
        DocumentKind::Estimate => ("estimates", "number"),
    }
}

#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DocumentRepository { pool }
    }

    pub async fn count_with_prefix(&self, kind: DocumentKind, prefix: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::tx_count_with_prefix(&mut conn, kind, prefix).await
    }

    /// Documents of `kind` whose number starts with `prefix`.
    pub async fn tx_count_with_prefix(
        conn: &mut SqliteConnection,
        kind: DocumentKind,
        prefix: &str,
    ) -> DbResult<i64> {
        let (table, column) = source(kind);
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE {} LIKE ?1 || '%'",
            table, column
        ))
        .bind(prefix)
        .fetch_one(&mut *conn)
        .await?;

        Ok(count)
    }
}
