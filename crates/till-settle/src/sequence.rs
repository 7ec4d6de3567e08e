//! # Sequence Generator
//!
//! Date-scoped document numbers: count today's documents of the kind, add one.
//!
//! ```text
//!   bills today:  BILL-20261015-0001, BILL-20261015-0002
//!   next():       COUNT(number LIKE 'BILL-20261015-%') = 2  →  BILL-20261015-0003
//! ```
//!
//! The count is not a reservation. Two writers that count before either
//! inserts get the same number; the UNIQUE index on `number` rejects the
//! second insert. Inside one process the engine's settlement lock keeps
//! count and insert together.

use chrono::{Local, NaiveDate};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::SettleResult;
use till_core::sequence::{date_prefix, format_number};
use till_core::DocumentKind;
use till_db::{Database, DocumentRepository};

pub struct SequenceGenerator;

impl SequenceGenerator {
    /// Next number for `kind` on `date`, counted on the caller's connection.
    pub async fn next(
        conn: &mut SqliteConnection,
        kind: DocumentKind,
        date: NaiveDate,
    ) -> SettleResult<String> {
        let prefix = date_prefix(kind, date);
        let issued = DocumentRepository::tx_count_with_prefix(conn, kind, &prefix).await?;
        let number = format_number(kind, date, ordinal(issued));

        debug!(kind = ?kind, issued, number = %number, "Issued document number");
        Ok(number)
    }

    /// Number the next document would get. Pure read, nothing is reserved.
    pub async fn peek(db: &Database, kind: DocumentKind, date: NaiveDate) -> SettleResult<String> {
        let prefix = date_prefix(kind, date);
        let issued = db.documents().count_with_prefix(kind, &prefix).await?;
        Ok(format_number(kind, date, ordinal(issued)))
    }

    /// Local business date.
    pub fn today() -> NaiveDate {
        Local::now().date_naive()
    }
}

fn ordinal(issued: i64) -> u32 {
    u32::try_from(issued).map_or(u32::MAX, |n| n.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use till_db::DbConfig;

    #[test]
    fn test_ordinal() {
        assert_eq!(ordinal(0), 1);
        assert_eq!(ordinal(41), 42);
    }

    #[tokio::test]
    async fn test_first_number_of_the_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();

        assert_eq!(
            SequenceGenerator::peek(&db, DocumentKind::Bill, date).await.unwrap(),
            "BILL-20261015-0001"
        );

        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(
            SequenceGenerator::next(&mut conn, DocumentKind::PurchaseOrder, date)
                .await
                .unwrap(),
            "PO-20261015-0001"
        );
    }
}
