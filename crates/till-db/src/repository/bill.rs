//! # Bill Repository
//!
//! Database operations for bill headers, lines and tenders.
//!
//! ## Bill Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Bill Lifecycle                                    │
//! │                                                                         │
//! │  1. SETTLE (one transaction)                                           │
//! │     └── tx_insert_header() → id from RETURNING                         │
//! │     └── tx_insert_tender() × n                                         │
//! │     └── tx_insert_line()   × n                                         │
//! │                                                                         │
//! │  2. (OPTIONAL) EDIT (one transaction)                                  │
//! │     └── tx_get_lines()     → quantities to put back                    │
//! │     └── tx_delete_lines() / tx_delete_tenders()                        │
//! │     └── tx_rewrite_header()                                            │
//! │     └── tx_insert_tender() / tx_insert_line()                          │
//! │                                                                         │
//! │  3. (OPTIONAL) NOTES PATCH                                             │
//! │     └── update_notes()                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::tax::{LineTax, SettlementTotals};
use till_core::{
    Bill, BillLine, BillStatus, BillTender, Money, OrderType, PaymentMode, Quantity, TaxRate,
    Tender,
};

const BILL_COLUMNS: &str = r#"
    id, number, subtotal_cents, cgst_cents, sgst_cents, igst_cents,
    discount_cents, grand_total_cents, points_earned, points_redeemed,
    customer_id, payment_mode, status, order_type, tax_inclusive,
    is_inter_state, notes, created_at, updated_at
"#;

const LINE_COLUMNS: &str = r#"
    id, bill_id, product_id, name_snapshot, quantity, unit_price_cents,
    line_amount_cents, taxable_cents, tax_rate_bps, tax_cents
"#;

/// Header values for a new or rewritten bill.
#[derive(Debug, Clone)]
pub struct NewBill {
    pub number: String,
    pub totals: SettlementTotals,
    pub points_earned: i64,
    pub points_redeemed: i64,
    pub customer_id: Option<String>,
    pub payment_mode: PaymentMode,
    pub status: BillStatus,
    pub order_type: OrderType,
    pub tax_inclusive: bool,
    pub is_inter_state: bool,
    pub notes: Option<String>,
}

/// A bill line ready to persist.
#[derive(Debug, Clone)]
pub struct NewBillLine {
    pub product_id: String,
    pub name_snapshot: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub tax_rate: TaxRate,
    pub tax: LineTax,
}

/// Repository for bill database operations.
#[derive(Debug, Clone)]
pub struct BillRepository {
    pool: SqlitePool,
}

impl BillRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BillRepository { pool }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Bill>> {
        let bill = sqlx::query_as::<_, Bill>(&format!(
            "SELECT {} FROM bills WHERE id = ?1",
            BILL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bill)
    }

    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Bill>> {
        let bill = sqlx::query_as::<_, Bill>(&format!(
            "SELECT {} FROM bills WHERE number = ?1",
            BILL_COLUMNS
        ))
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bill)
    }

    /// Lines in insertion order.
    pub async fn get_lines(&self, bill_id: i64) -> DbResult<Vec<BillLine>> {
        let mut conn = self.pool.acquire().await?;
        Self::tx_get_lines(&mut conn, bill_id).await
    }

    pub async fn get_tenders(&self, bill_id: i64) -> DbResult<Vec<BillTender>> {
        let tenders = sqlx::query_as::<_, BillTender>(
            r#"
            SELECT id, bill_id, mode, amount_cents, created_at
            FROM bill_tenders
            WHERE bill_id = ?1
            ORDER BY id
            "#,
        )
        .bind(bill_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tenders)
    }

    /// Replaces the notes on a bill. Nothing else changes.
    pub async fn update_notes(&self, bill_id: i64, notes: Option<&str>) -> DbResult<()> {
        debug!(bill_id, "Updating bill notes");

        let result = sqlx::query("UPDATE bills SET notes = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(bill_id)
            .bind(notes)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Bill", bill_id.to_string()));
        }

        Ok(())
    }

    // =========================================================================
    // Transaction-scoped writes
    // =========================================================================

    /// Inserts a header and returns its id from the same statement.
    pub async fn tx_insert_header(conn: &mut SqliteConnection, bill: &NewBill) -> DbResult<i64> {
        debug!(number = %bill.number, "Inserting bill header");

        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO bills (
                number, subtotal_cents, cgst_cents, sgst_cents, igst_cents,
                discount_cents, grand_total_cents, points_earned, points_redeemed,
                customer_id, payment_mode, status, order_type, tax_inclusive,
                is_inter_state, notes, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?17
            )
            RETURNING id
            "#,
        )
        .bind(&bill.number)
        .bind(bill.totals.subtotal)
        .bind(bill.totals.tax.cgst)
        .bind(bill.totals.tax.sgst)
        .bind(bill.totals.tax.igst)
        .bind(bill.totals.discount)
        .bind(bill.totals.grand_total)
        .bind(bill.points_earned)
        .bind(bill.points_redeemed)
        .bind(&bill.customer_id)
        .bind(bill.payment_mode)
        .bind(bill.status)
        .bind(bill.order_type)
        .bind(bill.tax_inclusive)
        .bind(bill.is_inter_state)
        .bind(&bill.notes)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }

    /// Overwrites a header's figures. The number and creation time are kept.
    pub async fn tx_rewrite_header(
        conn: &mut SqliteConnection,
        bill_id: i64,
        bill: &NewBill,
    ) -> DbResult<()> {
        debug!(bill_id, "Rewriting bill header");

        let result = sqlx::query(
            r#"
            UPDATE bills SET
                subtotal_cents = ?2,
                cgst_cents = ?3,
                sgst_cents = ?4,
                igst_cents = ?5,
                discount_cents = ?6,
                grand_total_cents = ?7,
                points_earned = ?8,
                points_redeemed = ?9,
                customer_id = ?10,
                payment_mode = ?11,
                status = ?12,
                order_type = ?13,
                tax_inclusive = ?14,
                is_inter_state = ?15,
                notes = ?16,
                updated_at = ?17
            WHERE id = ?1
            "#,
        )
        .bind(bill_id)
        .bind(bill.totals.subtotal)
        .bind(bill.totals.tax.cgst)
        .bind(bill.totals.tax.sgst)
        .bind(bill.totals.tax.igst)
        .bind(bill.totals.discount)
        .bind(bill.totals.grand_total)
        .bind(bill.points_earned)
        .bind(bill.points_redeemed)
        .bind(&bill.customer_id)
        .bind(bill.payment_mode)
        .bind(bill.status)
        .bind(bill.order_type)
        .bind(bill.tax_inclusive)
        .bind(bill.is_inter_state)
        .bind(&bill.notes)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Bill", bill_id.to_string()));
        }

        Ok(())
    }

    pub async fn tx_get_header(conn: &mut SqliteConnection, bill_id: i64) -> DbResult<Option<Bill>> {
        let bill = sqlx::query_as::<_, Bill>(&format!(
            "SELECT {} FROM bills WHERE id = ?1",
            BILL_COLUMNS
        ))
        .bind(bill_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(bill)
    }

    pub async fn tx_insert_line(
        conn: &mut SqliteConnection,
        bill_id: i64,
        line: &NewBillLine,
    ) -> DbResult<i64> {
        debug!(bill_id, product_id = %line.product_id, quantity = %line.quantity, "Inserting bill line");

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO bill_items (
                bill_id, product_id, name_snapshot, quantity, unit_price_cents,
                line_amount_cents, taxable_cents, tax_rate_bps, tax_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            RETURNING id
            "#,
        )
        .bind(bill_id)
        .bind(&line.product_id)
        .bind(&line.name_snapshot)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.tax.amount)
        .bind(line.tax.taxable)
        .bind(line.tax_rate.bps())
        .bind(line.tax.tax)
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }

    pub async fn tx_insert_tender(
        conn: &mut SqliteConnection,
        bill_id: i64,
        tender: &Tender,
    ) -> DbResult<i64> {
        debug!(bill_id, mode = ?tender.mode, amount = %tender.amount, "Inserting tender");

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO bill_tenders (bill_id, mode, amount_cents, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id
            "#,
        )
        .bind(bill_id)
        .bind(tender.mode)
        .bind(tender.amount)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }

    pub async fn tx_get_lines(conn: &mut SqliteConnection, bill_id: i64) -> DbResult<Vec<BillLine>> {
        let lines = sqlx::query_as::<_, BillLine>(&format!(
            "SELECT {} FROM bill_items WHERE bill_id = ?1 ORDER BY id",
            LINE_COLUMNS
        ))
        .bind(bill_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }

    pub async fn tx_delete_lines(conn: &mut SqliteConnection, bill_id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM bill_items WHERE bill_id = ?1")
            .bind(bill_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn tx_delete_tenders(conn: &mut SqliteConnection, bill_id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM bill_tenders WHERE bill_id = ?1")
            .bind(bill_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;
    use till_core::TenderMode;

    fn header(number: &str, subtotal: i64) -> NewBill {
        let line = LineTax::compute(Money::from_cents(subtotal), TaxRate::from_bps(1800), true);
        NewBill {
            number: number.to_string(),
            totals: SettlementTotals::from_lines(&[line], Money::zero(), false),
            points_earned: 0,
            points_redeemed: 0,
            customer_id: None,
            payment_mode: PaymentMode::Cash,
            status: BillStatus::Paid,
            order_type: OrderType::Counter,
            tax_inclusive: true,
            is_inter_state: false,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_header_returns_id_and_round_trips() {
        let db = test_support::db().await;
        let product = test_support::product(&db, "TEA", 11800, 5).await;

        let mut tx = db.begin().await.unwrap();
        let id = BillRepository::tx_insert_header(&mut tx, &header("BILL-20260101-0001", 11800))
            .await
            .unwrap();
        BillRepository::tx_insert_line(
            &mut tx,
            id,
            &NewBillLine {
                product_id: product.id.clone(),
                name_snapshot: product.name.clone(),
                quantity: Quantity::from_units(1),
                unit_price: Money::from_cents(11800),
                tax_rate: TaxRate::from_bps(1800),
                tax: LineTax::compute(Money::from_cents(11800), TaxRate::from_bps(1800), true),
            },
        )
        .await
        .unwrap();
        BillRepository::tx_insert_tender(&mut tx, id, &Tender::new(TenderMode::Cash, Money::from_cents(11800)))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let bill = db.bills().get_by_number("BILL-20260101-0001").await.unwrap().unwrap();
        assert_eq!(bill.id, id);
        assert_eq!(bill.subtotal_cents, 11800);
        assert_eq!(bill.cgst_cents + bill.sgst_cents, 1800);
        assert_eq!(bill.status, BillStatus::Paid);

        let lines = db.bills().get_lines(id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].taxable_cents, 10000);
        assert_eq!(db.bills().get_tenders(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_number_is_unique_violation() {
        let db = test_support::db().await;
        let mut tx = db.begin().await.unwrap();
        BillRepository::tx_insert_header(&mut tx, &header("BILL-20260101-0001", 100))
            .await
            .unwrap();
        let err = BillRepository::tx_insert_header(&mut tx, &header("BILL-20260101-0001", 100))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_update_notes() {
        let db = test_support::db().await;
        let mut tx = db.begin().await.unwrap();
        let id = BillRepository::tx_insert_header(&mut tx, &header("BILL-20260101-0002", 100))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        db.bills().update_notes(id, Some("deliver after 6pm")).await.unwrap();
        let bill = db.bills().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(bill.notes.as_deref(), Some("deliver after 6pm"));

        assert!(db.bills().update_notes(9999, None).await.is_err());
    }
}
