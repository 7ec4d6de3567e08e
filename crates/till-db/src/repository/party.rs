//! # Party Repository
//!
//! Customers, suppliers and their append-only ledgers.
//!
//! ```text
//!   customers ──1:n──► customer_ledger      suppliers ──1:n──► supplier_ledger
//!   balance_cents == latest balance_after_cents (kept in the same transaction)
//! ```
//!
//! This repository stores whatever balance it is given; the direction rules
//! live in the settlement crate's ledger poster.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use till_core::{Customer, Direction, LedgerEntry, Money, PartyKind, Supplier};

/// A ledger row ready to append.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub party_id: String,
    pub direction: Direction,
    pub amount: Money,
    pub balance_after: Money,
    pub description: String,
    pub reference: Option<String>,
}

/// `(party table, ledger table)` for a party kind.
const fn tables(kind: PartyKind) -> (&'static str, &'static str) {
    match kind {
        PartyKind::Customer => ("customers", "customer_ledger"),
        PartyKind::Supplier => ("suppliers", "supplier_ledger"),
    }
}

const fn entity(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::Customer => "Customer",
        PartyKind::Supplier => "Supplier",
    }
}

/// Repository for party and ledger operations.
#[derive(Debug, Clone)]
pub struct PartyRepository {
    pool: SqlitePool,
}

impl PartyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PartyRepository { pool }
    }

    // =========================================================================
    // Master data
    // =========================================================================

    pub async fn insert_customer(&self, name: &str, phone: Option<&str>) -> DbResult<Customer> {
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            phone: phone.map(str::to_string),
            balance_cents: 0,
            loyalty_points: 0,
            total_purchases_cents: 0,
            last_visit_at: None,
            created_at: Utc::now(),
        };

        debug!(id = %customer.id, name = %customer.name, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(customer)
    }

    pub async fn insert_supplier(&self, name: &str, phone: Option<&str>) -> DbResult<Supplier> {
        let supplier = Supplier {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            phone: phone.map(str::to_string),
            balance_cents: 0,
            created_at: Utc::now(),
        };

        debug!(id = %supplier.id, name = %supplier.name, "Inserting supplier");

        sqlx::query(
            r#"
            INSERT INTO suppliers (id, name, phone, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.phone)
        .bind(supplier.created_at)
        .execute(&self.pool)
        .await?;

        Ok(supplier)
    }

    pub async fn get_customer(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, phone, balance_cents, loyalty_points,
                   total_purchases_cents, last_visit_at, created_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    pub async fn get_supplier(&self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(
            "SELECT id, name, phone, balance_cents, created_at FROM suppliers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(supplier)
    }

    // =========================================================================
    // Ledger reads
    // =========================================================================

    /// Entries for a party, newest first.
    pub async fn entries(&self, kind: PartyKind, party_id: &str, limit: u32) -> DbResult<Vec<LedgerEntry>> {
        let (_, ledger) = tables(kind);
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            SELECT id, party_id, direction, amount_cents, balance_after_cents,
                   description, reference, created_at
            FROM {}
            WHERE party_id = ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
            ledger
        ))
        .bind(party_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Cached balance on the party row.
    pub async fn balance(&self, kind: PartyKind, party_id: &str) -> DbResult<Money> {
        let mut conn = self.pool.acquire().await?;
        Self::tx_balance(&mut conn, kind, party_id).await
    }

    // =========================================================================
    // Transaction-scoped writes
    // =========================================================================

    /// Reads the cached balance.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - No such party
    pub async fn tx_balance(conn: &mut SqliteConnection, kind: PartyKind, party_id: &str) -> DbResult<Money> {
        let (party, _) = tables(kind);
        let balance: Option<Money> =
            sqlx::query_scalar(&format!("SELECT balance_cents FROM {} WHERE id = ?1", party))
                .bind(party_id)
                .fetch_optional(&mut *conn)
                .await?;

        balance.ok_or_else(|| DbError::not_found(entity(kind), party_id))
    }

    pub async fn tx_set_balance(
        conn: &mut SqliteConnection,
        kind: PartyKind,
        party_id: &str,
        balance: Money,
    ) -> DbResult<()> {
        let (party, _) = tables(kind);
        let result = sqlx::query(&format!("UPDATE {} SET balance_cents = ?2 WHERE id = ?1", party))
            .bind(party_id)
            .bind(balance)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(entity(kind), party_id));
        }

        Ok(())
    }

    /// Appends a ledger row and returns its id.
    pub async fn tx_append_entry(
        conn: &mut SqliteConnection,
        kind: PartyKind,
        entry: &NewLedgerEntry,
    ) -> DbResult<i64> {
        let (_, ledger) = tables(kind);

        debug!(
            party_id = %entry.party_id,
            direction = ?entry.direction,
            amount = %entry.amount,
            balance_after = %entry.balance_after,
            "Appending ledger entry"
        );

        let id: i64 = sqlx::query_scalar(&format!(
            r#"
            INSERT INTO {} (
                party_id, direction, amount_cents, balance_after_cents,
                description, reference, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING id
            "#,
            ledger
        ))
        .bind(&entry.party_id)
        .bind(entry.direction)
        .bind(entry.amount)
        .bind(entry.balance_after)
        .bind(&entry.description)
        .bind(&entry.reference)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }

    /// Adds to a customer's lifetime purchases and stamps the visit.
    pub async fn tx_record_visit(
        conn: &mut SqliteConnection,
        customer_id: &str,
        purchase: Money,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET total_purchases_cents = total_purchases_cents + ?2,
                last_visit_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(customer_id)
        .bind(purchase)
        .bind(at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", customer_id));
        }

        Ok(())
    }

    /// Applies a signed loyalty points delta.
    pub async fn tx_add_points(conn: &mut SqliteConnection, customer_id: &str, delta: i64) -> DbResult<()> {
        debug!(customer_id = %customer_id, delta, "Adjusting loyalty points");

        let result = sqlx::query(
            "UPDATE customers SET loyalty_points = loyalty_points + ?2 WHERE id = ?1",
        )
        .bind(customer_id)
        .bind(delta)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", customer_id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;

    #[tokio::test]
    async fn test_entries_newest_first() {
        let db = test_support::db().await;
        let customer = test_support::customer(&db, "Asha").await;

        let mut tx = db.begin().await.unwrap();
        for (i, amount) in [500, 300].into_iter().enumerate() {
            PartyRepository::tx_append_entry(
                &mut tx,
                PartyKind::Customer,
                &NewLedgerEntry {
                    party_id: customer.id.clone(),
                    direction: Direction::Debit,
                    amount: Money::from_cents(amount),
                    balance_after: Money::from_cents(if i == 0 { 500 } else { 800 }),
                    description: format!("entry {}", i),
                    reference: None,
                },
            )
            .await
            .unwrap();
        }
        PartyRepository::tx_set_balance(&mut tx, PartyKind::Customer, &customer.id, Money::from_cents(800))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let entries = db.parties().entries(PartyKind::Customer, &customer.id, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].balance_after_cents, 800);
        assert_eq!(
            db.parties().balance(PartyKind::Customer, &customer.id).await.unwrap().cents(),
            800
        );
    }

    #[tokio::test]
    async fn test_unknown_party_is_not_found() {
        let db = test_support::db().await;
        let err = db.parties().balance(PartyKind::Supplier, "nope").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Supplier"));
    }

    #[tokio::test]
    async fn test_visit_and_points() {
        let db = test_support::db().await;
        let customer = test_support::customer(&db, "Ravi").await;

        let mut tx = db.begin().await.unwrap();
        PartyRepository::tx_record_visit(&mut tx, &customer.id, Money::from_cents(23600), Utc::now())
            .await
            .unwrap();
        PartyRepository::tx_add_points(&mut tx, &customer.id, 23).await.unwrap();
        tx.commit().await.unwrap();

        let customer = db.parties().get_customer(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.total_purchases_cents, 23600);
        assert_eq!(customer.loyalty_points, 23);
        assert!(customer.last_visit_at.is_some());
    }
}
