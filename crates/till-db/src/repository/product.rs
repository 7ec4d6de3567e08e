//! Catalogue rows and the stock column.
//!
//! Stock only ever moves through [`ProductRepository::tx_adjust_stock`], a
//! single `stock = stock + delta` statement, so two settlements touching the
//! same product never overwrite each other. A sale passes a negative delta,
//! an edit reversal or a goods receipt a positive one. There is no floor:
//! selling past zero leaves negative stock.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use till_core::{Product, Quantity};

const PRODUCT_COLUMNS: &str =
    "id, sku, name, price_cents, tax_rate_bps, stock, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE {column} = ?1");
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        self.fetch_one_by("id", id).await
    }

    /// Barcode scans resolve through here.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        self.fetch_one_by("sku", sku).await
    }

    /// Fails with [`DbError::UniqueViolation`] when the SKU is taken.
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, price_cents, tax_rate_bps,
                stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.tax_rate_bps)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Current stock level.
    pub async fn stock(&self, id: &str) -> DbResult<Quantity> {
        let stock: Option<Quantity> =
            sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        stock.ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Active products only.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// `NotFound` when no product has this id.
    pub async fn tx_adjust_stock(
        conn: &mut SqliteConnection,
        id: &str,
        delta: Quantity,
    ) -> DbResult<()> {
        debug!(product_id = %id, delta = %delta, "Adjusting stock");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }
}

pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = test_support::db().await;
        let product = test_support::product(&db, "RICE-1KG", 6000, 10).await;

        let by_id = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(by_id.sku, "RICE-1KG");
        assert_eq!(by_id.stock, Quantity::from_units(10));

        let by_sku = db.products().get_by_sku("RICE-1KG").await.unwrap().unwrap();
        assert_eq!(by_sku.id, product.id);
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = test_support::db().await;
        let product = test_support::product(&db, "DUP", 100, 1).await;

        let mut again = product.clone();
        again.id = generate_product_id();
        let err = db.products().insert(&again).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_adjust_stock_allows_negative() {
        let db = test_support::db().await;
        let product = test_support::product(&db, "OIL", 15000, 1).await;

        let mut tx = db.begin().await.unwrap();
        ProductRepository::tx_adjust_stock(&mut tx, &product.id, Quantity::from_milli(-2500))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            db.products().stock(&product.id).await.unwrap(),
            Quantity::from_milli(-1500)
        );
    }

    #[tokio::test]
    async fn test_adjust_unknown_product() {
        let db = test_support::db().await;
        let mut tx = db.begin().await.unwrap();
        let err = ProductRepository::tx_adjust_stock(&mut tx, "missing", Quantity::from_units(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
