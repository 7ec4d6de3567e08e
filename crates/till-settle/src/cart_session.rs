//! # Cart Session
//!
//! The register's working cart, owned by whoever builds the engine and passed
//! in explicitly. Every mutation is written through to a [`CartStore`] so a
//! crash or restart resumes with the same cart.
//!
//! ## Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Session Operations                              │
//! │                                                                         │
//! │  Cashier Action           CartSession             Store                 │
//! │  ──────────────           ───────────             ─────                 │
//! │                                                                         │
//! │  Scan product ──────────► add() ────────────────► save(cart)           │
//! │  Scan return ───────────► add_return() ─────────► save(cart)           │
//! │  Change quantity ───────► set_quantity() ───────► save(cart)           │
//! │  Remove line ───────────► remove() ─────────────► save(cart)           │
//! │  Attach customer ───────► set_customer() ───────► save(cart)           │
//! │  Settled / abandoned ───► clear() ──────────────► clear()              │
//! │                                                                         │
//! │  Restart ───────────────► restore() ◄───────────── load()              │
//! │                                                                         │
//! │  NOTE: The cart lock is held across the save, so the stored copy        │
//! │        never lags behind a later mutation.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::SettleResult;
use till_core::cart::{Cart, LineKind};
use till_core::{Product, Quantity};
use till_db::{Database, WorkingCartRepository};

// =============================================================================
// Store
// =============================================================================

/// Where the working cart survives restarts.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn save(&self, cart: &Cart) -> SettleResult<()>;
    async fn load(&self) -> SettleResult<Option<Cart>>;
    async fn clear(&self) -> SettleResult<()>;
}

/// Keeps the cart in the `working_carts` table, one row per register.
#[derive(Debug, Clone)]
pub struct SqliteCartStore {
    repo: WorkingCartRepository,
    register_id: String,
}

impl SqliteCartStore {
    pub fn new(db: &Database, register_id: impl Into<String>) -> Self {
        SqliteCartStore {
            repo: db.working_carts(),
            register_id: register_id.into(),
        }
    }
}

#[async_trait]
impl CartStore for SqliteCartStore {
    async fn save(&self, cart: &Cart) -> SettleResult<()> {
        self.repo.save(&self.register_id, cart).await?;
        Ok(())
    }

    async fn load(&self) -> SettleResult<Option<Cart>> {
        Ok(self.repo.load(&self.register_id).await?)
    }

    async fn clear(&self) -> SettleResult<()> {
        self.repo.clear(&self.register_id).await?;
        Ok(())
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    cart: Mutex<Option<Cart>>,
}

impl MemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn save(&self, cart: &Cart) -> SettleResult<()> {
        *self.cart.lock().await = Some(cart.clone());
        Ok(())
    }

    async fn load(&self) -> SettleResult<Option<Cart>> {
        Ok(self.cart.lock().await.clone())
    }

    async fn clear(&self) -> SettleResult<()> {
        *self.cart.lock().await = None;
        Ok(())
    }
}

// =============================================================================
// Session
// =============================================================================

pub struct CartSession {
    cart: Mutex<Cart>,
    store: Arc<dyn CartStore>,
}

impl CartSession {
    /// Starts with an empty cart. Whatever the store held is left alone until
    /// the first mutation overwrites it.
    pub fn new(store: Arc<dyn CartStore>) -> Self {
        CartSession {
            cart: Mutex::new(Cart::new()),
            store,
        }
    }

    /// Resumes the last saved cart, or starts empty.
    pub async fn restore(store: Arc<dyn CartStore>) -> SettleResult<Self> {
        let cart = store.load().await?.unwrap_or_default();

        if !cart.is_empty() {
            info!(lines = cart.line_count(), "Restored working cart");
        }

        Ok(CartSession {
            cart: Mutex::new(cart),
            store,
        })
    }

    pub async fn add(&self, product: &Product, quantity: Quantity) -> SettleResult<Cart> {
        debug!(product_id = %product.id, quantity = %quantity, "Cart add");
        self.mutate(|cart| cart.add(product, quantity)).await
    }

    pub async fn add_return(&self, product: &Product, quantity: Quantity) -> SettleResult<Cart> {
        debug!(product_id = %product.id, quantity = %quantity, "Cart return");
        self.mutate(|cart| cart.add_return(product, quantity)).await
    }

    pub async fn set_quantity(
        &self,
        product_id: &str,
        kind: LineKind,
        quantity: Quantity,
    ) -> SettleResult<Cart> {
        self.mutate(|cart| cart.set_quantity(product_id, kind, quantity))
            .await
    }

    pub async fn remove(&self, product_id: &str) -> SettleResult<Cart> {
        self.mutate(|cart| cart.remove(product_id)).await
    }

    pub async fn set_customer(&self, customer_id: Option<String>) -> SettleResult<Cart> {
        self.mutate(|cart| {
            cart.customer_id = customer_id;
            Ok(())
        })
        .await
    }

    /// Empties the cart and drops the stored copy.
    pub async fn clear(&self) -> SettleResult<()> {
        let mut cart = self.cart.lock().await;
        cart.clear();
        self.store.clear().await?;
        Ok(())
    }

    /// Copy of the current cart.
    pub async fn snapshot(&self) -> Cart {
        self.cart.lock().await.clone()
    }

    /// Applies `f` and saves. A failed mutation leaves cart and store untouched.
    async fn mutate<F>(&self, f: F) -> SettleResult<Cart>
    where
        F: FnOnce(&mut Cart) -> till_core::CoreResult<()>,
    {
        let mut cart = self.cart.lock().await;
        let mut next = cart.clone();
        f(&mut next)?;

        self.store.save(&next).await?;
        *cart = next;
        Ok(cart.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use till_core::{CoreError, TaxRate};
    use till_db::DbConfig;

    fn product(id: &str) -> Product {
        Product {
            id: id.into(),
            sku: format!("SKU-{}", id),
            name: format!("Item {}", id),
            price_cents: 10000,
            tax_rate_bps: TaxRate::from_bps(1800).bps(),
            stock: Quantity::from_units(10),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_mutations_are_saved() {
        let store = Arc::new(MemoryCartStore::new());
        let session = CartSession::new(store.clone());

        session.add(&product("a"), Quantity::from_units(2)).await.unwrap();
        session.add(&product("a"), Quantity::from_units(1)).await.unwrap();
        session.add_return(&product("b"), Quantity::from_units(1)).await.unwrap();

        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved.lines.len(), 2);
        assert_eq!(saved.lines[0].quantity, Quantity::from_units(3));
        assert_eq!(saved.lines[1].quantity, Quantity::from_units(-1));
    }

    #[tokio::test]
    async fn test_return_quantity_edit_is_saved() {
        let store = Arc::new(MemoryCartStore::new());
        let session = CartSession::new(store.clone());

        session.add(&product("b"), Quantity::from_units(2)).await.unwrap();
        session.add_return(&product("b"), Quantity::from_units(1)).await.unwrap();
        session
            .set_quantity("b", LineKind::Return, Quantity::from_units(4))
            .await
            .unwrap();

        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved.lines[0].quantity, Quantity::from_units(2));
        assert_eq!(saved.lines[1].quantity, Quantity::from_units(-4));
    }

    #[tokio::test]
    async fn test_failed_mutation_changes_nothing() {
        let store = Arc::new(MemoryCartStore::new());
        let session = CartSession::new(store.clone());
        session.add(&product("a"), Quantity::from_units(1)).await.unwrap();

        let err = session.remove("missing").await.unwrap_err();
        assert!(matches!(err, crate::SettleError::Core(CoreError::LineNotInCart(_))));
        assert_eq!(session.snapshot().await.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_restore_after_restart() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store: Arc<dyn CartStore> = Arc::new(SqliteCartStore::new(&db, "REG-1"));

        {
            let session = CartSession::new(store.clone());
            session.add(&product("a"), Quantity::from_milli(1500)).await.unwrap();
            session.set_customer(Some("cust-1".into())).await.unwrap();
        }

        let resumed = CartSession::restore(store.clone()).await.unwrap();
        let cart = resumed.snapshot().await;
        assert_eq!(cart.lines[0].quantity, Quantity::from_milli(1500));
        assert_eq!(cart.customer_id.as_deref(), Some("cust-1"));

        resumed.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
