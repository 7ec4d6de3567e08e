//! # Cart Aggregate
//!
//! The working cart a cashier builds before settlement.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Register Action           Cart Method            State Change          │
//! │  ───────────────           ───────────            ────────────          │
//! │                                                                         │
//! │  Scan / pick product ─────► add() ──────────────► push or merge qty     │
//! │                                                                         │
//! │  Customer returns item ───► add_return() ───────► push or merge −qty   │
//! │                                                                         │
//! │  Change quantity ─────────► set_quantity() ─────► clamp to 0.001        │
//! │                                                                         │
//! │  Remove line ─────────────► remove() ───────────► lines.retain(..)      │
//! │                                                                         │
//! │  Pay ─────────────────────► snapshot() ─────────► handed to the engine  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A line's quantity is never exactly zero. Return lines carry a negative
//! quantity so the same `stock − quantity` rule puts goods back on the shelf.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::tax::{LineTax, SettlementTotals};
use crate::types::{Product, TaxRate};
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

// =============================================================================
// Cart Line
// =============================================================================

/// A product in the cart with its price frozen at the time it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,

    /// SKU at time of adding (frozen)
    pub sku: String,

    /// Product name at time of adding (frozen)
    pub name: String,

    /// Unit price at time of adding (frozen)
    pub unit_price: Money,

    pub tax_rate: TaxRate,

    /// Signed; negative for a returned item.
    pub quantity: Quantity,
}

impl CartLine {
    /// Freezes the product's current price and rate into a line.
    pub fn from_product(product: &Product, quantity: Quantity) -> Self {
        CartLine {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price: product.price(),
            tax_rate: product.tax_rate(),
            quantity,
        }
    }

    /// Unit price × quantity.
    #[inline]
    pub fn amount(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    #[inline]
    pub fn is_return(&self) -> bool {
        self.quantity.milli() < 0
    }

    pub fn tax(&self, tax_inclusive: bool) -> LineTax {
        LineTax::compute(self.amount(), self.tax_rate, tax_inclusive)
    }
}

/// Which of a product's two possible lines an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum LineKind {
    Sale,
    Return,
}

impl LineKind {
    fn matches(self, line: &CartLine) -> bool {
        line.is_return() == (self == LineKind::Return)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The working cart.
///
/// ## Invariants
/// - At most one sale line and one return line per `product_id`; adding
///   again merges quantity
/// - Every quantity magnitude is at least [`Quantity::EPSILON`]
/// - At most [`MAX_CART_LINES`] lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Cart {
    pub lines: Vec<CartLine>,

    /// Customer the cart is being built for, if any.
    pub customer_id: Option<String>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a product, or increases the quantity if it is already a sale line.
    pub fn add(&mut self, product: &Product, quantity: Quantity) -> CoreResult<()> {
        self.merge(product, LineKind::Sale, quantity.at_least_epsilon())
    }

    /// Adds a returned item as a negative line, merging with an existing
    /// return line for the product.
    pub fn add_return(&mut self, product: &Product, quantity: Quantity) -> CoreResult<()> {
        self.merge(product, LineKind::Return, quantity.at_least_epsilon())
    }

    /// Sets the quantity of the product's sale or return line, clamped to the
    /// smallest positive magnitude. A return line keeps its sign.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::cart::{Cart, CartLine, LineKind};
    /// use till_core::{Money, Quantity, TaxRate};
    ///
    /// let mut cart = Cart::new();
    /// cart.lines.push(CartLine {
    ///     product_id: "p-1".into(),
    ///     sku: "RICE-1KG".into(),
    ///     name: "Rice".into(),
    ///     unit_price: Money::from_cents(6000),
    ///     tax_rate: TaxRate::from_bps(500),
    ///     quantity: Quantity::from_units(1),
    /// });
    ///
    /// cart.set_quantity("p-1", LineKind::Sale, Quantity::zero()).unwrap();
    /// assert_eq!(cart.lines[0].quantity, Quantity::EPSILON);
    /// ```
    pub fn set_quantity(
        &mut self,
        product_id: &str,
        kind: LineKind,
        quantity: Quantity,
    ) -> CoreResult<()> {
        let magnitude = quantity.at_least_epsilon();
        check_max(magnitude)?;

        let line = self
            .find_mut(product_id, kind)
            .ok_or_else(|| CoreError::LineNotInCart(product_id.to_string()))?;
        line.quantity = signed(kind, magnitude);
        Ok(())
    }

    /// Removes every line for the product, sale and return alike.
    pub fn remove(&mut self, product_id: &str) -> CoreResult<()> {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);

        if self.lines.len() == before {
            Err(CoreError::LineNotInCart(product_id.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.customer_id = None;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[inline]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Σ quantity across lines (returns subtract).
    pub fn total_quantity(&self) -> Quantity {
        self.lines
            .iter()
            .fold(Quantity::zero(), |acc, l| acc + l.quantity)
    }

    /// Header totals the engine would settle this cart for.
    pub fn totals(&self, tax_inclusive: bool, discount: Money, is_inter_state: bool) -> SettlementTotals {
        let taxes: Vec<LineTax> = self.lines.iter().map(|l| l.tax(tax_inclusive)).collect();
        SettlementTotals::from_lines(&taxes, discount, is_inter_state)
    }

    fn find_mut(&mut self, product_id: &str, kind: LineKind) -> Option<&mut CartLine> {
        self.lines
            .iter_mut()
            .find(|l| l.product_id == product_id && kind.matches(l))
    }

    fn merge(&mut self, product: &Product, kind: LineKind, magnitude: Quantity) -> CoreResult<()> {
        if let Some(line) = self.find_mut(&product.id, kind) {
            let merged = line.quantity.abs() + magnitude;
            check_max(merged)?;
            line.quantity = signed(kind, merged);
            return Ok(());
        }

        check_max(magnitude)?;
        self.push(CartLine::from_product(product, signed(kind, magnitude)))
    }

    fn push(&mut self, line: CartLine) -> CoreResult<()> {
        if self.lines.len() >= MAX_CART_LINES {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_LINES,
            });
        }
        self.lines.push(line);
        Ok(())
    }
}

fn signed(kind: LineKind, magnitude: Quantity) -> Quantity {
    match kind {
        LineKind::Sale => magnitude,
        LineKind::Return => -magnitude,
    }
}

fn check_max(quantity: Quantity) -> CoreResult<()> {
    if quantity > MAX_LINE_QUANTITY {
        return Err(CoreError::QuantityTooLarge {
            requested: quantity,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
