//! # Domain Types
//!
//! Core domain types used throughout Till POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Bill       │   │   BillTender    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (INTEGER)   │   │  bill_id (FK)   │       │
//! │  │  sku            │   │  number         │   │  mode           │       │
//! │  │  price_cents    │   │  cgst/sgst/igst │   │  amount_cents   │       │
//! │  │  stock (milli)  │   │  status         │   └─────────────────┘       │
//! │  └─────────────────┘   └────────┬────────┘                              │
//! │                                 │ 1..n                                  │
//! │                        ┌────────▼────────┐   ┌─────────────────┐       │
//! │                        │    BillLine     │   │  LedgerEntry    │       │
//! │                        │  taxable_cents  │   │  direction      │       │
//! │                        │  tax_cents      │   │  balance_after  │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Master data (products, customers, suppliers) uses UUID v4 strings.
//! Transactional rows (bills, lines, tenders, ledger and cash rows) use
//! INTEGER keys returned by the insert itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::quantity::Quantity;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1800 bps = 18%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Selling price in minor units.
    pub price_cents: i64,

    /// Tax rate in basis points (1800 = 18%).
    pub tax_rate_bps: u32,

    /// Current stock in thousandths. May be negative (oversell is allowed).
    pub stock: Quantity,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

// =============================================================================
// Tender
// =============================================================================

/// How a tender was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum TenderMode {
    /// Physical cash into the drawer.
    Cash,
    /// Card on an external terminal.
    Card,
    /// UPI / wallet transfer.
    Wallet,
    /// Store credit: the customer owes the amount (posted to their ledger).
    Credit,
}

impl TenderMode {
    /// Whether this tender moves cash in the drawer.
    #[inline]
    pub const fn is_cash(&self) -> bool {
        matches!(self, TenderMode::Cash)
    }

    /// Whether this tender is store credit.
    #[inline]
    pub const fn is_credit(&self) -> bool {
        matches!(self, TenderMode::Credit)
    }
}

/// One payment instrument and amount within a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Tender {
    pub mode: TenderMode,
    pub amount: Money,
}

impl Tender {
    pub fn new(mode: TenderMode, amount: Money) -> Self {
        Tender { mode, amount }
    }

    pub fn cash(amount: Money) -> Self {
        Tender::new(TenderMode::Cash, amount)
    }
}

/// The payment mode recorded on the bill header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PaymentMode {
    Cash,
    Card,
    Wallet,
    Credit,
    /// More than one tender.
    Split,
}

impl PaymentMode {
    /// The single tender's mode, or `Split` when there is more than one.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::{Money, PaymentMode, Tender, TenderMode};
    ///
    /// let one = [Tender::new(TenderMode::Card, Money::from_cents(100))];
    /// assert_eq!(PaymentMode::for_tenders(&one), PaymentMode::Card);
    ///
    /// let two = [
    ///     Tender::new(TenderMode::Card, Money::from_cents(100)),
    ///     Tender::new(TenderMode::Cash, Money::from_cents(100)),
    /// ];
    /// assert_eq!(PaymentMode::for_tenders(&two), PaymentMode::Split);
    /// ```
    pub fn for_tenders(tenders: &[Tender]) -> Self {
        match tenders {
            [single] => single.mode.into(),
            _ => PaymentMode::Split,
        }
    }
}

impl From<TenderMode> for PaymentMode {
    fn from(mode: TenderMode) -> Self {
        match mode {
            TenderMode::Cash => PaymentMode::Cash,
            TenderMode::Card => PaymentMode::Card,
            TenderMode::Wallet => PaymentMode::Wallet,
            TenderMode::Credit => PaymentMode::Credit,
        }
    }
}

// =============================================================================
// Bill
// =============================================================================

/// Lifecycle status of a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum BillStatus {
    Paid,
    Refunded,
    Cancelled,
    PartialReturn,
    Returned,
}

impl BillStatus {
    /// Status derived from the signed net amount of a settlement.
    ///
    /// A negative net (return lines outweighing sale lines) is a refund.
    pub fn from_net(net: Money) -> Self {
        if net.is_negative() {
            BillStatus::Refunded
        } else {
            BillStatus::Paid
        }
    }
}

/// Channel the sale came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum OrderType {
    #[default]
    Counter,
    Takeaway,
    Delivery,
    Wholesale,
}

/// A finalized sale header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Bill {
    pub id: i64,
    /// `BILL-YYYYMMDD-NNNN`, unique.
    pub number: String,
    pub subtotal_cents: i64,
    /// Symmetric half (intra-state).
    pub cgst_cents: i64,
    /// Symmetric half (intra-state).
    pub sgst_cents: i64,
    /// Asymmetric component (inter-state).
    pub igst_cents: i64,
    pub discount_cents: i64,
    pub grand_total_cents: i64,
    pub points_earned: i64,
    pub points_redeemed: i64,
    pub customer_id: Option<String>,
    pub payment_mode: PaymentMode,
    pub status: BillStatus,
    pub order_type: OrderType,
    pub tax_inclusive: bool,
    pub is_inter_state: bool,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    /// Total tax across the three components.
    pub fn tax_cents(&self) -> i64 {
        self.cgst_cents + self.sgst_cents + self.igst_cents
    }

    pub fn grand_total(&self) -> Money {
        Money::from_cents(self.grand_total_cents)
    }
}

/// A persisted bill line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BillLine {
    pub id: i64,
    pub bill_id: i64,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    pub quantity: Quantity,
    /// Unit price at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Unit price × quantity.
    pub line_amount_cents: i64,
    /// Tax-exclusive value of the line.
    pub taxable_cents: i64,
    pub tax_rate_bps: u32,
    pub tax_cents: i64,
}

/// A persisted tender row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BillTender {
    pub id: i64,
    pub bill_id: i64,
    pub mode: TenderMode,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A bill with its lines and tenders, as returned by the lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleRecord {
    pub bill: Bill,
    pub items: Vec<BillLine>,
    pub tenders: Vec<BillTender>,
}

/// Caller-supplied settlement options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct SaleOptions {
    pub customer_id: Option<String>,
    pub discount: Money,
    /// Line prices already include tax.
    pub tax_inclusive: bool,
    /// Sale crosses a jurisdiction boundary: single asymmetric tax component.
    pub is_inter_state: bool,
    pub order_type: OrderType,
    pub notes: Option<String>,
    pub points_earned: i64,
    pub points_redeemed: i64,
}

// =============================================================================
// Parties and Ledgers
// =============================================================================

/// Which ledger a party lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PartyKind {
    /// Balance = what the customer owes us.
    Customer,
    /// Balance = what we owe the supplier.
    Supplier,
}

/// Direction of a ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Direction {
    Debit,
    Credit,
}

impl Direction {
    /// Signed effect of this direction on a party's balance.
    ///
    /// The two ledgers are not mirror images:
    /// ```text
    ///              DEBIT        CREDIT
    /// Customer     +amount      -amount    (balance = owed to us)
    /// Supplier     -amount      +amount    (balance = owed by us)
    /// ```
    pub fn signed_for(&self, party: PartyKind, amount: Money) -> Money {
        match (party, self) {
            (PartyKind::Customer, Direction::Debit) => amount,
            (PartyKind::Customer, Direction::Credit) => -amount,
            (PartyKind::Supplier, Direction::Debit) => -amount,
            (PartyKind::Supplier, Direction::Credit) => amount,
        }
    }
}

/// A customer account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    /// Outstanding credit. Always equals the latest ledger snapshot.
    pub balance_cents: i64,
    pub loyalty_points: i64,
    pub total_purchases_cents: i64,
    #[ts(as = "Option<String>")]
    pub last_visit_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A supplier account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    /// What we owe. Always equals the latest ledger snapshot.
    pub balance_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// An append-only ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LedgerEntry {
    pub id: i64,
    pub party_id: String,
    pub direction: Direction,
    pub amount_cents: i64,
    pub balance_after_cents: i64,
    pub description: String,
    /// Originating document number, if any.
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Cash Drawer
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum SessionStatus {
    Open,
    Closed,
}

/// A bounded period of tracked drawer movements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CashSession {
    pub id: i64,
    pub status: SessionStatus,
    pub opening_float_cents: i64,
    pub counted_cents: Option<i64>,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum CashTxKind {
    Opening,
    Sale,
    Refund,
    Payout,
    Drop,
    Closing,
}

/// A drawer movement. Amounts are unsigned; the kind carries the direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CashTransaction {
    pub id: i64,
    pub session_id: i64,
    pub kind: CashTxKind,
    pub amount_cents: i64,
    pub reason: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Expected drawer position for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionSummary {
    pub opening: Money,
    pub sales: Money,
    pub refunds: Money,
    pub payouts: Money,
    pub drops: Money,
}

impl SessionSummary {
    /// Folds one movement into the summary. Closing counts are not movements.
    pub fn apply(&mut self, kind: CashTxKind, amount: Money) {
        match kind {
            CashTxKind::Opening => self.opening += amount,
            CashTxKind::Sale => self.sales += amount,
            CashTxKind::Refund => self.refunds += amount,
            CashTxKind::Payout => self.payouts += amount,
            CashTxKind::Drop => self.drops += amount,
            CashTxKind::Closing => {}
        }
    }

    /// Cash that should be in the drawer.
    pub fn expected(&self) -> Money {
        self.opening + self.sales - self.refunds - self.payouts - self.drops
    }
}

// =============================================================================
// Purchases and Estimates
// =============================================================================

/// One received line on a purchase order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PurchaseLine {
    pub product_id: String,
    pub quantity: Quantity,
    pub unit_cost: Money,
}

impl PurchaseLine {
    pub fn amount(&self) -> Money {
        self.unit_cost.times(self.quantity)
    }
}

/// A persisted purchase order header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PurchaseOrder {
    pub id: i64,
    pub number: String,
    pub supplier_id: String,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A persisted estimate (quotation) header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Estimate {
    pub id: i64,
    pub number: String,
    pub customer_id: Option<String>,
    pub total_cents: i64,
    /// Cart lines as JSON.
    pub items_json: String,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Outbox
// =============================================================================

/// What an outbox row asks the background worker to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum OutboxTopic {
    /// Post the sale voucher to the journal.
    AccountingSale,
    /// Post the purchase voucher to the journal.
    AccountingPurchase,
    /// Push the sale to the external sync target.
    SaleSync,
}

/// An entry in the outbox queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OutboxEntry {
    pub id: String,
    pub topic: OutboxTopic,
    /// Document number the row is about.
    pub entity_id: String,
    /// JSON payload.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub attempted_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub processed_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_percentage() {
        assert_eq!(TaxRate::from_percentage(18.0).bps(), 1800);
        assert_eq!(TaxRate::from_percentage(2.5).bps(), 250);
    }

    #[test]
    fn test_payment_mode_single_and_split() {
        let card = Tender::new(TenderMode::Card, Money::from_cents(500));
        let cash = Tender::cash(Money::from_cents(500));
        assert_eq!(PaymentMode::for_tenders(&[cash]), PaymentMode::Cash);
        assert_eq!(PaymentMode::for_tenders(&[card, cash]), PaymentMode::Split);
    }

    #[test]
    fn test_status_from_net() {
        assert_eq!(BillStatus::from_net(Money::from_cents(-1)), BillStatus::Refunded);
        assert_eq!(BillStatus::from_net(Money::zero()), BillStatus::Paid);
        assert_eq!(BillStatus::from_net(Money::from_cents(100)), BillStatus::Paid);
    }

    #[test]
    fn test_direction_is_not_symmetric_across_parties() {
        let amt = Money::from_cents(1000);
        assert_eq!(Direction::Debit.signed_for(PartyKind::Customer, amt).cents(), 1000);
        assert_eq!(Direction::Credit.signed_for(PartyKind::Customer, amt).cents(), -1000);
        assert_eq!(Direction::Debit.signed_for(PartyKind::Supplier, amt).cents(), -1000);
        assert_eq!(Direction::Credit.signed_for(PartyKind::Supplier, amt).cents(), 1000);
    }

    #[test]
    fn test_session_summary_expected() {
        let mut summary = SessionSummary::default();
        summary.apply(CashTxKind::Opening, Money::from_cents(5000));
        summary.apply(CashTxKind::Sale, Money::from_cents(23600));
        summary.apply(CashTxKind::Refund, Money::from_cents(600));
        summary.apply(CashTxKind::Payout, Money::from_cents(1000));
        summary.apply(CashTxKind::Drop, Money::from_cents(20000));
        summary.apply(CashTxKind::Closing, Money::from_cents(7000));
        assert_eq!(summary.expected().cents(), 7000);
    }
}
