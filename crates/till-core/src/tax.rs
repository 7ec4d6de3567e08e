//! # Tax Module
//!
//! Line tax computation and the jurisdiction split of a bill's total tax.
//!
//! ## Inclusive vs Exclusive
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  price 118.00, qty 1, rate 18%                                          │
//! │                                                                         │
//! │  EXCLUSIVE (price is before tax)                                        │
//! │    taxable = 118.00                                                     │
//! │    tax     = 118.00 × 1800 / 10000             = 21.24                  │
//! │    gross   = 139.24                                                     │
//! │                                                                         │
//! │  INCLUSIVE (price already contains tax)                                 │
//! │    taxable = 118.00 × 10000 / (10000 + 1800)   = 100.00                 │
//! │    tax     = 118.00 − 100.00                   = 18.00                  │
//! │    gross   = 118.00                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Jurisdiction Split
//! Intra-state sales carry two symmetric components (CGST + SGST), each half
//! of the total tax. Inter-state sales carry a single IGST component. A bill
//! never carries both.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{div_round, Money};
use crate::types::{BillStatus, TaxRate};

const BPS_DENOMINATOR: i128 = 10_000;

// =============================================================================
// Line Tax
// =============================================================================

/// Tax breakdown of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineTax {
    /// Unit price × quantity, as entered.
    pub amount: Money,
    /// Tax-exclusive value.
    pub taxable: Money,
    pub tax: Money,
}

impl LineTax {
    /// Computes the taxable value and tax for a line amount.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::tax::LineTax;
    /// use till_core::{Money, TaxRate};
    ///
    /// let rate = TaxRate::from_bps(1800);
    /// let inclusive = LineTax::compute(Money::from_cents(11800), rate, true);
    /// assert_eq!(inclusive.taxable.cents(), 10000);
    /// assert_eq!(inclusive.tax.cents(), 1800);
    ///
    /// let exclusive = LineTax::compute(Money::from_cents(11800), rate, false);
    /// assert_eq!(exclusive.taxable.cents(), 11800);
    /// assert_eq!(exclusive.tax.cents(), 2124);
    /// ```
    pub fn compute(amount: Money, rate: TaxRate, tax_inclusive: bool) -> Self {
        let bps = rate.bps() as i128;
        let cents = amount.cents() as i128;

        if tax_inclusive {
            let taxable = Money::from_cents(div_round(
                cents * BPS_DENOMINATOR,
                BPS_DENOMINATOR + bps,
            ));
            LineTax {
                amount,
                taxable,
                tax: amount - taxable,
            }
        } else {
            LineTax {
                amount,
                taxable: amount,
                tax: Money::from_cents(div_round(cents * bps, BPS_DENOMINATOR)),
            }
        }
    }

    /// What the customer pays for the line before bill discount.
    #[inline]
    pub fn gross(&self) -> Money {
        self.taxable + self.tax
    }
}

// =============================================================================
// Tax Split
// =============================================================================

/// The three tax components of a bill header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TaxSplit {
    pub cgst: Money,
    pub sgst: Money,
    pub igst: Money,
}

impl TaxSplit {
    /// Splits the total tax for one jurisdiction mode.
    ///
    /// Odd totals put the extra minor unit on SGST so the halves sum back
    /// exactly.
    pub fn split(total: Money, is_inter_state: bool) -> Self {
        if is_inter_state {
            TaxSplit {
                cgst: Money::zero(),
                sgst: Money::zero(),
                igst: total,
            }
        } else {
            let (cgst, sgst) = total.halves();
            TaxSplit {
                cgst,
                sgst,
                igst: Money::zero(),
            }
        }
    }

    pub fn total(&self) -> Money {
        self.cgst + self.sgst + self.igst
    }

    /// True when only one jurisdiction mode is populated.
    pub fn is_exclusive(&self) -> bool {
        self.igst.is_zero() || (self.cgst.is_zero() && self.sgst.is_zero())
    }
}

// =============================================================================
// Settlement Totals
// =============================================================================

/// Header figures for a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SettlementTotals {
    /// Σ line amounts (price × quantity). Exclusive-mode tax is reported in
    /// `tax` and is not folded in.
    pub subtotal: Money,
    pub tax: TaxSplit,
    pub discount: Money,
    /// `subtotal − discount`, signed. Negative for a net return.
    pub net: Money,
    /// `max(0, net)`.
    pub grand_total: Money,
}

impl SettlementTotals {
    /// Folds line taxes into header totals.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::tax::{LineTax, SettlementTotals};
    /// use till_core::{Money, TaxRate};
    ///
    /// let line = LineTax::compute(Money::from_cents(20000), TaxRate::from_bps(1800), true);
    /// let totals = SettlementTotals::from_lines(&[line], Money::from_cents(500), false);
    /// assert_eq!(totals.subtotal.cents(), 20000);
    /// assert_eq!(totals.grand_total.cents(), 19500);
    /// ```
    pub fn from_lines(lines: &[LineTax], discount: Money, is_inter_state: bool) -> Self {
        let subtotal: Money = lines.iter().map(|l| l.amount).sum();
        let total_tax: Money = lines.iter().map(|l| l.tax).sum();
        let net = subtotal - discount;

        SettlementTotals {
            subtotal,
            tax: TaxSplit::split(total_tax, is_inter_state),
            discount,
            net,
            grand_total: net.floor_zero(),
        }
    }

    /// PAID, or REFUNDED when returns outweigh sales.
    pub fn status(&self) -> BillStatus {
        BillStatus::from_net(self.net)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
