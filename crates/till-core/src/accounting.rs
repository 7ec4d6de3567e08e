//! # Accounting Vouchers
//!
//! Builds double-entry vouchers from settled documents. Posting them is the
//! outbox worker's job; this module only decides the lines.
//!
//! ## Sale Voucher
//! ```text
//! ┌──────────────────────────────┬──────────────┬──────────────┐
//! │ Account                      │ Debit        │ Credit       │
//! ├──────────────────────────────┼──────────────┼──────────────┤
//! │ Cash / Bank / AR (per tender)│ tender       │              │
//! │ Sales                        │              │ net − tax    │
//! │ Output Tax                   │              │ tax          │
//! │ AR (balancing)               │ shortfall    │ overpayment  │
//! └──────────────────────────────┴──────────────┴──────────────┘
//! ```
//! A net return flips every side. Zero lines are dropped.
//!
//! ## Purchase Voucher
//! Dr Inventory (total) / Cr Cash (paid) / Cr Accounts Payable (rest).

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Tender, TenderMode};

// =============================================================================
// Chart of Accounts
// =============================================================================

/// The fixed chart of accounts the engine posts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Account {
    Cash,
    Bank,
    AccountsReceivable,
    Inventory,
    InputTax,
    AccountsPayable,
    OutputTax,
    Sales,
    Purchases,
}

impl Account {
    pub const fn code(&self) -> &'static str {
        match self {
            Account::Cash => "1000",
            Account::Bank => "1010",
            Account::AccountsReceivable => "1100",
            Account::Inventory => "1200",
            Account::InputTax => "1300",
            Account::AccountsPayable => "2000",
            Account::OutputTax => "2100",
            Account::Sales => "4000",
            Account::Purchases => "5000",
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Account::Cash => "Cash in Hand",
            Account::Bank => "Bank",
            Account::AccountsReceivable => "Accounts Receivable",
            Account::Inventory => "Inventory",
            Account::InputTax => "Input Tax",
            Account::AccountsPayable => "Accounts Payable",
            Account::OutputTax => "Output Tax",
            Account::Sales => "Sales",
            Account::Purchases => "Purchases",
        }
    }

    /// Where money from a tender lands.
    pub const fn for_tender(mode: TenderMode) -> Self {
        match mode {
            TenderMode::Cash => Account::Cash,
            TenderMode::Card | TenderMode::Wallet => Account::Bank,
            TenderMode::Credit => Account::AccountsReceivable,
        }
    }

    /// All accounts, for seeding.
    pub const ALL: [Account; 9] = [
        Account::Cash,
        Account::Bank,
        Account::AccountsReceivable,
        Account::Inventory,
        Account::InputTax,
        Account::AccountsPayable,
        Account::OutputTax,
        Account::Sales,
        Account::Purchases,
    ];
}

// =============================================================================
// Voucher
// =============================================================================

/// One side of a journal line. Exactly one of `debit`/`credit` is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VoucherLine {
    pub account: Account,
    pub debit: Money,
    pub credit: Money,
}

impl VoucherLine {
    /// Positive amounts debit, negative amounts credit the absolute value.
    pub fn signed(account: Account, amount: Money) -> Self {
        if amount.is_negative() {
            VoucherLine {
                account,
                debit: Money::zero(),
                credit: amount.abs(),
            }
        } else {
            VoucherLine {
                account,
                debit: amount,
                credit: Money::zero(),
            }
        }
    }
}

/// A balanced journal voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Voucher {
    /// Document number the voucher was derived from.
    pub reference: String,
    pub narration: String,
    pub lines: Vec<VoucherLine>,
}

impl Voucher {
    fn new(reference: &str, narration: String) -> Self {
        Voucher {
            reference: reference.to_string(),
            narration,
            lines: Vec::new(),
        }
    }

    fn post(&mut self, account: Account, amount: Money) {
        if !amount.is_zero() {
            self.lines.push(VoucherLine::signed(account, amount));
        }
    }

    pub fn total_debit(&self) -> Money {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn total_credit(&self) -> Money {
        self.lines.iter().map(|l| l.credit).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debit() == self.total_credit()
    }

    /// Voucher for a settled sale.
    ///
    /// `net` is the signed `subtotal − discount`; `tax` the signed total tax.
    /// Tenders that do not add up to `net` are absorbed by a receivable line.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::accounting::Voucher;
    /// use till_core::{Money, Tender};
    ///
    /// let v = Voucher::for_sale(
    ///     "BILL-20261015-0001",
    ///     &[Tender::cash(Money::from_cents(11800))],
    ///     Money::from_cents(11800),
    ///     Money::from_cents(1800),
    /// );
    /// assert!(v.is_balanced());
    /// assert_eq!(v.total_debit().cents(), 11800);
    /// ```
    pub fn for_sale(number: &str, tenders: &[Tender], net: Money, tax: Money) -> Self {
        let mut voucher = Voucher::new(number, format!("Sale {}", number));

        for tender in tenders {
            voucher.post(Account::for_tender(tender.mode), tender.amount);
        }
        voucher.post(Account::Sales, -(net - tax));
        voucher.post(Account::OutputTax, -tax);

        let imbalance = voucher.total_debit() - voucher.total_credit();
        voucher.post(Account::AccountsReceivable, -imbalance);
        voucher
    }

    /// Voucher for a received purchase.
    pub fn for_purchase(number: &str, total: Money, paid: Money) -> Self {
        let mut voucher = Voucher::new(number, format!("Purchase {}", number));
        voucher.post(Account::Inventory, total);
        voucher.post(Account::Cash, -paid);
        voucher.post(Account::AccountsPayable, -(total - paid));
        voucher
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
