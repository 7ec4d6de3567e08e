//! # till-core: Pure Business Logic for Till POS
//!
//! Everything a settlement needs to decide, with nothing it needs to do.
//! Arithmetic, tax, the working cart, document-number formatting and
//! voucher construction live here; persistence lives in `till-db` and
//! orchestration in `till-settle`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Register (caller)                               │   │
//! │  │     scan ──► CartSession ──► finalize_sale ──► receipt          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               till-settle (SettlementEngine, outbox)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ │   │
//! │  │   │  money  │ │   tax   │ │  cart   │ │ sequence │ │accounting│ │   │
//! │  │   │quantity │ │TaxSplit │ │CartLine │ │ BILL-... │ │ Voucher │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └─────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Bill, Tender, LedgerEntry, ...)
//! - [`money`] - Money in minor units and the shared rounding rule
//! - [`quantity`] - Fractional quantities in thousandths
//! - [`tax`] - Line tax, tax split and settlement totals
//! - [`cart`] - The working cart aggregate
//! - [`sequence`] - Document number formatting
//! - [`accounting`] - Chart of accounts and voucher builders
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::tax::LineTax;
//! use till_core::{Money, TaxRate};
//!
//! let line = LineTax::compute(Money::from_cents(11800), TaxRate::from_bps(1800), true);
//! assert_eq!(line.taxable.cents(), 10000);
//! assert_eq!(line.tax.cents(), 1800);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod accounting;
pub mod cart;
pub mod error;
pub mod money;
pub mod quantity;
pub mod sequence;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, LineKind};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use quantity::Quantity;
pub use sequence::DocumentKind;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity on a single line (999 units).
///
/// Catches a weight keyed in grams where kilograms were meant.
pub const MAX_LINE_QUANTITY: Quantity = Quantity::from_units(999);
