//! Request checks that run before any row is written.
//!
//! Only shape is checked here. Uniqueness, foreign keys and the one-open-
//! drawer rule are enforced by the schema. Tender sums are never compared
//! against the bill total: partial and over-payment are both legal.

use crate::cart::CartLine;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::{PurchaseLine, Tender};
use crate::MAX_LINE_QUANTITY;

pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_TAX_BPS: u32 = 10_000;

/// A cart can be settled when it has lines, at least one tender, and every
/// line carries a non-zero quantity and a sane tax rate.
///
/// ```rust
/// use till_core::validation::validate_settlement;
/// use till_core::{CoreError, Money, Tender};
///
/// let tenders = [Tender::cash(Money::from_cents(100))];
/// assert!(matches!(validate_settlement(&[], &tenders), Err(CoreError::EmptyCart)));
/// ```
pub fn validate_settlement(lines: &[CartLine], tenders: &[Tender]) -> CoreResult<()> {
    if lines.is_empty() {
        return Err(CoreError::EmptyCart);
    }
    if tenders.is_empty() {
        return Err(CoreError::NoTenders);
    }

    lines.iter().try_for_each(|line| {
        tax_rate(line.tax_rate.bps())?;
        // returns carry a negative quantity, so check the magnitude
        line_quantity(&line.sku, line.quantity.abs())
    })?;
    Ok(())
}

/// Goods receipt: non-empty, positive quantities, non-negative costs, and a
/// paid amount that is not negative (zero means fully on credit).
pub fn validate_purchase(lines: &[PurchaseLine], paid: Money) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "purchase lines".to_string(),
        });
    }

    for line in lines {
        line_quantity(&line.product_id, line.quantity)?;
        if line.unit_cost.is_negative() {
            return Err(ValidationError::OutOfRange {
                field: format!("unit cost of {}", line.product_id),
                min: 0,
                max: i64::MAX,
            });
        }
    }

    if paid.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "paid amount".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Payments, floats and payouts move money one way only.
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(ValidationError::MustBePositive {
            field: field.to_string(),
        })
    }
}

fn line_quantity(label: &str, magnitude: Quantity) -> ValidationResult<()> {
    if !magnitude.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: format!("quantity of {label}"),
        });
    }
    if magnitude > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: format!("quantity of {label} (milli)"),
            min: Quantity::EPSILON.milli(),
            max: MAX_LINE_QUANTITY.milli(),
        });
    }
    Ok(())
}

fn tax_rate(bps: u32) -> ValidationResult<()> {
    if bps > MAX_TAX_BPS {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: i64::from(MAX_TAX_BPS),
        });
    }
    Ok(())
}
