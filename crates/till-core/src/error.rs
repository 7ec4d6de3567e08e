//! Errors raised by the pure cart and settlement rules.
//!
//! `ValidationError` is about a single input field; `CoreError` is about the
//! cart as a whole and absorbs field errors via `?`. The database layer and
//! the settlement engine wrap these in their own types.

use thiserror::Error;

use crate::quantity::Quantity;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Product {0} is not in the cart")]
    LineNotInCart(String),

    #[error("Cart is full ({max} lines)")]
    CartTooLarge { max: usize },

    /// Usually a weight keyed in grams instead of kilograms.
    #[error("Quantity {requested} is above the {max} line limit")]
    QuantityTooLarge { requested: Quantity, max: Quantity },

    #[error("Cannot settle an empty cart")]
    EmptyCart,

    #[error("Settlement needs at least one tender")]
    NoTenders,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// The field at fault, when the error came from field validation.
    pub fn field(&self) -> Option<&str> {
        match self {
            CoreError::Validation(v) => Some(v.field()),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} is longer than {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be within {min}..={max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be greater than zero")]
    MustBePositive { field: String },

    /// e.g. a document number that is not `PREFIX-YYYYMMDD-NNNN`.
    #[error("{field} is malformed: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::InvalidFormat { field, .. } => field,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_limit_message_uses_three_decimals() {
        let err = CoreError::QuantityTooLarge {
            requested: Quantity::from_units(1500),
            max: Quantity::from_units(999),
        };
        assert_eq!(
            err.to_string(),
            "Quantity 1500.000 is above the 999.000 line limit"
        );
    }

    #[test]
    fn test_field_errors_pass_through_unchanged() {
        let err: CoreError = ValidationError::MustBePositive {
            field: "amount".to_string(),
        }
        .into();

        assert_eq!(err.to_string(), "amount must be greater than zero");
        assert_eq!(err.field(), Some("amount"));
        assert_eq!(CoreError::EmptyCart.field(), None);
    }
}
