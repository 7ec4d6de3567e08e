//! # Document Numbers
//!
//! Formatting for date-scoped document numbers.
//!
//! ```text
//!   BILL-20261015-0001
//!   ──── ──────── ────
//!    │      │      └── ordinal: count of today's documents + 1, 4 digits
//!    │      └───────── local business date
//!    └──────────────── prefix per document kind (BILL, PO, EST)
//! ```
//!
//! Counting existing documents is I/O and lives in till-db; this module only
//! builds and parses the strings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

/// Kinds of numbered documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum DocumentKind {
    Bill,
    PurchaseOrder,
    Estimate,
}

impl DocumentKind {
    pub const fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Bill => "BILL",
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::Estimate => "EST",
        }
    }
}

/// `"BILL-20261015-"`: every number issued for `kind` on `date` starts with this.
pub fn date_prefix(kind: DocumentKind, date: NaiveDate) -> String {
    format!("{}-{}-", kind.prefix(), date.format("%Y%m%d"))
}

/// Formats the number for the `ordinal`-th document of the day.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use till_core::sequence::{format_number, DocumentKind};
///
/// let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
/// assert_eq!(format_number(DocumentKind::Bill, date, 1), "BILL-20261015-0001");
/// assert_eq!(format_number(DocumentKind::Estimate, date, 12), "EST-20261015-0012");
/// ```
pub fn format_number(kind: DocumentKind, date: NaiveDate, ordinal: u32) -> String {
    format!("{}{:04}", date_prefix(kind, date), ordinal)
}

/// Splits a document number back into kind, date and ordinal.
pub fn parse_number(number: &str) -> Result<(DocumentKind, NaiveDate, u32), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "document number".to_string(),
        reason: reason.to_string(),
    };

    let mut parts = number.splitn(3, '-');
    let (Some(prefix), Some(date), Some(ordinal)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid("expected PREFIX-YYYYMMDD-NNNN"));
    };

    let kind = match prefix {
        "BILL" => DocumentKind::Bill,
        "PO" => DocumentKind::PurchaseOrder,
        "EST" => DocumentKind::Estimate,
        _ => return Err(invalid("unknown prefix")),
    };
    let date = NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| invalid("bad date"))?;
    let ordinal = ordinal.parse::<u32>().map_err(|_| invalid("bad ordinal"))?;

    Ok((kind, date, ordinal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(date_prefix(DocumentKind::Bill, day()), "BILL-20260105-");
        assert_eq!(date_prefix(DocumentKind::PurchaseOrder, day()), "PO-20260105-");
        assert_eq!(date_prefix(DocumentKind::Estimate, day()), "EST-20260105-");
    }

    #[test]
    fn test_ordinal_padding_grows_past_four_digits() {
        assert_eq!(format_number(DocumentKind::Bill, day(), 9999), "BILL-20260105-9999");
        assert_eq!(format_number(DocumentKind::Bill, day(), 10000), "BILL-20260105-10000");
    }

    #[test]
    fn test_parse_number() {
        let (kind, date, ordinal) = parse_number("PO-20260105-0042").unwrap();
        assert_eq!(kind, DocumentKind::PurchaseOrder);
        assert_eq!(date, day());
        assert_eq!(ordinal, 42);

        assert!(parse_number("BILL-2026-01").is_err());
        assert!(parse_number("INV-20260105-0001").is_err());
        assert!(parse_number("garbage").is_err());
    }
}
