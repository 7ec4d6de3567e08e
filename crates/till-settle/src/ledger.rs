//! # Ledger Poster
//!
//! Appends to a party's running-balance ledger and moves the cached balance
//! with it, on the same connection.
//!
//! ```text
//!   balance_before ──► Direction::signed_for(kind, amount) ──► balance_after
//!                                                                  │
//!                       ┌──────────────────────────────────────────┤
//!                       ▼                                          ▼
//!          customers.balance_cents = after        customer_ledger row
//!                                                 (balance_after_cents = after)
//! ```
//!
//! The cached balance always equals the newest entry's `balance_after_cents`
//! because both are written inside the caller's transaction.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{SettleError, SettleResult};
use till_core::{Direction, Money, PartyKind};
use till_db::{NewLedgerEntry, PartyRepository};

/// One movement to post.
#[derive(Debug, Clone, Copy)]
pub struct Posting<'a> {
    pub kind: PartyKind,
    pub party_id: &'a str,
    pub direction: Direction,
    pub amount: Money,
    pub description: &'a str,
    /// Originating document number.
    pub reference: Option<&'a str>,
}

impl<'a> Posting<'a> {
    pub fn customer(party_id: &'a str, direction: Direction, amount: Money) -> Self {
        Posting {
            kind: PartyKind::Customer,
            party_id,
            direction,
            amount,
            description: "",
            reference: None,
        }
    }

    pub fn supplier(party_id: &'a str, direction: Direction, amount: Money) -> Self {
        Posting {
            kind: PartyKind::Supplier,
            ..Posting::customer(party_id, direction, amount)
        }
    }

    pub fn describe(mut self, description: &'a str) -> Self {
        self.description = description;
        self
    }

    pub fn reference(mut self, reference: &'a str) -> Self {
        self.reference = Some(reference);
        self
    }
}

pub struct LedgerPoster;

impl LedgerPoster {
    /// Posts one movement and returns the party's new balance.
    ///
    /// ## Returns
    /// * `Err(SettleError::PartyNotFound)` - No such customer/supplier
    pub async fn post(conn: &mut SqliteConnection, posting: Posting<'_>) -> SettleResult<Money> {
        let Posting { kind, party_id, direction, amount, .. } = posting;

        let before = PartyRepository::tx_balance(conn, kind, party_id)
            .await
            .map_err(SettleError::party(kind, party_id))?;
        let after = before + direction.signed_for(kind, amount);

        PartyRepository::tx_set_balance(conn, kind, party_id, after)
            .await
            .map_err(SettleError::party(kind, party_id))?;

        let entry = NewLedgerEntry {
            party_id: party_id.to_string(),
            direction,
            amount,
            balance_after: after,
            description: posting.description.to_string(),
            reference: posting.reference.map(str::to_string),
        };
        PartyRepository::tx_append_entry(conn, kind, &entry).await?;

        debug!(
            kind = ?kind,
            party_id = %party_id,
            direction = ?direction,
            amount = %amount,
            before = %before,
            after = %after,
            "Ledger posted"
        );

        Ok(after)
    }
}
