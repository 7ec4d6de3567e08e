//! # Cash Session Recorder
//!
//! Drawer movements against the one OPEN cash session.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   open_session(float) ──► OPEN ──► close_session(counted) ──► CLOSED   │
//! │        │                   │                 │                          │
//! │        ▼                   ▼                 ▼                          │
//! │     OPENING        SALE / REFUND        CLOSING (counted)               │
//! │                    PAYOUT / DROP                                        │
//! │                                                                         │
//! │   expected = opening + sales − refunds − payouts − drops                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is recorded without an OPEN session. Settlement-time recording
//! goes through [`CashSessionRecorder::tx_record_settlement`] so it shares
//! the sale's transaction.

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::error::{SettleError, SettleResult};
use till_core::validation::validate_positive_amount;
use till_core::{CashSession, CashTxKind, Money, SessionSummary};
use till_db::{CashRepository, Database};

/// Result of closing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClose {
    pub session_id: i64,
    pub expected: Money,
    pub counted: Money,
    /// `counted − expected`; negative when the drawer is short.
    pub variance: Money,
}

#[derive(Debug, Clone)]
pub struct CashSessionRecorder {
    db: Database,
}

impl CashSessionRecorder {
    pub fn new(db: Database) -> Self {
        CashSessionRecorder { db }
    }

    /// The currently open session, if any.
    pub async fn open_session(&self) -> SettleResult<Option<CashSession>> {
        Ok(self.db.cash().open_session().await?)
    }

    /// Opens the drawer with a float and records the OPENING movement.
    ///
    /// ## Returns
    /// * `Err(SettleError::SessionAlreadyOpen)` - close the current one first
    pub async fn start_session(&self, opening_float: Money) -> SettleResult<CashSession> {
        if opening_float.is_negative() {
            return Err(validation("opening float"));
        }

        let mut tx = self.db.begin().await?;

        if let Some(open) = CashRepository::tx_open_session(&mut tx).await? {
            return Err(SettleError::SessionAlreadyOpen(open.id));
        }

        let session = CashRepository::tx_insert_session(&mut tx, opening_float).await?;
        CashRepository::tx_record(&mut tx, session.id, CashTxKind::Opening, opening_float, "Opening float")
            .await?;

        tx.commit().await?;

        info!(session_id = session.id, opening_float = %opening_float, "Cash session opened");
        Ok(session)
    }

    /// Records the counted amount and closes the session.
    pub async fn close_session(&self, session_id: i64, counted: Money) -> SettleResult<SessionClose> {
        if counted.is_negative() {
            return Err(validation("counted amount"));
        }

        let summary = self.summary(session_id).await?;

        let mut tx = self.db.begin().await?;
        self.require_open(&mut tx, session_id).await?;
        CashRepository::tx_record(&mut tx, session_id, CashTxKind::Closing, counted, "Closing count")
            .await?;
        CashRepository::tx_close_session(&mut tx, session_id, counted).await?;
        tx.commit().await?;

        let expected = summary.expected();
        let close = SessionClose {
            session_id,
            expected,
            counted,
            variance: counted - expected,
        };

        info!(
            session_id,
            expected = %close.expected,
            counted = %close.counted,
            variance = %close.variance,
            "Cash session closed"
        );
        Ok(close)
    }

    /// Cash taken out of the drawer to pay for something.
    pub async fn record_payout(&self, amount: Money, reason: &str) -> SettleResult<i64> {
        self.record_manual(CashTxKind::Payout, amount, reason).await
    }

    /// Cash moved from the drawer to the safe.
    pub async fn record_drop(&self, amount: Money, reason: &str) -> SettleResult<i64> {
        self.record_manual(CashTxKind::Drop, amount, reason).await
    }

    /// Expected drawer position for a session.
    pub async fn summary(&self, session_id: i64) -> SettleResult<SessionSummary> {
        let movements = self.db.cash().transactions(session_id).await?;

        let mut summary = SessionSummary::default();
        for movement in &movements {
            summary.apply(movement.kind, Money::from_cents(movement.amount_cents));
        }
        Ok(summary)
    }

    async fn record_manual(&self, kind: CashTxKind, amount: Money, reason: &str) -> SettleResult<i64> {
        validate_positive_amount("amount", amount)?;

        let mut tx = self.db.begin().await?;
        let session = CashRepository::tx_open_session(&mut tx)
            .await?
            .ok_or(SettleError::NoOpenCashSession)?;
        let id = CashRepository::tx_record(&mut tx, session.id, kind, amount, reason).await?;
        tx.commit().await?;

        info!(session_id = session.id, kind = ?kind, amount = %amount, "Cash movement recorded");
        Ok(id)
    }

    async fn require_open(&self, conn: &mut SqliteConnection, session_id: i64) -> SettleResult<()> {
        match CashRepository::tx_open_session(conn).await? {
            Some(open) if open.id == session_id => Ok(()),
            _ => Err(SettleError::SessionNotOpen(session_id)),
        }
    }

    // =========================================================================
    // Settlement-scoped recording
    // =========================================================================

    /// Records a movement in the open session on the caller's connection.
    ///
    /// ## Returns
    /// * `Err(SettleError::NoOpenCashSession)` - no session is open
    pub async fn tx_record(
        conn: &mut SqliteConnection,
        kind: CashTxKind,
        amount: Money,
        reason: &str,
    ) -> SettleResult<i64> {
        let session = CashRepository::tx_open_session(conn)
            .await?
            .ok_or(SettleError::NoOpenCashSession)?;
        let id = CashRepository::tx_record(conn, session.id, kind, amount, reason).await?;
        Ok(id)
    }

    /// Records the net cash of a settlement.
    ///
    /// A positive sum is a SALE, a negative sum a REFUND of its absolute value,
    /// and a zero sum touches nothing (no session needed).
    pub async fn tx_record_settlement(
        conn: &mut SqliteConnection,
        cash: Money,
        reference: &str,
    ) -> SettleResult<Option<i64>> {
        if cash.is_zero() {
            return Ok(None);
        }

        let kind = if cash.is_negative() { CashTxKind::Refund } else { CashTxKind::Sale };
        let id = Self::tx_record(conn, kind, cash.abs(), reference).await?;

        debug!(kind = ?kind, amount = %cash.abs(), reference = %reference, "Settlement cash recorded");
        Ok(Some(id))
    }
}

fn validation(field: &str) -> SettleError {
    till_core::ValidationError::MustBePositive {
        field: field.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use till_db::DbConfig;

    async fn recorder() -> CashSessionRecorder {
        CashSessionRecorder::new(Database::new(DbConfig::in_memory()).await.unwrap())
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let cash = recorder().await;
        let session = cash.start_session(Money::from_cents(5000)).await.unwrap();

        assert!(matches!(
            cash.start_session(Money::zero()).await,
            Err(SettleError::SessionAlreadyOpen(id)) if id == session.id
        ));

        cash.record_payout(Money::from_cents(1000), "Milk vendor").await.unwrap();
        cash.record_drop(Money::from_cents(2000), "Safe").await.unwrap();

        let summary = cash.summary(session.id).await.unwrap();
        assert_eq!(summary.expected().cents(), 2000);

        let close = cash.close_session(session.id, Money::from_cents(1900)).await.unwrap();
        assert_eq!(close.expected.cents(), 2000);
        assert_eq!(close.variance.cents(), -100);

        assert!(cash.open_session().await.unwrap().is_none());
        assert!(matches!(
            cash.close_session(session.id, Money::zero()).await,
            Err(SettleError::SessionNotOpen(_))
        ));
    }

    #[tokio::test]
    async fn test_nothing_recorded_without_session() {
        let cash = recorder().await;
        assert!(matches!(
            cash.record_payout(Money::from_cents(100), "x").await,
            Err(SettleError::NoOpenCashSession)
        ));
    }

    #[tokio::test]
    async fn test_settlement_sign_picks_kind() {
        let cash = recorder().await;
        let session = cash.start_session(Money::zero()).await.unwrap();

        let mut tx = cash.db.begin().await.unwrap();
        CashSessionRecorder::tx_record_settlement(&mut tx, Money::from_cents(23600), "BILL-1")
            .await
            .unwrap();
        CashSessionRecorder::tx_record_settlement(&mut tx, Money::from_cents(-600), "BILL-2")
            .await
            .unwrap();
        assert!(CashSessionRecorder::tx_record_settlement(&mut tx, Money::zero(), "BILL-3")
            .await
            .unwrap()
            .is_none());
        tx.commit().await.unwrap();

        let summary = cash.summary(session.id).await.unwrap();
        assert_eq!(summary.sales.cents(), 23600);
        assert_eq!(summary.refunds.cents(), 600);
        assert_eq!(summary.expected().cents(), 23000);
    }
}
