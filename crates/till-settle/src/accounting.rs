//! # Accounting Poster
//!
//! Best-effort double-entry posting for settled sales and received purchases.
//!
//! Settlement never posts directly. It queues the voucher input in the outbox
//! inside its transaction; the outbox worker calls this poster afterwards. A
//! failed posting is logged and retried by the worker, and never undoes the
//! sale. Posting is idempotent per document number.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SettleResult;
use till_core::accounting::Voucher;
use till_core::{Money, Tender};
use till_db::Database;

/// Outbox payload for `ACCOUNTING_SALE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleVoucherInput {
    pub number: String,
    pub tenders: Vec<Tender>,
    /// Signed `subtotal − discount`.
    pub net: Money,
    /// Signed total tax.
    pub tax: Money,
}

impl SaleVoucherInput {
    pub fn voucher(&self) -> Voucher {
        Voucher::for_sale(&self.number, &self.tenders, self.net, self.tax)
    }
}

/// Outbox payload for `ACCOUNTING_PURCHASE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseVoucherInput {
    pub number: String,
    pub total: Money,
    pub paid: Money,
}

impl PurchaseVoucherInput {
    pub fn voucher(&self) -> Voucher {
        Voucher::for_purchase(&self.number, self.total, self.paid)
    }
}

#[derive(Debug, Clone)]
pub struct AccountingPoster {
    db: Database,
}

impl AccountingPoster {
    pub fn new(db: Database) -> Self {
        AccountingPoster { db }
    }

    /// Posts the voucher for a sale. `Ok(None)` when it was already posted.
    pub async fn post_sale(&self, input: &SaleVoucherInput) -> SettleResult<Option<i64>> {
        self.post(input.voucher()).await
    }

    /// Posts the voucher for a purchase. `Ok(None)` when it was already posted.
    pub async fn post_purchase(&self, input: &PurchaseVoucherInput) -> SettleResult<Option<i64>> {
        self.post(input.voucher()).await
    }

    async fn post(&self, voucher: Voucher) -> SettleResult<Option<i64>> {
        let journal = self.db.journal();

        if journal.exists(&voucher.reference).await? {
            debug!(reference = %voucher.reference, "Voucher already posted");
            return Ok(None);
        }

        let entry_id = journal.post(&voucher).await?;
        info!(
            entry_id,
            reference = %voucher.reference,
            amount = %voucher.total_debit(),
            "Voucher posted"
        );
        Ok(Some(entry_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use till_core::accounting::Account;
    use till_core::TenderMode;
    use till_db::DbConfig;

    async fn poster() -> (Database, AccountingPoster) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        (db.clone(), AccountingPoster::new(db))
    }

    #[tokio::test]
    async fn test_sale_posting_is_idempotent() {
        let (db, poster) = poster().await;
        let input = SaleVoucherInput {
            number: "BILL-20261015-0001".into(),
            tenders: vec![Tender::cash(Money::from_cents(23600))],
            net: Money::from_cents(23600),
            tax: Money::from_cents(3600),
        };

        assert!(poster.post_sale(&input).await.unwrap().is_some());
        assert!(poster.post_sale(&input).await.unwrap().is_none());

        assert_eq!(db.journal().account_balance(Account::Cash).await.unwrap().cents(), 23600);
        assert_eq!(db.journal().lines(&input.number).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_credit_tender_lands_in_receivables() {
        let (db, poster) = poster().await;
        let input = SaleVoucherInput {
            number: "BILL-20261015-0002".into(),
            tenders: vec![Tender::new(TenderMode::Credit, Money::from_cents(11800))],
            net: Money::from_cents(11800),
            tax: Money::from_cents(1800),
        };
        poster.post_sale(&input).await.unwrap();

        assert_eq!(
            db.journal().account_balance(Account::AccountsReceivable).await.unwrap().cents(),
            11800
        );
    }

    #[tokio::test]
    async fn test_purchase_on_account() {
        let (db, poster) = poster().await;
        let input = PurchaseVoucherInput {
            number: "PO-20261015-0001".into(),
            total: Money::from_cents(100000),
            paid: Money::from_cents(40000),
        };
        poster.post_purchase(&input).await.unwrap();

        assert_eq!(db.journal().account_balance(Account::Inventory).await.unwrap().cents(), 100000);
        assert_eq!(db.journal().account_balance(Account::Cash).await.unwrap().cents(), -40000);
    }
}
