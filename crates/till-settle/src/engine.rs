//! # Settlement Engine
//!
//! Turns a cart plus tenders into a finalized bill, and keeps stock, party
//! ledgers, loyalty, the cash drawer and the document sequence consistent
//! with it.
//!
//! ## Finalize Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    finalize_sale(cart, tenders, options)                │
//! │                                                                         │
//! │  validate ──► settle_lock ──► BEGIN                                     │
//! │                                  │                                      │
//! │     ┌────────────────────────────┼──────────────────────────────────┐  │
//! │     │  1. SequenceGenerator::next      BILL-YYYYMMDD-NNNN           │  │
//! │     │  2. header (tax split, mode, status)   INSERT … RETURNING id  │  │
//! │     │  3. tenders; credit → LedgerPoster (customer DEBIT)           │  │
//! │     │  4. customer visit + net loyalty points                       │  │
//! │     │  5. lines; StockAdjuster::deduct per line                     │  │
//! │     │  6. cash sum ≠ 0 → open session required, SALE / REFUND       │  │
//! │     │  7. outbox: ACCOUNTING_SALE, SALE_SYNC                        │  │
//! │     └────────────────────────────┼──────────────────────────────────┘  │
//! │                                  ▼                                      │
//! │                               COMMIT ──► SaleCompleted ──► nudge worker │
//! │                                                                         │
//! │  Any error before COMMIT drops the transaction: no bill, no stock      │
//! │  change, no ledger entry, no cash movement is left behind.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! Settlements on one engine are serialized by `settle_lock`, which keeps the
//! sequence count and the header insert together. Across processes the
//! UNIQUE index on the bill number rejects a duplicate; the losing sale fails
//! with a database error and is not retried.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use crate::accounting::{PurchaseVoucherInput, SaleVoucherInput};
use crate::cash::CashSessionRecorder;
use crate::error::{SettleError, SettleResult};
use crate::events::{EventBus, SaleEvent};
use crate::ledger::{LedgerPoster, Posting};
use crate::outbox::{OutboxHandle, SaleSyncRef};
use crate::sequence::SequenceGenerator;
use crate::stock::StockAdjuster;
use till_core::cart::Cart;
use till_core::tax::{LineTax, SettlementTotals};
use till_core::validation::{validate_positive_amount, validate_purchase, validate_settlement};
use till_core::{
    Bill, BillStatus, CartLine, CashTxKind, CoreError, Direction, DocumentKind, LedgerEntry, Money,
    OutboxTopic, PartyKind, PaymentMode, PurchaseLine, SaleOptions, SaleRecord, Tender, TenderMode,
    ValidationError,
};
use till_db::{
    BillRepository, Database, DbError, EstimateRepository, HeldCart, NewBill, NewBillLine,
    OutboxRepository, PartyRepository, PurchaseRepository,
};

pub struct SettlementEngine {
    db: Database,
    events: EventBus,
    settle_lock: Mutex<()>,
    outbox: Option<OutboxHandle>,
    loyalty_enabled: bool,
}

impl SettlementEngine {
    pub fn new(db: Database) -> Self {
        SettlementEngine {
            db,
            events: EventBus::new(),
            settle_lock: Mutex::new(()),
            outbox: None,
            loyalty_enabled: true,
        }
    }

    /// Wakes this worker after every commit that queued outbox rows.
    pub fn with_outbox(mut self, handle: OutboxHandle) -> Self {
        self.outbox = Some(handle);
        self
    }

    pub fn with_loyalty(mut self, enabled: bool) -> Self {
        self.loyalty_enabled = enabled;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Drawer operations against the same database.
    pub fn cash(&self) -> CashSessionRecorder {
        CashSessionRecorder::new(self.db.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SaleEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    /// Finalizes a sale and returns its bill number.
    ///
    /// The customer comes from `options`, falling back to the cart's.
    ///
    /// ## Returns
    /// * `Err(SettleError::NoOpenCashSession)` - Cash tendered, drawer closed
    /// * `Err(SettleError::CreditTenderWithoutCustomer)` - Credit with nobody to owe it
    /// * `Err(SettleError::PartyNotFound)` - Unknown customer
    pub async fn finalize_sale(
        &self,
        cart: &Cart,
        tenders: &[Tender],
        options: &SaleOptions,
    ) -> SettleResult<String> {
        validate_settlement(&cart.lines, tenders)?;
        let customer_id = settling_customer(cart, tenders, options)?;

        let lines = bill_lines(&cart.lines, options.tax_inclusive);
        let totals = totals_for(&lines, options);

        let guard = self.settle_lock.lock().await;
        let mut tx = self.db.begin().await?;

        let number =
            SequenceGenerator::next(&mut tx, DocumentKind::Bill, SequenceGenerator::today()).await?;

        let header = new_bill(&number, totals, tenders, customer_id.clone(), totals.status(), options);
        let bill_id = BillRepository::tx_insert_header(&mut tx, &header).await?;

        for tender in tenders {
            BillRepository::tx_insert_tender(&mut tx, bill_id, tender).await?;

            match customer_id.as_deref() {
                Some(customer) if tender.mode.is_credit() => {
                    LedgerPoster::post(
                        &mut tx,
                        Posting::customer(customer, Direction::Debit, tender.amount)
                            .describe("Credit sale")
                            .reference(&number),
                    )
                    .await?;
                }
                _ => {}
            }
        }

        if let Some(customer) = customer_id.as_deref() {
            self.tx_customer_visit(&mut tx, customer, totals.grand_total, options)
                .await?;
        }

        tx_insert_lines(&mut tx, bill_id, &lines).await?;

        let cash: Money = tenders
            .iter()
            .filter(|t| t.mode.is_cash())
            .map(|t| t.amount)
            .sum();
        CashSessionRecorder::tx_record_settlement(&mut tx, cash, &number).await?;

        let voucher = SaleVoucherInput {
            number: number.clone(),
            tenders: tenders.to_vec(),
            net: totals.net,
            tax: totals.tax.total(),
        };
        enqueue(&mut tx, OutboxTopic::AccountingSale, &number, &voucher).await?;
        enqueue(
            &mut tx,
            OutboxTopic::SaleSync,
            &number,
            &SaleSyncRef {
                bill_id,
                number: number.clone(),
            },
        )
        .await?;

        tx.commit().await?;
        drop(guard);

        info!(
            number = %number,
            bill_id,
            lines = lines.len(),
            grand_total = %totals.grand_total,
            status = ?header.status,
            payment_mode = ?header.payment_mode,
            "Sale finalized"
        );

        self.events.publish(SaleEvent::SaleCompleted {
            bill_id,
            number: number.clone(),
            grand_total: totals.grand_total,
            customer_id,
        });
        self.nudge_outbox();

        Ok(number)
    }

    /// Replaces a bill's lines and tenders in place, keeping its number.
    ///
    /// Stock for the old lines is put back before the new lines are deducted.
    /// Ledger, loyalty, cash drawer and accounting are left as the original
    /// settlement recorded them. Status is forced to PAID.
    ///
    /// Credit tenders need a customer here too.
    pub async fn update_sale(
        &self,
        bill_id: i64,
        cart: &Cart,
        tenders: &[Tender],
        options: &SaleOptions,
    ) -> SettleResult<()> {
        validate_settlement(&cart.lines, tenders)?;
        let customer_id = settling_customer(cart, tenders, options)?;

        let lines = bill_lines(&cart.lines, options.tax_inclusive);
        let totals = totals_for(&lines, options);

        let guard = self.settle_lock.lock().await;
        let mut tx = self.db.begin().await?;

        let existing = BillRepository::tx_get_header(&mut tx, bill_id)
            .await?
            .ok_or_else(|| SettleError::BillNotFound(bill_id.to_string()))?;

        let old_lines = BillRepository::tx_get_lines(&mut tx, bill_id).await?;
        for line in &old_lines {
            StockAdjuster::restore(&mut tx, &line.product_id, line.quantity).await?;
        }

        let removed_lines = BillRepository::tx_delete_lines(&mut tx, bill_id).await?;
        let removed_tenders = BillRepository::tx_delete_tenders(&mut tx, bill_id).await?;
        debug!(bill_id, removed_lines, removed_tenders, "Cleared bill for rewrite");

        let header = new_bill(&existing.number, totals, tenders, customer_id, BillStatus::Paid, options);
        BillRepository::tx_rewrite_header(&mut tx, bill_id, &header).await?;

        for tender in tenders {
            BillRepository::tx_insert_tender(&mut tx, bill_id, tender).await?;
        }
        tx_insert_lines(&mut tx, bill_id, &lines).await?;

        enqueue(
            &mut tx,
            OutboxTopic::SaleSync,
            &existing.number,
            &SaleSyncRef {
                bill_id,
                number: existing.number.clone(),
            },
        )
        .await?;

        tx.commit().await?;
        drop(guard);

        info!(
            number = %existing.number,
            bill_id,
            old_lines = old_lines.len(),
            new_lines = lines.len(),
            grand_total = %totals.grand_total,
            "Sale updated"
        );

        self.events.publish(SaleEvent::SaleUpdated {
            bill_id,
            number: existing.number,
        });
        self.nudge_outbox();

        Ok(())
    }

    /// Replaces the notes on a bill. Nothing else changes.
    pub async fn update_notes(&self, bill_id: i64, notes: Option<&str>) -> SettleResult<()> {
        self.db
            .bills()
            .update_notes(bill_id, notes)
            .await
            .map_err(|e| match e {
                DbError::NotFound { .. } => SettleError::BillNotFound(bill_id.to_string()),
                other => other.into(),
            })
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn get_sale_by_number(&self, number: &str) -> SettleResult<Option<SaleRecord>> {
        match self.db.bills().get_by_number(number).await? {
            Some(bill) => Ok(Some(assemble(&self.db, bill).await?)),
            None => Ok(None),
        }
    }

    pub async fn get_sale_by_id(&self, bill_id: i64) -> SettleResult<Option<SaleRecord>> {
        load_sale(&self.db, bill_id).await
    }

    /// Number the next document of `kind` would get on `date`. Reserves nothing.
    pub async fn generate_document_number(
        &self,
        kind: DocumentKind,
        date: NaiveDate,
    ) -> SettleResult<String> {
        SequenceGenerator::peek(&self.db, kind, date).await
    }

    /// Newest first.
    pub async fn ledger_entries(
        &self,
        kind: PartyKind,
        party_id: &str,
        limit: u32,
    ) -> SettleResult<Vec<LedgerEntry>> {
        Ok(self.db.parties().entries(kind, party_id, limit).await?)
    }

    // =========================================================================
    // Held Carts
    // =========================================================================

    /// Parks cart lines under a label so the register can serve someone else.
    pub async fn hold_cart(&self, items: &[CartLine], customer_label: &str) -> SettleResult<HeldCart> {
        if items.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        let held = self.db.held_carts().insert(items, customer_label).await?;
        info!(id = %held.id, label = %held.customer_label, "Cart held");
        Ok(held)
    }

    pub async fn list_held_carts(&self) -> SettleResult<Vec<HeldCart>> {
        Ok(self.db.held_carts().list().await?)
    }

    pub async fn delete_held_cart(&self, id: &str) -> SettleResult<()> {
        Ok(self.db.held_carts().delete(id).await?)
    }

    // =========================================================================
    // Purchases, Estimates, Payments
    // =========================================================================

    /// Receives goods from a supplier and returns the PO number.
    ///
    /// Stock goes up per line. Whatever was not paid now is credited to the
    /// supplier's ledger.
    pub async fn receive_purchase(
        &self,
        supplier_id: &str,
        lines: &[PurchaseLine],
        paid: Money,
        notes: Option<&str>,
    ) -> SettleResult<String> {
        validate_purchase(lines, paid)?;

        let total: Money = lines.iter().map(PurchaseLine::amount).sum();
        let unpaid = total - paid;

        let guard = self.settle_lock.lock().await;
        let mut tx = self.db.begin().await?;

        PartyRepository::tx_balance(&mut tx, PartyKind::Supplier, supplier_id)
            .await
            .map_err(SettleError::party(PartyKind::Supplier, supplier_id))?;

        let number = SequenceGenerator::next(
            &mut tx,
            DocumentKind::PurchaseOrder,
            SequenceGenerator::today(),
        )
        .await?;

        let purchase_id =
            PurchaseRepository::tx_insert_order(&mut tx, &number, supplier_id, total, paid, notes)
                .await?;

        for line in lines {
            PurchaseRepository::tx_insert_line(&mut tx, purchase_id, line).await?;
            StockAdjuster::adjust(&mut tx, &line.product_id, line.quantity).await?;
        }

        if !unpaid.is_zero() {
            LedgerPoster::post(
                &mut tx,
                Posting::supplier(supplier_id, Direction::Credit, unpaid)
                    .describe("Purchase on account")
                    .reference(&number),
            )
            .await?;
        }

        let voucher = PurchaseVoucherInput {
            number: number.clone(),
            total,
            paid,
        };
        enqueue(&mut tx, OutboxTopic::AccountingPurchase, &number, &voucher).await?;

        tx.commit().await?;
        drop(guard);

        info!(number = %number, supplier_id = %supplier_id, total = %total, unpaid = %unpaid, "Purchase received");

        self.events.publish(SaleEvent::PurchaseReceived {
            number: number.clone(),
            total,
        });
        self.nudge_outbox();

        Ok(number)
    }

    /// Numbers and stores a quotation. No stock, ledger or cash effect.
    pub async fn save_estimate(&self, cart: &Cart, options: &SaleOptions) -> SettleResult<String> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let customer_id = options.customer_id.as_deref().or(cart.customer_id.as_deref());
        let totals = cart.totals(options.tax_inclusive, options.discount, options.is_inter_state);

        let _guard = self.settle_lock.lock().await;
        let mut tx = self.db.begin().await?;

        let number =
            SequenceGenerator::next(&mut tx, DocumentKind::Estimate, SequenceGenerator::today())
                .await?;
        EstimateRepository::tx_insert(
            &mut tx,
            &number,
            customer_id,
            totals.grand_total,
            &cart.lines,
            options.notes.as_deref(),
        )
        .await?;

        tx.commit().await?;

        info!(number = %number, total = %totals.grand_total, "Estimate saved");
        Ok(number)
    }

    /// Records money received against a customer's balance and returns the
    /// new balance. Cash goes through the drawer as a SALE movement.
    pub async fn receive_customer_payment(
        &self,
        customer_id: &str,
        amount: Money,
        mode: TenderMode,
        note: &str,
    ) -> SettleResult<Money> {
        validate_positive_amount("amount", amount)?;
        if mode.is_credit() {
            return Err(ValidationError::InvalidFormat {
                field: "payment mode".to_string(),
                reason: "store credit cannot pay off store credit".to_string(),
            }
            .into());
        }

        let description = if note.is_empty() { "Payment received" } else { note };

        let mut tx = self.db.begin().await?;

        let balance = LedgerPoster::post(
            &mut tx,
            Posting::customer(customer_id, Direction::Credit, amount).describe(description),
        )
        .await?;

        if mode.is_cash() {
            CashSessionRecorder::tx_record(&mut tx, CashTxKind::Sale, amount, description).await?;
        }

        tx.commit().await?;

        info!(customer_id = %customer_id, amount = %amount, mode = ?mode, balance = %balance, "Customer payment received");
        Ok(balance)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn tx_customer_visit(
        &self,
        conn: &mut SqliteConnection,
        customer_id: &str,
        purchase: Money,
        options: &SaleOptions,
    ) -> SettleResult<()> {
        PartyRepository::tx_record_visit(conn, customer_id, purchase, Utc::now())
            .await
            .map_err(SettleError::party(PartyKind::Customer, customer_id))?;

        let points = options.points_earned - options.points_redeemed;
        if self.loyalty_enabled && points != 0 {
            PartyRepository::tx_add_points(conn, customer_id, points)
                .await
                .map_err(SettleError::party(PartyKind::Customer, customer_id))?;
        }
        Ok(())
    }

    fn nudge_outbox(&self) {
        if let Some(handle) = &self.outbox {
            handle.nudge();
        }
    }
}

/// The customer a settlement is for: `options` first, then the cart. A
/// credit tender with no customer is rejected.
fn settling_customer(
    cart: &Cart,
    tenders: &[Tender],
    options: &SaleOptions,
) -> SettleResult<Option<String>> {
    let customer_id = options.customer_id.clone().or_else(|| cart.customer_id.clone());
    if customer_id.is_none() && tenders.iter().any(|t| t.mode.is_credit()) {
        return Err(SettleError::CreditTenderWithoutCustomer);
    }
    Ok(customer_id)
}

/// Loads a bill with its lines and tenders.
pub(crate) async fn load_sale(db: &Database, bill_id: i64) -> SettleResult<Option<SaleRecord>> {
    match db.bills().get_by_id(bill_id).await? {
        Some(bill) => Ok(Some(assemble(db, bill).await?)),
        None => Ok(None),
    }
}

async fn assemble(db: &Database, bill: Bill) -> SettleResult<SaleRecord> {
    let bills = db.bills();
    let items = bills.get_lines(bill.id).await?;
    let tenders = bills.get_tenders(bill.id).await?;
    Ok(SaleRecord { bill, items, tenders })
}

fn bill_lines(lines: &[CartLine], tax_inclusive: bool) -> Vec<NewBillLine> {
    lines
        .iter()
        .map(|line| NewBillLine {
            product_id: line.product_id.clone(),
            name_snapshot: line.name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            tax_rate: line.tax_rate,
            tax: line.tax(tax_inclusive),
        })
        .collect()
}

fn totals_for(lines: &[NewBillLine], options: &SaleOptions) -> SettlementTotals {
    let taxes: Vec<LineTax> = lines.iter().map(|l| l.tax).collect();
    SettlementTotals::from_lines(&taxes, options.discount, options.is_inter_state)
}

fn new_bill(
    number: &str,
    totals: SettlementTotals,
    tenders: &[Tender],
    customer_id: Option<String>,
    status: BillStatus,
    options: &SaleOptions,
) -> NewBill {
    NewBill {
        number: number.to_string(),
        totals,
        points_earned: options.points_earned,
        points_redeemed: options.points_redeemed,
        customer_id,
        payment_mode: PaymentMode::for_tenders(tenders),
        status,
        order_type: options.order_type,
        tax_inclusive: options.tax_inclusive,
        is_inter_state: options.is_inter_state,
        notes: options.notes.clone(),
    }
}

async fn tx_insert_lines(
    conn: &mut SqliteConnection,
    bill_id: i64,
    lines: &[NewBillLine],
) -> SettleResult<()> {
    for line in lines {
        BillRepository::tx_insert_line(conn, bill_id, line).await?;
        StockAdjuster::deduct(conn, &line.product_id, line.quantity).await?;
    }
    Ok(())
}

async fn enqueue<T: Serialize>(
    conn: &mut SqliteConnection,
    topic: OutboxTopic,
    entity_id: &str,
    payload: &T,
) -> SettleResult<()> {
    let payload = serde_json::to_string(payload)?;
    let entry = OutboxRepository::tx_enqueue(conn, topic, entity_id, &payload).await?;
    debug!(id = %entry.id, topic = ?topic, entity_id = %entity_id, "Queued outbox entry");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use till_core::sequence::format_number;
    use till_core::{OrderType, Product, Quantity, TaxRate};
    use till_db::repository::product::generate_product_id;
    use till_db::DbConfig;

    async fn engine() -> SettlementEngine {
        SettlementEngine::new(Database::new(DbConfig::in_memory()).await.unwrap())
    }

    async fn product(engine: &SettlementEngine, sku: &str, price_cents: i64, bps: u32, stock: i64) -> Product {
        let now = Utc::now();
        engine
            .database()
            .products()
            .insert(&Product {
                id: generate_product_id(),
                sku: sku.into(),
                name: format!("Item {}", sku),
                price_cents,
                tax_rate_bps: TaxRate::from_bps(bps).bps(),
                stock: Quantity::from_units(stock),
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }

    async fn stock(engine: &SettlementEngine, p: &Product) -> Quantity {
        engine.database().products().stock(&p.id).await.unwrap()
    }

    fn cart_of(items: &[(&Product, i64)]) -> Cart {
        let mut cart = Cart::new();
        for (p, qty) in items {
            cart.add(p, Quantity::from_units(*qty)).unwrap();
        }
        cart
    }

    fn bill_number(ordinal: u32) -> String {
        format_number(DocumentKind::Bill, SequenceGenerator::today(), ordinal)
    }

    fn cash(cents: i64) -> Vec<Tender> {
        vec![Tender::cash(Money::from_cents(cents))]
    }

    fn inclusive() -> SaleOptions {
        SaleOptions {
            tax_inclusive: true,
            ..SaleOptions::default()
        }
    }

    // =========================================================================
    // Scenarios
    // =========================================================================

    #[tokio::test]
    async fn test_cash_sale_with_open_session() {
        let engine = engine().await;
        let session = engine.cash().start_session(Money::zero()).await.unwrap();
        let p = product(&engine, "WIDGET", 10000, 1800, 10).await;

        let number = engine
            .finalize_sale(&cart_of(&[(&p, 2)]), &cash(23600), &inclusive())
            .await
            .unwrap();

        assert_eq!(number, bill_number(1));
        assert_eq!(stock(&engine, &p).await, Quantity::from_units(8));

        let movements = engine.database().cash().transactions(session.id).await.unwrap();
        let sales: Vec<_> = movements.iter().filter(|m| m.kind == CashTxKind::Sale).collect();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].amount_cents, 23600);

        let sale = engine.get_sale_by_number(&number).await.unwrap().unwrap();
        assert_eq!(sale.items.len(), 1);
        assert_eq!(sale.tenders.len(), 1);
        assert_eq!(sale.bill.status, BillStatus::Paid);
        assert_eq!(sale.bill.payment_mode, PaymentMode::Cash);
        assert_eq!(sale.bill.grand_total_cents, 20000);
    }

    #[tokio::test]
    async fn test_cash_without_session_leaves_nothing() {
        let engine = engine().await;
        let p = product(&engine, "WIDGET", 10000, 1800, 10).await;

        let err = engine
            .finalize_sale(&cart_of(&[(&p, 2)]), &cash(23600), &inclusive())
            .await
            .unwrap_err();

        assert!(matches!(err, SettleError::NoOpenCashSession));
        assert!(err.to_string().contains("cash session"));
        assert!(engine.get_sale_by_number(&bill_number(1)).await.unwrap().is_none());
        assert_eq!(stock(&engine, &p).await, Quantity::from_units(10));
        assert_eq!(engine.database().outbox().count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_card_sale_needs_no_session() {
        let engine = engine().await;
        let p = product(&engine, "WIDGET", 10000, 1800, 10).await;
        let tenders = [Tender::new(TenderMode::Card, Money::from_cents(11800))];

        let number = engine
            .finalize_sale(&cart_of(&[(&p, 1)]), &tenders, &SaleOptions::default())
            .await
            .unwrap();
        assert_eq!(number, bill_number(1));
    }

    // =========================================================================
    // Properties
    // =========================================================================

    #[tokio::test]
    async fn test_stock_conservation_with_fractional_and_return_lines() {
        let engine = engine().await;
        engine.cash().start_session(Money::zero()).await.unwrap();
        let rice = product(&engine, "RICE", 6000, 500, 20).await;
        let oil = product(&engine, "OIL", 18000, 500, 5).await;

        let mut cart = Cart::new();
        cart.add(&rice, Quantity::from_milli(2500)).unwrap();
        cart.add_return(&oil, Quantity::from_units(1)).unwrap();

        engine
            .finalize_sale(&cart, &cash(100), &SaleOptions::default())
            .await
            .unwrap();

        assert_eq!(stock(&engine, &rice).await, Quantity::from_milli(17500));
        assert_eq!(stock(&engine, &oil).await, Quantity::from_units(6));
    }

    #[tokio::test]
    async fn test_inclusive_and_exclusive_line_tax() {
        let engine = engine().await;
        let p = product(&engine, "TAXED", 11800, 1800, 10).await;
        let card = [Tender::new(TenderMode::Card, Money::from_cents(11800))];

        let inc = engine
            .finalize_sale(&cart_of(&[(&p, 1)]), &card, &inclusive())
            .await
            .unwrap();
        let exc = engine
            .finalize_sale(&cart_of(&[(&p, 1)]), &card, &SaleOptions::default())
            .await
            .unwrap();

        let inc = engine.get_sale_by_number(&inc).await.unwrap().unwrap();
        assert_eq!(inc.items[0].taxable_cents, 10000);
        assert_eq!(inc.items[0].tax_cents, 1800);

        let exc = engine.get_sale_by_number(&exc).await.unwrap().unwrap();
        assert_eq!(exc.items[0].taxable_cents, 11800);
        assert_eq!(exc.items[0].tax_cents, 2124);
        assert_eq!(exc.bill.tax_cents(), 2124);
        assert_eq!(exc.bill.grand_total_cents, 11800);
    }

    #[tokio::test]
    async fn test_subtotal_is_sum_of_line_amounts_in_both_modes() {
        let engine = engine().await;
        let soap = product(&engine, "SOAP", 11800, 1800, 10).await;
        let dal = product(&engine, "DAL", 16000, 500, 10).await;
        let card = [Tender::new(TenderMode::Card, Money::from_cents(30000))];

        for options in [SaleOptions::default(), inclusive()] {
            let mut cart = cart_of(&[(&soap, 2)]);
            cart.add(&dal, Quantity::from_milli(1_250)).unwrap();
            cart.add_return(&soap, Quantity::from_units(1)).unwrap();
            let options = SaleOptions {
                discount: Money::from_cents(500),
                ..options
            };

            let number = engine.finalize_sale(&cart, &card, &options).await.unwrap();
            let sale = engine.get_sale_by_number(&number).await.unwrap().unwrap();

            let lines: i64 = sale.items.iter().map(|i| i.line_amount_cents).sum();
            assert_eq!(lines, 11800 * 2 + 20000 - 11800);
            assert_eq!(sale.bill.subtotal_cents, lines);
            assert_eq!(
                sale.bill.grand_total_cents,
                (sale.bill.subtotal_cents - sale.bill.discount_cents).max(0)
            );
        }
    }

    #[tokio::test]
    async fn test_tax_split_is_exclusive() {
        let engine = engine().await;
        let p = product(&engine, "TAXED", 10000, 1800, 10).await;
        let card = [Tender::new(TenderMode::Card, Money::from_cents(11800))];

        let local = engine
            .finalize_sale(&cart_of(&[(&p, 1)]), &card, &SaleOptions::default())
            .await
            .unwrap();
        let inter = engine
            .finalize_sale(
                &cart_of(&[(&p, 1)]),
                &card,
                &SaleOptions {
                    is_inter_state: true,
                    ..SaleOptions::default()
                },
            )
            .await
            .unwrap();

        let local = engine.get_sale_by_number(&local).await.unwrap().unwrap().bill;
        assert_eq!((local.cgst_cents, local.sgst_cents, local.igst_cents), (900, 900, 0));

        let inter = engine.get_sale_by_number(&inter).await.unwrap().unwrap().bill;
        assert_eq!((inter.cgst_cents, inter.sgst_cents, inter.igst_cents), (0, 0, 1800));
    }

    #[tokio::test]
    async fn test_grand_total_floors_at_zero() {
        let engine = engine().await;
        let p = product(&engine, "CHEAP", 1000, 0, 10).await;
        let card = [Tender::new(TenderMode::Card, Money::zero())];

        let number = engine
            .finalize_sale(
                &cart_of(&[(&p, 1)]),
                &card,
                &SaleOptions {
                    discount: Money::from_cents(1500),
                    ..SaleOptions::default()
                },
            )
            .await
            .unwrap();

        let bill = engine.get_sale_by_number(&number).await.unwrap().unwrap().bill;
        assert_eq!(bill.subtotal_cents, 1000);
        assert_eq!(bill.discount_cents, 1500);
        assert_eq!(bill.grand_total_cents, 0);
    }

    #[tokio::test]
    async fn test_numbers_are_sequential() {
        let engine = engine().await;
        let p = product(&engine, "WIDGET", 10000, 0, 10).await;
        let card = [Tender::new(TenderMode::Card, Money::from_cents(10000))];

        let first = engine
            .finalize_sale(&cart_of(&[(&p, 1)]), &card, &SaleOptions::default())
            .await
            .unwrap();
        let second = engine
            .finalize_sale(&cart_of(&[(&p, 1)]), &card, &SaleOptions::default())
            .await
            .unwrap();

        assert_eq!(first, bill_number(1));
        assert_eq!(second, bill_number(2));
        assert_eq!(
            engine
                .generate_document_number(DocumentKind::Bill, SequenceGenerator::today())
                .await
                .unwrap(),
            bill_number(3)
        );
    }

    #[tokio::test]
    async fn test_credit_sale_keeps_ledger_consistent() {
        let engine = engine().await;
        engine.cash().start_session(Money::zero()).await.unwrap();
        let p = product(&engine, "WIDGET", 10000, 1800, 10).await;
        let customer = engine.database().parties().insert_customer("Asha", None).await.unwrap();

        let tenders = [
            Tender::cash(Money::from_cents(3800)),
            Tender::new(TenderMode::Credit, Money::from_cents(8000)),
        ];
        let number = engine
            .finalize_sale(
                &cart_of(&[(&p, 1)]),
                &tenders,
                &SaleOptions {
                    customer_id: Some(customer.id.clone()),
                    points_earned: 12,
                    points_redeemed: 2,
                    ..SaleOptions::default()
                },
            )
            .await
            .unwrap();

        let sale = engine.get_sale_by_number(&number).await.unwrap().unwrap();
        assert_eq!(sale.bill.payment_mode, PaymentMode::Split);

        let balance = engine
            .receive_customer_payment(&customer.id, Money::from_cents(3000), TenderMode::Cash, "")
            .await
            .unwrap();
        assert_eq!(balance.cents(), 5000);

        let entries = engine
            .ledger_entries(PartyKind::Customer, &customer.id, 10)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].balance_after_cents, 5000);
        assert_eq!(entries[1].reference.as_deref(), Some(number.as_str()));

        let stored = engine.database().parties().get_customer(&customer.id).await.unwrap().unwrap();
        assert_eq!(stored.balance_cents, entries[0].balance_after_cents);
        assert_eq!(stored.loyalty_points, 10);
        assert_eq!(stored.total_purchases_cents, 10000);
        assert!(stored.last_visit_at.is_some());
    }

    #[tokio::test]
    async fn test_credit_requires_customer() {
        let engine = engine().await;
        let p = product(&engine, "WIDGET", 10000, 0, 10).await;
        let credit = [Tender::new(TenderMode::Credit, Money::from_cents(10000))];

        let err = engine
            .finalize_sale(&cart_of(&[(&p, 1)]), &credit, &SaleOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SettleError::CreditTenderWithoutCustomer));
    }

    #[tokio::test]
    async fn test_loyalty_can_be_disabled() {
        let engine = engine().await.with_loyalty(false);
        let p = product(&engine, "WIDGET", 10000, 0, 10).await;
        let customer = engine.database().parties().insert_customer("Ravi", None).await.unwrap();
        let mut cart = cart_of(&[(&p, 1)]);
        cart.customer_id = Some(customer.id.clone());

        engine
            .finalize_sale(
                &cart,
                &[Tender::new(TenderMode::Wallet, Money::from_cents(10000))],
                &SaleOptions {
                    points_earned: 50,
                    ..SaleOptions::default()
                },
            )
            .await
            .unwrap();

        let stored = engine.database().parties().get_customer(&customer.id).await.unwrap().unwrap();
        assert_eq!(stored.loyalty_points, 0);
        assert_eq!(stored.total_purchases_cents, 10000);
    }

    #[tokio::test]
    async fn test_concurrent_settlements_get_consecutive_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("till.db")).max_connections(4))
            .await
            .unwrap();
        let engine = SettlementEngine::new(db);
        let p = product(&engine, "WIDGET", 1000, 0, 20).await;
        let card = [Tender::new(TenderMode::Card, Money::from_cents(1000))];
        let options = SaleOptions::default();

        let (a, b, c, d) = (
            cart_of(&[(&p, 1)]),
            cart_of(&[(&p, 2)]),
            cart_of(&[(&p, 3)]),
            cart_of(&[(&p, 4)]),
        );
        let results = tokio::join!(
            engine.finalize_sale(&a, &card, &options),
            engine.finalize_sale(&b, &card, &options),
            engine.finalize_sale(&c, &card, &options),
            engine.finalize_sale(&d, &card, &options),
        );

        let mut numbers = vec![
            results.0.unwrap(),
            results.1.unwrap(),
            results.2.unwrap(),
            results.3.unwrap(),
        ];
        numbers.sort();
        let expected: Vec<String> = (1..=4).map(bill_number).collect();
        assert_eq!(numbers, expected);
        assert_eq!(stock(&engine, &p).await, Quantity::from_units(10));

        engine.database().close().await;
    }

    #[tokio::test]
    async fn test_return_only_sale_is_refund() {
        let engine = engine().await;
        let session = engine.cash().start_session(Money::from_cents(50000)).await.unwrap();
        let p = product(&engine, "WIDGET", 10000, 0, 10).await;

        let mut cart = Cart::new();
        cart.add_return(&p, Quantity::from_units(1)).unwrap();

        let number = engine
            .finalize_sale(&cart, &cash(-10000), &SaleOptions::default())
            .await
            .unwrap();

        let bill = engine.get_sale_by_number(&number).await.unwrap().unwrap().bill;
        assert_eq!(bill.status, BillStatus::Refunded);
        assert_eq!(bill.grand_total_cents, 0);
        assert_eq!(stock(&engine, &p).await, Quantity::from_units(11));

        let summary = engine.cash().summary(session.id).await.unwrap();
        assert_eq!(summary.refunds.cents(), 10000);
        assert_eq!(summary.expected().cents(), 40000);
    }

    // =========================================================================
    // Update
    // =========================================================================

    #[tokio::test]
    async fn test_edit_nets_stock() {
        let engine = engine().await;
        let p = product(&engine, "WIDGET", 10000, 1800, 10).await;
        let card = [Tender::new(TenderMode::Card, Money::from_cents(59000))];

        let number = engine
            .finalize_sale(&cart_of(&[(&p, 5)]), &card, &SaleOptions::default())
            .await
            .unwrap();
        assert_eq!(stock(&engine, &p).await, Quantity::from_units(5));

        let bill_id = engine.get_sale_by_number(&number).await.unwrap().unwrap().bill.id;
        let wallet = [Tender::new(TenderMode::Wallet, Money::from_cents(35400))];
        engine
            .update_sale(bill_id, &cart_of(&[(&p, 3)]), &wallet, &SaleOptions::default())
            .await
            .unwrap();

        assert_eq!(stock(&engine, &p).await, Quantity::from_units(7));

        let sale = engine.get_sale_by_id(bill_id).await.unwrap().unwrap();
        assert_eq!(sale.bill.number, number);
        assert_eq!(sale.bill.status, BillStatus::Paid);
        assert_eq!(sale.bill.payment_mode, PaymentMode::Wallet);
        assert_eq!(sale.items.len(), 1);
        assert_eq!(sale.items[0].quantity, Quantity::from_units(3));
        assert_eq!(sale.tenders.len(), 1);
    }

    #[tokio::test]
    async fn test_edit_rejects_credit_without_customer() {
        let engine = engine().await;
        let p = product(&engine, "WIDGET", 10000, 0, 10).await;
        let card = [Tender::new(TenderMode::Card, Money::from_cents(20000))];

        let number = engine
            .finalize_sale(&cart_of(&[(&p, 2)]), &card, &SaleOptions::default())
            .await
            .unwrap();
        let bill_id = engine.get_sale_by_number(&number).await.unwrap().unwrap().bill.id;

        let credit = [Tender::new(TenderMode::Credit, Money::from_cents(10000))];
        let err = engine
            .update_sale(bill_id, &cart_of(&[(&p, 1)]), &credit, &SaleOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SettleError::CreditTenderWithoutCustomer));

        let sale = engine.get_sale_by_id(bill_id).await.unwrap().unwrap();
        assert_eq!(sale.items[0].quantity, Quantity::from_units(2));
        assert_eq!(sale.tenders[0].mode, TenderMode::Card);
        assert_eq!(stock(&engine, &p).await, Quantity::from_units(8));
    }

    #[tokio::test]
    async fn test_update_unknown_bill() {
        let engine = engine().await;
        let p = product(&engine, "WIDGET", 100, 0, 1).await;

        let err = engine
            .update_sale(404, &cart_of(&[(&p, 1)]), &cash(100), &SaleOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SettleError::BillNotFound(_)));

        let err = engine.update_notes(404, Some("x")).await.unwrap_err();
        assert!(matches!(err, SettleError::BillNotFound(_)));
    }

    // =========================================================================
    // Side channels
    // =========================================================================

    #[tokio::test]
    async fn test_commit_queues_outbox_and_publishes() {
        let engine = engine().await;
        let mut events = engine.subscribe();
        let p = product(&engine, "WIDGET", 10000, 0, 10).await;

        let number = engine
            .finalize_sale(
                &cart_of(&[(&p, 1)]),
                &[Tender::new(TenderMode::Card, Money::from_cents(10000))],
                &SaleOptions {
                    order_type: OrderType::Takeaway,
                    notes: Some("gift wrap".into()),
                    ..SaleOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(engine.database().outbox().count_pending().await.unwrap(), 2);
        match events.recv().await.unwrap() {
            SaleEvent::SaleCompleted { number: n, grand_total, .. } => {
                assert_eq!(n, number);
                assert_eq!(grand_total.cents(), 10000);
            }
            other => panic!("unexpected event {:?}", other),
        }

        let bill = engine.get_sale_by_number(&number).await.unwrap().unwrap().bill;
        engine.update_notes(bill.id, None).await.unwrap();
        assert!(engine.get_sale_by_id(bill.id).await.unwrap().unwrap().bill.notes.is_none());
    }

    #[tokio::test]
    async fn test_held_carts() {
        let engine = engine().await;
        let p = product(&engine, "WIDGET", 10000, 0, 10).await;
        let cart = cart_of(&[(&p, 2)]);

        let held = engine.hold_cart(&cart.lines, "Blue shirt").await.unwrap();
        let listed = engine.list_held_carts().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].items, cart.lines);

        engine.delete_held_cart(&held.id).await.unwrap();
        assert!(engine.list_held_carts().await.unwrap().is_empty());
        assert!(engine.hold_cart(&[], "empty").await.is_err());
    }

    #[tokio::test]
    async fn test_receive_purchase() {
        let engine = engine().await;
        let p = product(&engine, "FLOUR", 5000, 0, 0).await;
        let supplier = engine.database().parties().insert_supplier("Metro", None).await.unwrap();

        let lines = [PurchaseLine {
            product_id: p.id.clone(),
            quantity: Quantity::from_units(10),
            unit_cost: Money::from_cents(4000),
        }];
        let number = engine
            .receive_purchase(&supplier.id, &lines, Money::from_cents(10000), Some("Invoice 77"))
            .await
            .unwrap();

        assert_eq!(number, format_number(DocumentKind::PurchaseOrder, SequenceGenerator::today(), 1));
        assert_eq!(stock(&engine, &p).await, Quantity::from_units(10));
        assert_eq!(
            engine
                .database()
                .parties()
                .balance(PartyKind::Supplier, &supplier.id)
                .await
                .unwrap()
                .cents(),
            30000
        );

        let order = engine.database().purchases().get_by_number(&number).await.unwrap().unwrap();
        assert_eq!(order.total_cents, 40000);

        let err = engine
            .receive_purchase("nobody", &lines, Money::zero(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SettleError::PartyNotFound { kind: PartyKind::Supplier, .. }));
    }

    #[tokio::test]
    async fn test_estimate_has_no_side_effects() {
        let engine = engine().await;
        let p = product(&engine, "WIDGET", 10000, 1800, 10).await;

        let number = engine
            .save_estimate(&cart_of(&[(&p, 3)]), &SaleOptions::default())
            .await
            .unwrap();

        assert_eq!(number, format_number(DocumentKind::Estimate, SequenceGenerator::today(), 1));
        assert_eq!(stock(&engine, &p).await, Quantity::from_units(10));

        let estimate = engine.database().estimates().get_by_number(&number).await.unwrap().unwrap();
        assert_eq!(estimate.total_cents, 35400);
        assert_eq!(engine.database().outbox().count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_customer_payment_rules() {
        let engine = engine().await;
        let customer = engine.database().parties().insert_customer("Asha", None).await.unwrap();

        // Cash needs the drawer
        assert!(matches!(
            engine
                .receive_customer_payment(&customer.id, Money::from_cents(100), TenderMode::Cash, "")
                .await,
            Err(SettleError::NoOpenCashSession)
        ));
        assert!(engine
            .receive_customer_payment(&customer.id, Money::from_cents(100), TenderMode::Credit, "")
            .await
            .is_err());

        let balance = engine
            .receive_customer_payment(&customer.id, Money::from_cents(100), TenderMode::Card, "advance")
            .await
            .unwrap();
        assert_eq!(balance.cents(), -100);
    }
}
