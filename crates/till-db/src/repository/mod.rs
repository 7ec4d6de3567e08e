//! # Repository Module
//!
//! Database repository implementations for Till POS.
//!
//! ## Two Kinds of Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Pool methods (&self)              tx_* functions (conn)                │
//! │  ────────────────────              ─────────────────────                │
//! │  db.bills().get_by_number(..)      BillRepository::tx_insert_header(    │
//! │  db.products().insert(..)              &mut tx, ..)                     │
//! │                                                                         │
//! │  Own connection per call.          Caller's transaction. Nothing is     │
//! │  Lookups, master data,             visible until the caller commits.    │
//! │  standalone writes.                Used by every settlement step.       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Products and stock deltas
//! - [`BillRepository`] - Bill headers, lines and tenders
//! - [`PartyRepository`] - Customers, suppliers and their ledgers
//! - [`CashRepository`] - Cash sessions and drawer movements
//! - [`JournalRepository`] - Double-entry journal
//! - [`PurchaseRepository`] - Purchase orders
//! - [`EstimateRepository`] - Estimates
//! - [`DocumentRepository`] - Date-prefix counts for numbering
//! - [`HeldCartRepository`] - Parked carts
//! - [`WorkingCartRepository`] - Crash-recovery snapshot of the live cart
//! - [`OutboxRepository`] - Background work queue

pub mod bill;
pub mod cash;
pub mod document;
pub mod estimate;
pub mod held_cart;
pub mod journal;
pub mod outbox;
pub mod party;
pub mod product;
pub mod purchase;
pub mod working_cart;

pub use bill::{BillRepository, NewBill, NewBillLine};
pub use cash::CashRepository;
pub use document::DocumentRepository;
pub use estimate::EstimateRepository;
pub use held_cart::{HeldCart, HeldCartRepository};
pub use journal::{JournalLineRow, JournalRepository};
pub use outbox::OutboxRepository;
pub use party::{NewLedgerEntry, PartyRepository};
pub use product::ProductRepository;
pub use purchase::{PurchaseLineRow, PurchaseRepository};
pub use working_cart::WorkingCartRepository;
