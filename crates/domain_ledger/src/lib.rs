//! Ledger Domain - Accounting-Note Conversion and Ledger Consistency
//!
//! This crate turns ad-hoc operational expense notes into durable financial
//! records and keeps the cross-entity balances consistent under concurrent
//! access.
//!
//! # Components
//!
//! - **PM Advance Ledger** ([`advance`]): cash floats issued to project
//!   managers, drawn down atomically by conversions
//! - **Claim Invoice Consolidator** ([`consolidator`]): one open CLAIM invoice
//!   per unit that accumulates converted expenses
//! - **Note State Machine** ([`conversion`]): `PENDING -> CONVERTED | REJECTED`,
//!   with conversion running as one transaction
//! - **Payment Application & Reconciliation** ([`reconciliation`]): payments
//!   against invoices plus the drift and overpayment repair routines
//!
//! # Balance invariants
//!
//! - Invoice: `remaining_balance == round(amount - total_paid, 2)` and
//!   `is_paid == (remaining_balance <= 0.01)`
//! - PM advance: `0 <= remaining_amount <= amount`
//! - A note is converted at most once
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_ledger::{ConversionRequest, NoteService};
//!
//! let notes = NoteService::new(store.clone());
//! let result = notes.convert(note_id, ConversionRequest::default(), &actor).await?;
//! if result.invoice_created {
//!     println!("created {}", result.invoice.invoice_number);
//! }
//! ```

pub mod actor;
pub mod advance;
pub mod consolidator;
pub mod conversion;
pub mod error;
pub mod expense;
pub mod invoice;
pub mod note;
pub mod payment;
pub mod ports;
pub mod reconciliation;
pub mod unit;

pub use actor::{Actor, ActorRole};
pub use advance::{PmAdvance, PmAdvanceLedger};
pub use consolidator::Consolidation;
pub use conversion::{ConversionRequest, ConversionResult, NoteService};
pub use error::LedgerError;
pub use expense::OperationalExpense;
pub use invoice::{claim_invoice_number, Invoice, InvoiceType};
pub use note::{
    AccountingNote, Funding, NewAccountingNote, NoteConversion, NoteStatus, SourceType,
    DEFAULT_SOURCE_TYPE,
};
pub use payment::Payment;
pub use ports::{LedgerStore, LedgerTx};
pub use reconciliation::{
    InvoiceRepair, InvoiceTotals, PaymentApplication, PaymentService, RepairKind, RepairReport,
};
pub use unit::{OwnerAssociation, Unit};
