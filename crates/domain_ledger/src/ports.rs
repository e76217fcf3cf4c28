//! Ledger Domain Ports
//!
//! The ledger needs two things from its store: plain reads outside any
//! transaction ([`LedgerStore`]) and a transaction handle ([`LedgerTx`])
//! whose writes become visible together on [`LedgerTx::commit`] and vanish
//! if the handle is dropped.
//!
//! # Conditional writes
//!
//! Every write that guards a shared balance or a state transition is a
//! single conditional statement evaluated by the store. Such methods return
//! `bool` (or `Option`) and "nothing matched" is the authoritative failure
//! signal; services never read a value, check it in Rust, then write it back.
//!
//! | method                  | guard                                          |
//! |-------------------------|------------------------------------------------|
//! | `reserve_advance`       | `remaining_amount >= amount`                   |
//! | `mark_note_converted`   | `status = PENDING`                             |
//! | `mark_note_rejected`    | `status = PENDING`                             |
//! | `delete_pending_note`   | `status = PENDING`                             |
//! | `increment_open_invoice`| `is_paid = false`                              |
//! | `add_to_total_paid`     | `is_paid = false`, `total_paid + x <= amount + 0.01` |
//! | `set_advance_remaining` | `0 <= remaining <= amount`                     |
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut tx = store.begin().await?;
//! if !tx.reserve_advance(advance_id, amount).await? {
//!     // insufficient funds; dropping `tx` rolls back
//! }
//! tx.commit().await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use core_kernel::money::InvoiceBalance;
use core_kernel::{
    AdvanceId, DomainPort, ExpenseId, HealthCheckable, InvoiceId, NoteId, PaymentId, PortError,
    UnitId,
};

use crate::advance::PmAdvance;
use crate::expense::OperationalExpense;
use crate::invoice::{Invoice, InvoiceType};
use crate::note::{AccountingNote, NoteConversion};
use crate::payment::Payment;
use crate::unit::{OwnerAssociation, Unit};

/// Read access and transaction factory for the ledger tables
#[async_trait]
pub trait LedgerStore: DomainPort + HealthCheckable {
    /// Transaction handle; dropping it without commit rolls back
    type Tx: LedgerTx;

    /// Opens a transaction
    async fn begin(&self) -> Result<Self::Tx, PortError>;

    async fn get_note(&self, id: NoteId) -> Result<Option<AccountingNote>, PortError>;

    async fn get_unit(&self, id: UnitId) -> Result<Option<Unit>, PortError>;

    async fn get_advance(&self, id: AdvanceId) -> Result<Option<PmAdvance>, PortError>;

    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, PortError>;

    async fn get_expense(&self, id: ExpenseId) -> Result<Option<OperationalExpense>, PortError>;

    /// Invoice ids oldest first, optionally restricted to one type
    async fn list_invoice_ids(
        &self,
        invoice_type: Option<InvoiceType>,
    ) -> Result<Vec<InvoiceId>, PortError>;

    /// Payments for an invoice, oldest first
    async fn payments_for_invoice(&self, invoice_id: InvoiceId) -> Result<Vec<Payment>, PortError>;
}

/// Writes inside one atomic transaction
#[async_trait]
pub trait LedgerTx: Send {
    // ------------------------------------------------------------------
    // Units and owner associations
    // ------------------------------------------------------------------

    /// Loads the unit and holds it locked until the transaction ends
    ///
    /// Serializes claim-invoice consolidation per unit.
    async fn lock_unit(&mut self, id: UnitId) -> Result<Option<Unit>, PortError>;

    async fn find_owner_association(
        &mut self,
        unit_id: UnitId,
    ) -> Result<Option<OwnerAssociation>, PortError>;

    async fn insert_owner_association(
        &mut self,
        association: &OwnerAssociation,
    ) -> Result<(), PortError>;

    // ------------------------------------------------------------------
    // Invoices
    // ------------------------------------------------------------------

    /// Most recently issued unpaid CLAIM invoice for the unit
    async fn find_open_claim_invoice(&mut self, unit_id: UnitId)
        -> Result<Option<Invoice>, PortError>;

    /// Adds to `amount` and `remaining_balance` while the invoice is unpaid
    ///
    /// Returns `None` when the invoice was paid in the meantime.
    async fn increment_open_invoice(
        &mut self,
        id: InvoiceId,
        amount: Decimal,
    ) -> Result<Option<Invoice>, PortError>;

    /// Fails with `PortError::Conflict` on a duplicate invoice number or a
    /// second open CLAIM invoice for the same unit
    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError>;

    /// Loads the invoice and holds it locked until the transaction ends
    async fn lock_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, PortError>;

    /// Adds to `total_paid` unless that would overshoot `amount` by more than
    /// the paid tolerance or the invoice is already paid
    async fn add_to_total_paid(
        &mut self,
        id: InvoiceId,
        amount: Decimal,
    ) -> Result<Option<Invoice>, PortError>;

    /// Overwrites the paid total and the derived balance fields
    ///
    /// Reopening a CLAIM invoice while its unit has another open one fails
    /// with a conflict.
    async fn write_invoice_totals(
        &mut self,
        id: InvoiceId,
        total_paid: Decimal,
        balance: InvoiceBalance,
    ) -> Result<Invoice, PortError>;

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError>;

    /// Payments for an invoice, oldest first
    async fn list_payments(&mut self, invoice_id: InvoiceId) -> Result<Vec<Payment>, PortError>;

    async fn delete_payment(&mut self, id: PaymentId) -> Result<bool, PortError>;

    // ------------------------------------------------------------------
    // PM advances
    // ------------------------------------------------------------------

    async fn find_advance(&mut self, id: AdvanceId) -> Result<Option<PmAdvance>, PortError>;

    /// Decrements `remaining_amount` only if it covers `amount`
    async fn reserve_advance(&mut self, id: AdvanceId, amount: Decimal) -> Result<bool, PortError>;

    async fn insert_advance(&mut self, advance: &PmAdvance) -> Result<(), PortError>;

    /// Sets `remaining_amount` if it lies within `0..=amount`
    async fn set_advance_remaining(
        &mut self,
        id: AdvanceId,
        remaining: Decimal,
    ) -> Result<Option<PmAdvance>, PortError>;

    // ------------------------------------------------------------------
    // Notes and expenses
    // ------------------------------------------------------------------

    async fn insert_note(&mut self, note: &AccountingNote) -> Result<(), PortError>;

    /// `PENDING -> CONVERTED`; false when the note is no longer pending
    async fn mark_note_converted(
        &mut self,
        id: NoteId,
        conversion: &NoteConversion,
    ) -> Result<bool, PortError>;

    /// `PENDING -> REJECTED`; false when the note is no longer pending
    async fn mark_note_rejected(
        &mut self,
        id: NoteId,
        rejected_at: DateTime<Utc>,
    ) -> Result<bool, PortError>;

    /// Deletes the note only while it is pending
    async fn delete_pending_note(&mut self, id: NoteId) -> Result<bool, PortError>;

    async fn insert_expense(&mut self, expense: &OperationalExpense) -> Result<(), PortError>;

    /// Backfills `converted_from_note_id`
    async fn link_expense_to_note(
        &mut self,
        expense_id: ExpenseId,
        note_id: NoteId,
    ) -> Result<(), PortError>;

    /// Makes every write visible atomically
    async fn commit(self) -> Result<(), PortError>;
}

/// In-memory store for tests
///
/// A transaction holds the store lock from `begin` until commit or drop, so
/// transactions are fully serialized. Reads through [`LedgerStore`] also
/// take the lock; never call them while holding a transaction on the same
/// store.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex as StdMutex};
    use tokio::sync::{Mutex, OwnedMutexGuard};

    use core_kernel::money::{exceeds_with_tolerance, round_money};
    use core_kernel::{AdapterHealth, HealthCheckResult, OwnerAssociationId};

    use crate::note::NoteStatus;
    use crate::payment::sort_chronologically;

    type BeginHook = Box<dyn FnOnce(&mut LedgerSnapshot) + Send>;

    /// Committed contents of the in-memory store
    #[derive(Debug, Clone, Default)]
    pub struct LedgerSnapshot {
        pub units: HashMap<UnitId, Unit>,
        pub owner_associations: HashMap<OwnerAssociationId, OwnerAssociation>,
        pub invoices: HashMap<InvoiceId, Invoice>,
        pub payments: Vec<Payment>,
        pub advances: HashMap<AdvanceId, PmAdvance>,
        pub notes: HashMap<NoteId, AccountingNote>,
        pub expenses: HashMap<ExpenseId, OperationalExpense>,
    }

    impl LedgerSnapshot {
        pub fn payment_total(&self, invoice_id: InvoiceId) -> Decimal {
            round_money(
                self.payments
                    .iter()
                    .filter(|p| p.invoice_id == invoice_id)
                    .map(|p| p.amount)
                    .sum(),
            )
        }

        pub fn invoices_for_unit(&self, unit_id: UnitId) -> Vec<&Invoice> {
            self.invoices.values().filter(|i| i.unit_id == unit_id).collect()
        }

        fn invoice_mut(&mut self, id: InvoiceId) -> Result<&mut Invoice, PortError> {
            self.invoices
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Invoice", id))
        }
    }

    /// In-memory implementation of [`LedgerStore`]
    #[derive(Clone, Default)]
    pub struct InMemoryLedger {
        state: Arc<Mutex<LedgerSnapshot>>,
        before_begin: Arc<StdMutex<Option<BeginHook>>>,
    }

    impl InMemoryLedger {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn seed_unit(&self, unit: Unit) -> Unit {
            self.state.lock().await.units.insert(unit.id, unit.clone());
            unit
        }

        pub async fn seed_invoice(&self, invoice: Invoice) -> Invoice {
            self.state.lock().await.invoices.insert(invoice.id, invoice.clone());
            invoice
        }

        /// Inserts a payment without touching invoice totals, like a bulk import
        pub async fn seed_payment(&self, payment: Payment) -> Payment {
            self.state.lock().await.payments.push(payment.clone());
            payment
        }

        pub async fn seed_advance(&self, advance: PmAdvance) -> PmAdvance {
            self.state.lock().await.advances.insert(advance.id, advance.clone());
            advance
        }

        pub async fn seed_note(&self, note: AccountingNote) -> AccountingNote {
            self.state.lock().await.notes.insert(note.id, note.clone());
            note
        }

        /// Copy of the committed state
        pub async fn snapshot(&self) -> LedgerSnapshot {
            self.state.lock().await.clone()
        }

        /// Runs `hook` against committed state right before the next
        /// transaction opens, simulating a writer that committed first
        pub fn before_next_begin<F>(&self, hook: F)
        where
            F: FnOnce(&mut LedgerSnapshot) + Send + 'static,
        {
            if let Ok(mut slot) = self.before_begin.lock() {
                *slot = Some(Box::new(hook));
            }
        }

        fn take_hook(&self) -> Option<BeginHook> {
            self.before_begin.lock().ok().and_then(|mut slot| slot.take())
        }
    }

    impl DomainPort for InMemoryLedger {}

    #[async_trait]
    impl HealthCheckable for InMemoryLedger {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "in-memory-ledger".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("In-memory store always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl LedgerStore for InMemoryLedger {
        type Tx = InMemoryTx;

        async fn begin(&self) -> Result<InMemoryTx, PortError> {
            let mut guard = self.state.clone().lock_owned().await;
            if let Some(hook) = self.take_hook() {
                hook(&mut *guard);
            }
            let working = guard.clone();
            Ok(InMemoryTx { guard, working })
        }

        async fn get_note(&self, id: NoteId) -> Result<Option<AccountingNote>, PortError> {
            Ok(self.state.lock().await.notes.get(&id).cloned())
        }

        async fn get_unit(&self, id: UnitId) -> Result<Option<Unit>, PortError> {
            Ok(self.state.lock().await.units.get(&id).cloned())
        }

        async fn get_advance(&self, id: AdvanceId) -> Result<Option<PmAdvance>, PortError> {
            Ok(self.state.lock().await.advances.get(&id).cloned())
        }

        async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, PortError> {
            Ok(self.state.lock().await.invoices.get(&id).cloned())
        }

        async fn get_expense(&self, id: ExpenseId) -> Result<Option<OperationalExpense>, PortError> {
            Ok(self.state.lock().await.expenses.get(&id).cloned())
        }

        async fn list_invoice_ids(
            &self,
            invoice_type: Option<InvoiceType>,
        ) -> Result<Vec<InvoiceId>, PortError> {
            let state = self.state.lock().await;
            let mut invoices: Vec<_> = state
                .invoices
                .values()
                .filter(|i| invoice_type.map_or(true, |t| i.invoice_type == t))
                .collect();
            invoices.sort_by_key(|i| (i.issued_at, i.id));
            Ok(invoices.into_iter().map(|i| i.id).collect())
        }

        async fn payments_for_invoice(&self, invoice_id: InvoiceId) -> Result<Vec<Payment>, PortError> {
            let state = self.state.lock().await;
            let mut payments: Vec<_> = state
                .payments
                .iter()
                .filter(|p| p.invoice_id == invoice_id)
                .cloned()
                .collect();
            sort_chronologically(&mut payments);
            Ok(payments)
        }
    }

    /// Transaction over a private copy of the store
    pub struct InMemoryTx {
        guard: OwnedMutexGuard<LedgerSnapshot>,
        working: LedgerSnapshot,
    }

    #[async_trait]
    impl LedgerTx for InMemoryTx {
        async fn lock_unit(&mut self, id: UnitId) -> Result<Option<Unit>, PortError> {
            Ok(self.working.units.get(&id).cloned())
        }

        async fn find_owner_association(
            &mut self,
            unit_id: UnitId,
        ) -> Result<Option<OwnerAssociation>, PortError> {
            Ok(self
                .working
                .owner_associations
                .values()
                .find(|a| a.unit_id == unit_id)
                .cloned())
        }

        async fn insert_owner_association(
            &mut self,
            association: &OwnerAssociation,
        ) -> Result<(), PortError> {
            if self.working.owner_associations.values().any(|a| a.unit_id == association.unit_id) {
                return Err(PortError::conflict(format!(
                    "owner association already exists for unit {}",
                    association.unit_id
                )));
            }
            self.working
                .owner_associations
                .insert(association.id, association.clone());
            Ok(())
        }

        async fn find_open_claim_invoice(
            &mut self,
            unit_id: UnitId,
        ) -> Result<Option<Invoice>, PortError> {
            Ok(self
                .working
                .invoices
                .values()
                .filter(|i| i.unit_id == unit_id && i.is_open_claim())
                .max_by_key(|i| (i.issued_at, i.id))
                .cloned())
        }

        async fn increment_open_invoice(
            &mut self,
            id: InvoiceId,
            amount: Decimal,
        ) -> Result<Option<Invoice>, PortError> {
            let invoice = self.working.invoice_mut(id)?;
            if invoice.is_paid {
                return Ok(None);
            }
            invoice.add_expense(amount);
            Ok(Some(invoice.clone()))
        }

        async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
            let invoices = &self.working.invoices;
            if invoices.values().any(|i| i.invoice_number == invoice.invoice_number) {
                return Err(PortError::conflict(format!(
                    "duplicate invoice number {}",
                    invoice.invoice_number
                )));
            }
            if invoice.is_open_claim()
                && invoices
                    .values()
                    .any(|i| i.unit_id == invoice.unit_id && i.is_open_claim())
            {
                return Err(PortError::conflict(format!(
                    "unit {} already has an open claim invoice",
                    invoice.unit_id
                )));
            }
            if !self.working.units.contains_key(&invoice.unit_id) {
                return Err(PortError::constraint(format!("unknown unit {}", invoice.unit_id)));
            }
            self.working.invoices.insert(invoice.id, invoice.clone());
            Ok(())
        }

        async fn lock_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, PortError> {
            Ok(self.working.invoices.get(&id).cloned())
        }

        async fn add_to_total_paid(
            &mut self,
            id: InvoiceId,
            amount: Decimal,
        ) -> Result<Option<Invoice>, PortError> {
            let invoice = self.working.invoice_mut(id)?;
            if invoice.is_paid || exceeds_with_tolerance(invoice.total_paid + amount, invoice.amount) {
                return Ok(None);
            }
            invoice.total_paid = round_money(invoice.total_paid + amount);
            Ok(Some(invoice.clone()))
        }

        async fn write_invoice_totals(
            &mut self,
            id: InvoiceId,
            total_paid: Decimal,
            balance: InvoiceBalance,
        ) -> Result<Invoice, PortError> {
            let (unit_id, invoice_type) = {
                let invoice = self.working.invoice_mut(id)?;
                (invoice.unit_id, invoice.invoice_type)
            };
            if invoice_type == InvoiceType::Claim
                && !balance.is_paid
                && self
                    .working
                    .invoices
                    .values()
                    .any(|i| i.id != id && i.unit_id == unit_id && i.is_open_claim())
            {
                return Err(PortError::conflict(format!(
                    "unit {} already has an open claim invoice",
                    unit_id
                )));
            }
            let invoice = self.working.invoice_mut(id)?;
            invoice.apply_totals(total_paid, balance);
            Ok(invoice.clone())
        }

        async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
            if payment.amount <= Decimal::ZERO {
                return Err(PortError::constraint("payment amount must be positive"));
            }
            if !self.working.invoices.contains_key(&payment.invoice_id) {
                return Err(PortError::constraint(format!(
                    "unknown invoice {}",
                    payment.invoice_id
                )));
            }
            self.working.payments.push(payment.clone());
            Ok(())
        }

        async fn list_payments(&mut self, invoice_id: InvoiceId) -> Result<Vec<Payment>, PortError> {
            let mut payments: Vec<_> = self
                .working
                .payments
                .iter()
                .filter(|p| p.invoice_id == invoice_id)
                .cloned()
                .collect();
            sort_chronologically(&mut payments);
            Ok(payments)
        }

        async fn delete_payment(&mut self, id: PaymentId) -> Result<bool, PortError> {
            let before = self.working.payments.len();
            self.working.payments.retain(|p| p.id != id);
            Ok(self.working.payments.len() < before)
        }

        async fn find_advance(&mut self, id: AdvanceId) -> Result<Option<PmAdvance>, PortError> {
            Ok(self.working.advances.get(&id).cloned())
        }

        async fn reserve_advance(&mut self, id: AdvanceId, amount: Decimal) -> Result<bool, PortError> {
            match self.working.advances.get_mut(&id) {
                Some(advance) if advance.remaining_amount >= amount => {
                    advance.remaining_amount = round_money(advance.remaining_amount - amount);
                    advance.updated_at = Utc::now();
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn insert_advance(&mut self, advance: &PmAdvance) -> Result<(), PortError> {
            if advance.remaining_amount < Decimal::ZERO || advance.remaining_amount > advance.amount {
                return Err(PortError::constraint("remaining_amount outside 0..=amount"));
            }
            self.working.advances.insert(advance.id, advance.clone());
            Ok(())
        }

        async fn set_advance_remaining(
            &mut self,
            id: AdvanceId,
            remaining: Decimal,
        ) -> Result<Option<PmAdvance>, PortError> {
            match self.working.advances.get_mut(&id) {
                Some(advance) if remaining >= Decimal::ZERO && remaining <= advance.amount => {
                    advance.remaining_amount = remaining;
                    advance.updated_at = Utc::now();
                    Ok(Some(advance.clone()))
                }
                _ => Ok(None),
            }
        }

        async fn insert_note(&mut self, note: &AccountingNote) -> Result<(), PortError> {
            if let Some(unit_id) = note.unit_id {
                if !self.working.units.contains_key(&unit_id) {
                    return Err(PortError::constraint(format!("unknown unit {}", unit_id)));
                }
            }
            self.working.notes.insert(note.id, note.clone());
            Ok(())
        }

        async fn mark_note_converted(
            &mut self,
            id: NoteId,
            conversion: &NoteConversion,
        ) -> Result<bool, PortError> {
            if !self.working.expenses.contains_key(&conversion.expense_id) {
                return Err(PortError::constraint(format!(
                    "unknown expense {}",
                    conversion.expense_id
                )));
            }
            match self.working.notes.get_mut(&id) {
                Some(note) if note.status == NoteStatus::Pending => {
                    note.apply_conversion(conversion);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn mark_note_rejected(
            &mut self,
            id: NoteId,
            rejected_at: DateTime<Utc>,
        ) -> Result<bool, PortError> {
            match self.working.notes.get_mut(&id) {
                Some(note) if note.status == NoteStatus::Pending => {
                    note.apply_rejection(rejected_at);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn delete_pending_note(&mut self, id: NoteId) -> Result<bool, PortError> {
            let pending = self
                .working
                .notes
                .get(&id)
                .map_or(false, |n| n.status == NoteStatus::Pending);
            if pending {
                self.working.notes.remove(&id);
            }
            Ok(pending)
        }

        async fn insert_expense(&mut self, expense: &OperationalExpense) -> Result<(), PortError> {
            if !self.working.invoices.contains_key(&expense.claim_invoice_id) {
                return Err(PortError::constraint(format!(
                    "unknown invoice {}",
                    expense.claim_invoice_id
                )));
            }
            if let Some(advance_id) = expense.pm_advance_id {
                if !self.working.advances.contains_key(&advance_id) {
                    return Err(PortError::constraint(format!("unknown advance {}", advance_id)));
                }
            }
            self.working.expenses.insert(expense.id, expense.clone());
            Ok(())
        }

        async fn link_expense_to_note(
            &mut self,
            expense_id: ExpenseId,
            note_id: NoteId,
        ) -> Result<(), PortError> {
            let expense = self
                .working
                .expenses
                .get_mut(&expense_id)
                .ok_or_else(|| PortError::not_found("OperationalExpense", expense_id))?;
            expense.converted_from_note_id = Some(note_id);
            Ok(())
        }

        async fn commit(self) -> Result<(), PortError> {
            let InMemoryTx { mut guard, working } = self;
            *guard = working;
            Ok(())
        }
    }
}
