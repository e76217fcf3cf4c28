//! Payment Application & Reconciliation
//!
//! [`PaymentService::apply_payment`] is the only sanctioned way to record a
//! payment. Two maintenance routines repair what bypassed it:
//!
//! - [`PaymentService::reconcile_all`] recomputes every invoice's totals from
//!   its payment rows and writes back only what differs. Re-running it is a
//!   no-op.
//! - [`PaymentService::repair_overpayments`] deletes the most recent payment
//!   of an over-collected CLAIM invoice until the payments fit the amount.
//!
//! All three derive balances through [`derive_invoice_state`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::money::{
    derive_invoice_state, exceeds_with_tolerance, positive_amount, sum_money, InvoiceBalance,
};
use core_kernel::{InvoiceId, PaymentId};

use crate::actor::Actor;
use crate::error::LedgerError;
use crate::invoice::{Invoice, InvoiceType};
use crate::payment::Payment;
use crate::ports::{LedgerStore, LedgerTx};

/// Stored totals of an invoice at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub amount: Decimal,
    pub total_paid: Decimal,
    pub remaining_balance: Decimal,
    pub is_paid: bool,
}

impl From<&Invoice> for InvoiceTotals {
    fn from(invoice: &Invoice) -> Self {
        Self {
            amount: invoice.amount,
            total_paid: invoice.total_paid,
            remaining_balance: invoice.remaining_balance,
            is_paid: invoice.is_paid,
        }
    }
}

impl InvoiceTotals {
    /// Totals derived from the invoice amount and a ground-truth paid sum
    pub fn derived(amount: Decimal, total_paid: Decimal) -> Self {
        let balance = derive_invoice_state(amount, total_paid);
        Self {
            amount,
            total_paid,
            remaining_balance: balance.remaining_balance,
            is_paid: balance.is_paid,
        }
    }
}

/// Which maintenance routine produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairKind {
    Reconcile,
    OverpaymentRepair,
}

/// Per-invoice outcome of a maintenance run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRepair {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub before: InvoiceTotals,
    pub after: InvoiceTotals,
    /// True when stored values were wrong and have been rewritten
    pub discrepancy: bool,
    /// Payments deleted by overpayment repair, most recent first
    pub removed_payments: Vec<PaymentId>,
    /// The correction would reopen a CLAIM invoice while its unit already has
    /// an open one. Nothing was written; `after` holds the refused totals.
    pub unresolved: bool,
}

/// Audit report of a maintenance run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairReport {
    pub kind: RepairKind,
    /// One entry per invoice examined
    pub entries: Vec<InvoiceRepair>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RepairReport {
    fn start(kind: RepairKind) -> Self {
        let now = Utc::now();
        Self {
            kind,
            entries: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// Entries whose stored values had to change
    pub fn discrepancies(&self) -> impl Iterator<Item = &InvoiceRepair> {
        self.entries.iter().filter(|e| e.discrepancy)
    }

    /// Entries left untouched because correcting them would open a second
    /// claim invoice for their unit
    pub fn unresolved(&self) -> impl Iterator<Item = &InvoiceRepair> {
        self.entries.iter().filter(|e| e.unresolved)
    }

    pub fn is_clean(&self) -> bool {
        self.discrepancies().next().is_none() && self.unresolved().next().is_none()
    }
}

/// Outcome of a successful payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentApplication {
    pub payment: Payment,
    pub invoice: Invoice,
}

/// Largest payment the invoice still accepts
///
/// A paid invoice accepts nothing, even inside the tolerance.
fn max_allowed(invoice: &Invoice) -> Decimal {
    let balance = invoice.derived_balance();
    if balance.is_paid {
        Decimal::ZERO
    } else {
        balance.remaining_balance.max(Decimal::ZERO)
    }
}

/// Applies payments and runs the balance maintenance routines
pub struct PaymentService<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> PaymentService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn get_invoice(&self, invoice_id: InvoiceId) -> Result<Invoice, LedgerError> {
        self.store
            .get_invoice(invoice_id)
            .await?
            .ok_or(LedgerError::InvoiceNotFound(invoice_id))
    }

    pub async fn payments(&self, invoice_id: InvoiceId) -> Result<Vec<Payment>, LedgerError> {
        Ok(self.store.payments_for_invoice(invoice_id).await?)
    }

    /// Records a payment and updates the invoice totals atomically
    #[instrument(skip(self), fields(invoice_id = %invoice_id, actor = %actor.id))]
    pub async fn apply_payment(
        &self,
        invoice_id: InvoiceId,
        amount: Decimal,
        actor: &Actor,
    ) -> Result<PaymentApplication, LedgerError> {
        actor.require_ledger_poster("apply payments")?;
        let amount = positive_amount(amount)?;

        let mut tx = self.store.begin().await?;
        let invoice = tx
            .lock_invoice(invoice_id)
            .await?
            .ok_or(LedgerError::InvoiceNotFound(invoice_id))?;

        let overpayment = LedgerError::Overpayment {
            invoice_id,
            attempted: amount,
            max_allowed: max_allowed(&invoice),
        };
        if invoice.derived_balance().is_paid
            || exceeds_with_tolerance(invoice.total_paid + amount, invoice.amount)
        {
            return Err(overpayment);
        }

        let payment = Payment::new(invoice_id, amount, Some(actor.id));
        tx.insert_payment(&payment).await?;

        let Some(updated) = tx.add_to_total_paid(invoice_id, amount).await? else {
            warn!("Conditional paid-total update matched nothing");
            return Err(overpayment);
        };
        let balance = derive_invoice_state(updated.amount, updated.total_paid);
        let invoice = tx
            .write_invoice_totals(invoice_id, updated.total_paid, balance)
            .await?;
        tx.commit().await?;

        info!(
            payment_id = %payment.id,
            amount = %amount,
            remaining = %invoice.remaining_balance,
            is_paid = invoice.is_paid,
            "Payment applied"
        );
        Ok(PaymentApplication { payment, invoice })
    }

    /// Recomputes every invoice's totals from its payment rows
    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn reconcile_all(&self, actor: &Actor) -> Result<RepairReport, LedgerError> {
        actor.require_admin("reconcile invoices")?;

        let mut report = RepairReport::start(RepairKind::Reconcile);
        for invoice_id in self.store.list_invoice_ids(None).await? {
            if let Some(entry) = self.reconcile_invoice(invoice_id).await? {
                report.entries.push(entry);
            }
        }

        let report = report.finish();
        info!(
            checked = report.entries.len(),
            corrected = report.discrepancies().count(),
            unresolved = report.unresolved().count(),
            "Invoice reconciliation finished"
        );
        Ok(report)
    }

    async fn reconcile_invoice(&self, invoice_id: InvoiceId) -> Result<Option<InvoiceRepair>, LedgerError> {
        let mut tx = self.store.begin().await?;
        let Some(invoice) = tx.lock_invoice(invoice_id).await? else {
            return Ok(None);
        };

        let payments = tx.list_payments(invoice_id).await?;
        let total_paid = sum_money(payments.iter().map(|p| p.amount));

        let before = InvoiceTotals::from(&invoice);
        let after = InvoiceTotals::derived(invoice.amount, total_paid);
        let discrepancy = before != after;

        if discrepancy {
            let balance = derive_invoice_state(after.amount, after.total_paid);
            if !write_totals_or_yield(&mut tx, &invoice, total_paid, balance).await? {
                return Ok(Some(InvoiceRepair::refused(invoice, before, after)));
            }
            tx.commit().await?;
            warn!(
                invoice_id = %invoice_id,
                stored_total_paid = %before.total_paid,
                actual_total_paid = %after.total_paid,
                "Invoice totals drifted from payment records; corrected"
            );
        }

        Ok(Some(InvoiceRepair {
            invoice_id,
            invoice_number: invoice.invoice_number,
            before,
            after,
            discrepancy,
            removed_payments: Vec::new(),
            unresolved: false,
        }))
    }

    /// Deletes the most recent payments of over-collected CLAIM invoices
    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn repair_overpayments(&self, actor: &Actor) -> Result<RepairReport, LedgerError> {
        actor.require_admin("repair overpayments")?;

        let mut report = RepairReport::start(RepairKind::OverpaymentRepair);
        for invoice_id in self.store.list_invoice_ids(Some(InvoiceType::Claim)).await? {
            if let Some(entry) = self.repair_invoice(invoice_id).await? {
                report.entries.push(entry);
            }
        }

        let report = report.finish();
        info!(
            checked = report.entries.len(),
            repaired = report.discrepancies().count(),
            unresolved = report.unresolved().count(),
            "Overpayment repair finished"
        );
        Ok(report)
    }

    async fn repair_invoice(&self, invoice_id: InvoiceId) -> Result<Option<InvoiceRepair>, LedgerError> {
        let mut tx = self.store.begin().await?;
        let Some(invoice) = tx.lock_invoice(invoice_id).await? else {
            return Ok(None);
        };

        let mut payments = tx.list_payments(invoice_id).await?;
        let mut total_paid = sum_money(payments.iter().map(|p| p.amount));
        let mut removed_payments = Vec::new();

        while exceeds_with_tolerance(total_paid, invoice.amount) {
            let Some(latest) = payments.pop() else { break };
            if !tx.delete_payment(latest.id).await? {
                return Err(LedgerError::Store(core_kernel::PortError::conflict(format!(
                    "payment {} vanished during overpayment repair",
                    latest.id
                ))));
            }
            removed_payments.push(latest.id);
            total_paid = sum_money(payments.iter().map(|p| p.amount));
        }

        let before = InvoiceTotals::from(&invoice);
        let after = InvoiceTotals::derived(invoice.amount, total_paid);
        let discrepancy = !removed_payments.is_empty() || before != after;

        if discrepancy {
            let balance = derive_invoice_state(after.amount, after.total_paid);
            if !write_totals_or_yield(&mut tx, &invoice, total_paid, balance).await? {
                // Dropping the transaction restores the deleted payments
                return Ok(Some(InvoiceRepair::refused(invoice, before, after)));
            }
            tx.commit().await?;
            if !removed_payments.is_empty() {
                warn!(
                    invoice_id = %invoice_id,
                    removed = removed_payments.len(),
                    total_paid = %total_paid,
                    "Over-collected claim invoice repaired by deleting payments"
                );
            }
        }

        Ok(Some(InvoiceRepair {
            invoice_id,
            invoice_number: invoice.invoice_number,
            before,
            after,
            discrepancy,
            removed_payments,
            unresolved: false,
        }))
    }
}

impl InvoiceRepair {
    fn refused(invoice: Invoice, before: InvoiceTotals, after: InvoiceTotals) -> Self {
        Self {
            invoice_id: invoice.id,
            invoice_number: invoice.invoice_number,
            before,
            after,
            discrepancy: false,
            removed_payments: Vec::new(),
            unresolved: true,
        }
    }
}

/// Writes corrected totals, returning false when the store refuses to reopen
/// a claim invoice next to another open one for the same unit
async fn write_totals_or_yield<T: LedgerTx>(
    tx: &mut T,
    invoice: &Invoice,
    total_paid: Decimal,
    balance: InvoiceBalance,
) -> Result<bool, LedgerError> {
    match tx.write_invoice_totals(invoice.id, total_paid, balance).await {
        Ok(_) => Ok(true),
        Err(err) if err.is_conflict() && invoice.invoice_type == InvoiceType::Claim => {
            warn!(
                invoice_id = %invoice.id,
                unit_id = %invoice.unit_id,
                error = %err,
                "Correction would reopen a second claim invoice for the unit; left unchanged"
            );
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::InMemoryLedger;
    use crate::unit::Unit;
    use chrono::Duration;
    use core_kernel::UserId;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<InMemoryLedger>,
        service: PaymentService<InMemoryLedger>,
        unit: Unit,
        accountant: Actor,
        admin: Actor,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryLedger::new());
        let unit = store.seed_unit(Unit::new("D-9", "Block D 9")).await;
        Fixture {
            service: PaymentService::new(Arc::clone(&store)),
            store,
            unit,
            accountant: Actor::accountant(UserId::new()),
            admin: Actor::admin(UserId::new()),
        }
    }

    impl Fixture {
        async fn invoice(&self, invoice_type: InvoiceType, number: &str, amount: Decimal) -> Invoice {
            self.store
                .seed_invoice(Invoice::new(invoice_type, number, self.unit.id, amount))
                .await
        }

        async fn imported_payment(&self, invoice_id: InvoiceId, amount: Decimal, days_ago: i64) -> Payment {
            self.store
                .seed_payment(
                    Payment::new(invoice_id, amount, None).recorded_at(Utc::now() - Duration::days(days_ago)),
                )
                .await
        }
    }

    #[tokio::test]
    async fn test_payments_round_trip_to_paid() {
        let fx = fixture().await;
        let invoice = fx.invoice(InvoiceType::ManagementService, "MS-1", dec!(1000.00)).await;

        fx.service.apply_payment(invoice.id, dec!(300.00), &fx.accountant).await.unwrap();
        let applied = fx.service.apply_payment(invoice.id, dec!(700.00), &fx.accountant).await.unwrap();

        assert_eq!(applied.invoice.total_paid, dec!(1000.00));
        assert_eq!(applied.invoice.remaining_balance, dec!(0.00));
        assert!(applied.invoice.is_paid);

        for extra in [dec!(0.01), dec!(5.00)] {
            let err = fx.service.apply_payment(invoice.id, extra, &fx.accountant).await.unwrap_err();
            assert!(matches!(
                err,
                LedgerError::Overpayment { max_allowed, .. } if max_allowed == Decimal::ZERO
            ));
        }
        assert_eq!(fx.service.payments(invoice.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_overpayment_reports_remaining_balance() {
        let fx = fixture().await;
        let invoice = fx.invoice(InvoiceType::Claim, "CLM-1-D-9", dec!(250.00)).await;
        fx.service.apply_payment(invoice.id, dec!(100.00), &fx.accountant).await.unwrap();

        let err = fx
            .service
            .apply_payment(invoice.id, dec!(150.02), &fx.accountant)
            .await
            .unwrap_err();
        match err {
            LedgerError::Overpayment { attempted, max_allowed, .. } => {
                assert_eq!(attempted, dec!(150.02));
                assert_eq!(max_allowed, dec!(150.00));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let stored = fx.service.get_invoice(invoice.id).await.unwrap();
        assert_eq!(stored.total_paid, dec!(100.00));
        assert_eq!(fx.service.payments(invoice.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_within_tolerance_settles_invoice() {
        let fx = fixture().await;
        let invoice = fx.invoice(InvoiceType::Claim, "CLM-2-D-9", dec!(100.00)).await;

        let applied = fx.service.apply_payment(invoice.id, dec!(100.01), &fx.accountant).await.unwrap();
        assert!(applied.invoice.is_paid);
        assert_eq!(applied.invoice.remaining_balance, dec!(-0.01));
    }

    #[tokio::test]
    async fn test_payment_validation() {
        let fx = fixture().await;
        let invoice = fx.invoice(InvoiceType::Claim, "CLM-3-D-9", dec!(100.00)).await;

        assert!(matches!(
            fx.service.apply_payment(invoice.id, dec!(0), &fx.accountant).await,
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            fx.service.apply_payment(invoice.id, dec!(-5), &fx.accountant).await,
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            fx.service.apply_payment(InvoiceId::new(), dec!(5), &fx.accountant).await,
            Err(LedgerError::InvoiceNotFound(_))
        ));
        let pm = Actor::new(UserId::new(), crate::actor::ActorRole::ProjectManager);
        assert!(matches!(
            fx.service.apply_payment(invoice.id, dec!(5), &pm).await,
            Err(LedgerError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_reconcile_fixes_drift_then_is_idempotent() {
        let fx = fixture().await;
        let drifted = fx.invoice(InvoiceType::ManagementService, "MS-2", dec!(400.00)).await;
        let clean = fx.invoice(InvoiceType::Claim, "CLM-4-D-9", dec!(80.00)).await;
        fx.imported_payment(drifted.id, dec!(150.00), 3).await;
        fx.imported_payment(drifted.id, dec!(250.00), 1).await;
        fx.service.apply_payment(clean.id, dec!(30.00), &fx.accountant).await.unwrap();

        let first = fx.service.reconcile_all(&fx.admin).await.unwrap();
        assert_eq!(first.entries.len(), 2);
        let fixed: Vec<_> = first.discrepancies().collect();
        assert_eq!(fixed.len(), 1);
        assert_eq!(fixed[0].invoice_id, drifted.id);
        assert_eq!(fixed[0].before.total_paid, dec!(0.00));
        assert_eq!(fixed[0].after.total_paid, dec!(400.00));
        assert!(fixed[0].after.is_paid);

        let stored = fx.service.get_invoice(drifted.id).await.unwrap();
        assert_eq!(stored.total_paid, dec!(400.00));
        assert_eq!(stored.remaining_balance, dec!(0.00));
        assert!(stored.is_paid);

        let second = fx.service.reconcile_all(&fx.admin).await.unwrap();
        assert!(second.is_clean());
        assert_eq!(second.kind, RepairKind::Reconcile);
    }

    #[tokio::test]
    async fn test_reconcile_requires_admin() {
        let fx = fixture().await;
        assert!(matches!(
            fx.service.reconcile_all(&fx.accountant).await,
            Err(LedgerError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_repair_overpayment_deletes_most_recent() {
        let fx = fixture().await;
        let invoice = fx.invoice(InvoiceType::Claim, "CLM-5-D-9", dec!(500.00)).await;
        fx.imported_payment(invoice.id, dec!(300.00), 3).await;
        fx.imported_payment(invoice.id, dec!(200.00), 2).await;
        let latest = fx.imported_payment(invoice.id, dec!(150.00), 1).await;

        let report = fx.service.repair_overpayments(&fx.admin).await.unwrap();

        let entry = &report.entries[0];
        assert_eq!(entry.removed_payments, vec![latest.id]);
        assert_eq!(entry.after.total_paid, dec!(500.00));
        assert!(entry.after.is_paid);

        let remaining = fx.service.payments(invoice.id).await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(sum_money(remaining.iter().map(|p| p.amount)), dec!(500.00));

        let stored = fx.service.get_invoice(invoice.id).await.unwrap();
        assert!(stored.is_consistent());
        assert_eq!(stored.remaining_balance, dec!(0.00));
    }

    #[tokio::test]
    async fn test_repair_keeps_removing_until_within_tolerance() {
        let fx = fixture().await;
        let invoice = fx.invoice(InvoiceType::Claim, "CLM-6-D-9", dec!(100.00)).await;
        fx.imported_payment(invoice.id, dec!(60.00), 4).await;
        let second = fx.imported_payment(invoice.id, dec!(50.00), 3).await;
        let third = fx.imported_payment(invoice.id, dec!(40.00), 2).await;

        let report = fx.service.repair_overpayments(&fx.admin).await.unwrap();

        assert_eq!(report.entries[0].removed_payments, vec![third.id, second.id]);
        assert_eq!(report.entries[0].after.total_paid, dec!(60.00));
        assert!(!report.entries[0].after.is_paid);
    }

    #[tokio::test]
    async fn test_repair_ignores_management_invoices() {
        let fx = fixture().await;
        let fee = fx.invoice(InvoiceType::ManagementService, "MS-3", dec!(50.00)).await;
        fx.imported_payment(fee.id, dec!(50.00), 2).await;
        fx.imported_payment(fee.id, dec!(50.00), 1).await;

        let report = fx.service.repair_overpayments(&fx.admin).await.unwrap();

        assert!(report.entries.is_empty());
        assert_eq!(fx.service.payments(fee.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_repair_is_admin_only_and_rerunnable() {
        let fx = fixture().await;
        let invoice = fx.invoice(InvoiceType::Claim, "CLM-7-D-9", dec!(10.00)).await;
        fx.imported_payment(invoice.id, dec!(10.00), 2).await;
        fx.imported_payment(invoice.id, dec!(10.00), 1).await;

        assert!(matches!(
            fx.service.repair_overpayments(&fx.accountant).await,
            Err(LedgerError::Forbidden { .. })
        ));

        assert!(!fx.service.repair_overpayments(&fx.admin).await.unwrap().is_clean());
        assert!(fx.service.repair_overpayments(&fx.admin).await.unwrap().is_clean());
    }

    fn open_claims(snapshot: &crate::ports::mock::LedgerSnapshot, unit: &Unit) -> usize {
        snapshot
            .invoices_for_unit(unit.id)
            .into_iter()
            .filter(|i| i.is_open_claim())
            .count()
    }

    #[tokio::test]
    async fn test_repair_leaves_claim_paid_when_unit_has_newer_open_claim() {
        let fx = fixture().await;
        let settled = fx.invoice(InvoiceType::Claim, "CLM-8-D-9", dec!(100.00)).await;
        let payment = fx.service.apply_payment(settled.id, dec!(100.00), &fx.accountant).await.unwrap();
        assert!(payment.invoice.is_paid);
        let newer = fx.invoice(InvoiceType::Claim, "CLM-9-D-9", dec!(40.00)).await;
        fx.imported_payment(settled.id, dec!(80.00), 5).await;

        let report = fx.service.repair_overpayments(&fx.admin).await.unwrap();

        let entry = report.entries.iter().find(|e| e.invoice_id == settled.id).unwrap();
        assert!(entry.unresolved);
        assert!(!entry.discrepancy);
        assert!(entry.removed_payments.is_empty());
        assert_eq!(entry.after.total_paid, dec!(80.00));
        assert!(!entry.after.is_paid);
        assert!(!report.is_clean());
        assert_eq!(report.unresolved().count(), 1);

        let snapshot = fx.store.snapshot().await;
        assert_eq!(open_claims(&snapshot, &fx.unit), 1);
        assert_eq!(fx.service.payments(settled.id).await.unwrap().len(), 2);
        let stored = fx.service.get_invoice(settled.id).await.unwrap();
        assert!(stored.is_paid);
        assert_eq!(stored.total_paid, dec!(100.00));
        assert!(!fx.service.get_invoice(newer.id).await.unwrap().is_paid);

        let rerun = fx.service.repair_overpayments(&fx.admin).await.unwrap();
        assert_eq!(rerun.unresolved().count(), 1);
        assert_eq!(open_claims(&fx.store.snapshot().await, &fx.unit), 1);
    }

    #[tokio::test]
    async fn test_reconcile_skips_reopening_claim_and_corrects_the_rest() {
        let fx = fixture().await;
        let mut marked_paid = Invoice::new(InvoiceType::Claim, "CLM-10-D-9", fx.unit.id, dec!(100.00));
        marked_paid.apply_totals(dec!(100.00), derive_invoice_state(dec!(100.00), dec!(100.00)));
        let marked_paid = fx.store.seed_invoice(marked_paid).await;
        fx.imported_payment(marked_paid.id, dec!(60.00), 3).await;
        fx.invoice(InvoiceType::Claim, "CLM-11-D-9", dec!(40.00)).await;
        let drifted = fx.invoice(InvoiceType::ManagementService, "MS-4", dec!(90.00)).await;
        fx.imported_payment(drifted.id, dec!(90.00), 1).await;

        let report = fx.service.reconcile_all(&fx.admin).await.unwrap();

        assert_eq!(report.entries.len(), 3);
        let skipped: Vec<_> = report.unresolved().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].invoice_id, marked_paid.id);
        let fixed: Vec<_> = report.discrepancies().collect();
        assert_eq!(fixed.len(), 1);
        assert_eq!(fixed[0].invoice_id, drifted.id);

        assert!(fx.service.get_invoice(marked_paid.id).await.unwrap().is_paid);
        assert!(fx.service.get_invoice(drifted.id).await.unwrap().is_paid);
        assert_eq!(open_claims(&fx.store.snapshot().await, &fx.unit), 1);
    }
}
