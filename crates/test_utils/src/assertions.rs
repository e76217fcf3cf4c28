//! Custom Test Assertions
//!
//! Checks for the ledger invariants with messages that name the offending
//! record.

use rust_decimal::Decimal;

use core_kernel::{derive_invoice_state, sum_money, UnitId};
use domain_ledger::ports::mock::LedgerSnapshot;
use domain_ledger::{
    AccountingNote, Invoice, InvoiceType, NoteStatus, OperationalExpense, Payment, PmAdvance,
    SourceType,
};

/// Asserts `remaining_balance` and `is_paid` match the derivation from
/// `amount` and `total_paid`
pub fn assert_balance_identity(invoice: &Invoice) {
    let derived = derive_invoice_state(invoice.amount, invoice.total_paid);
    assert_eq!(
        invoice.remaining_balance, derived.remaining_balance,
        "invoice {} remaining_balance={} but amount={} total_paid={}",
        invoice.invoice_number, invoice.remaining_balance, invoice.amount, invoice.total_paid
    );
    assert_eq!(
        invoice.is_paid, derived.is_paid,
        "invoice {} is_paid={} but remaining_balance={}",
        invoice.invoice_number, invoice.is_paid, derived.remaining_balance
    );
}

/// Asserts the stored paid total equals the sum of the invoice's payments
pub fn assert_total_matches_payments(invoice: &Invoice, payments: &[Payment]) {
    let sum = sum_money(
        payments
            .iter()
            .filter(|p| p.invoice_id == invoice.id)
            .map(|p| p.amount),
    );
    assert_eq!(
        invoice.total_paid, sum,
        "invoice {} total_paid={} but payments sum to {}",
        invoice.invoice_number, invoice.total_paid, sum
    );
}

/// Asserts `0 <= remaining_amount <= amount`
pub fn assert_advance_within_bounds(advance: &PmAdvance) {
    assert!(
        advance.remaining_amount >= Decimal::ZERO,
        "advance {} went negative: {}",
        advance.id,
        advance.remaining_amount
    );
    assert!(
        advance.remaining_amount <= advance.amount,
        "advance {} remaining {} exceeds amount {}",
        advance.id,
        advance.remaining_amount,
        advance.amount
    );
}

/// Asserts a converted note and its expense reference each other and agree
/// on amount and funding
pub fn assert_note_converted(note: &AccountingNote, expense: &OperationalExpense) {
    assert_eq!(note.status, NoteStatus::Converted, "note {} not converted", note.id);
    assert!(note.converted_at.is_some(), "note {} has no converted_at", note.id);
    assert_eq!(note.converted_to_expense_id, Some(expense.id));
    assert_eq!(expense.converted_from_note_id, Some(note.id));
    assert_eq!(expense.amount, note.amount);
    assert_eq!(note.source_type, Some(expense.source_type));
    assert_eq!(note.pm_advance_id, expense.pm_advance_id);
    assert_eq!(
        expense.source_type == SourceType::PmAdvance,
        expense.pm_advance_id.is_some(),
        "expense {} funding and advance id disagree",
        expense.id
    );
}

/// Asserts the unit has at most one unpaid CLAIM invoice
pub fn assert_single_open_claim(snapshot: &LedgerSnapshot, unit_id: UnitId) {
    let open: Vec<&str> = snapshot
        .invoices_for_unit(unit_id)
        .into_iter()
        .filter(|i| i.invoice_type == InvoiceType::Claim && !i.is_paid)
        .map(|i| i.invoice_number.as_str())
        .collect();
    assert!(
        open.len() <= 1,
        "unit {} has {} open claim invoices: {:?}",
        unit_id,
        open.len(),
        open
    );
}

/// Runs every snapshot-wide invariant check
pub fn assert_ledger_consistent(snapshot: &LedgerSnapshot) {
    for invoice in snapshot.invoices.values() {
        assert_balance_identity(invoice);
    }
    for advance in snapshot.advances.values() {
        assert_advance_within_bounds(advance);
    }
    for unit_id in snapshot.units.keys() {
        assert_single_open_claim(snapshot, *unit_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{AdvanceBuilder, InvoiceBuilder};
    use crate::fixtures::UnitFixtures;
    use rust_decimal_macros::dec;

    #[test]
    fn test_consistent_invoice_passes() {
        let invoice = InvoiceBuilder::claim(UnitFixtures::tower_a_1204().id)
            .with_amount(dec!(100.00))
            .with_total_paid(dec!(99.995))
            .build();
        assert_balance_identity(&invoice);
    }

    #[test]
    #[should_panic(expected = "is_paid")]
    fn test_drifted_invoice_fails() {
        let invoice = InvoiceBuilder::claim(UnitFixtures::tower_a_1204().id)
            .marked_paid(true)
            .build();
        assert_balance_identity(&invoice);
    }

    #[test]
    #[should_panic(expected = "went negative")]
    fn test_negative_advance_fails() {
        let advance = AdvanceBuilder::new().with_remaining(dec!(-0.01)).build();
        assert_advance_within_bounds(&advance);
    }
}
