//! Invoices
//!
//! Claim invoices aggregate converted operational expenses for a unit until
//! they are paid. Management-service invoices are billed per cycle elsewhere
//! and only pass through payment application and reconciliation here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::money::{derive_invoice_state, round_money, InvoiceBalance};
use core_kernel::{InvoiceId, UnitId};

use crate::unit::Unit;

/// Invoice type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceType {
    /// Aggregates operational expenses; at most one open per unit
    Claim,
    /// Monthly management fee
    ManagementService,
}

impl InvoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceType::Claim => "CLAIM",
            InvoiceType::ManagementService => "MANAGEMENT_SERVICE",
        }
    }
}

impl fmt::Display for InvoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLAIM" => Ok(InvoiceType::Claim),
            "MANAGEMENT_SERVICE" => Ok(InvoiceType::ManagementService),
            other => Err(format!("unknown invoice type '{}'", other)),
        }
    }
}

/// An invoice issued to a unit
///
/// # Invariants
///
/// - `remaining_balance == round(amount - total_paid, 2)`
/// - `is_paid == (remaining_balance <= 0.01)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    /// Human-readable, unique
    pub invoice_number: String,
    pub invoice_type: InvoiceType,
    pub unit_id: UnitId,
    pub amount: Decimal,
    pub total_paid: Decimal,
    pub remaining_balance: Decimal,
    pub is_paid: bool,
    pub issued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates an unpaid invoice with nothing collected yet
    pub fn new(
        invoice_type: InvoiceType,
        invoice_number: impl Into<String>,
        unit_id: UnitId,
        amount: Decimal,
    ) -> Self {
        let now = Utc::now();
        let amount = round_money(amount);
        let balance = derive_invoice_state(amount, Decimal::ZERO);

        Self {
            id: InvoiceId::new_v7(),
            invoice_number: invoice_number.into(),
            invoice_type,
            unit_id,
            amount,
            total_paid: Decimal::ZERO,
            remaining_balance: balance.remaining_balance,
            is_paid: balance.is_paid,
            issued_at: now,
            updated_at: now,
        }
    }

    /// Mints the claim invoice for a unit's first unconsolidated expense
    pub fn new_claim(unit: &Unit, amount: Decimal) -> Self {
        let mut invoice = Self::new(InvoiceType::Claim, "", unit.id, amount);
        invoice.invoice_number = claim_invoice_number(&unit.code, invoice.issued_at);
        invoice
    }

    /// True for an unpaid claim invoice, the only kind expenses accumulate on
    pub fn is_open_claim(&self) -> bool {
        self.invoice_type == InvoiceType::Claim && !self.is_paid
    }

    /// Balance derived from the stored amount and paid total
    pub fn derived_balance(&self) -> InvoiceBalance {
        derive_invoice_state(self.amount, self.total_paid)
    }

    /// True when the stored balance fields agree with the derivation
    pub fn is_consistent(&self) -> bool {
        let derived = self.derived_balance();
        derived.remaining_balance == self.remaining_balance && derived.is_paid == self.is_paid
    }

    /// Sets the paid total and re-derives the balance fields
    pub fn apply_totals(&mut self, total_paid: Decimal, balance: InvoiceBalance) {
        self.total_paid = round_money(total_paid);
        self.remaining_balance = balance.remaining_balance;
        self.is_paid = balance.is_paid;
        self.updated_at = Utc::now();
    }

    /// Adds a consolidated expense to amount and remaining balance
    ///
    /// An increment on an open invoice never flips it to paid.
    pub fn add_expense(&mut self, amount: Decimal) {
        self.amount = round_money(self.amount + amount);
        self.remaining_balance = round_money(self.remaining_balance + amount);
        self.updated_at = Utc::now();
    }
}

/// Claim invoice number: `CLM-<unix millis>-<unit code>`
///
/// Two claim invoices minted for the same unit within one millisecond get the
/// same number. The second insert then fails with a conflict and the
/// conversion aborts with [`LedgerError::InvoiceCreation`]; it is not retried.
///
/// [`LedgerError::InvoiceCreation`]: crate::error::LedgerError::InvoiceCreation
pub fn claim_invoice_number(unit_code: &str, issued_at: DateTime<Utc>) -> String {
    format!("CLM-{}-{}", issued_at.timestamp_millis(), unit_code)
}
