//! Payments recorded against invoices
//!
//! Payments are append-only. The only removal path is the overpayment repair
//! routine in [`crate::reconciliation`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{InvoiceId, PaymentId, UserId};

/// A payment record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    /// Rounded, strictly positive
    pub amount: Decimal,
    pub recorded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(invoice_id: InvoiceId, amount: Decimal, recorded_by: Option<UserId>) -> Self {
        Self {
            id: PaymentId::new_v7(),
            invoice_id,
            amount,
            recorded_by,
            created_at: Utc::now(),
        }
    }

    /// Overrides the creation time, for imported payments
    pub fn recorded_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Orders payments oldest first; ties broken by id so "most recent" is stable
pub fn sort_chronologically(payments: &mut [Payment]) {
    payments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}
