//! Invoice and payment DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain_ledger::{Invoice, InvoiceType, Payment};

#[derive(Debug, Deserialize)]
pub struct ApplyPaymentRequest {
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub invoice_number: String,
    pub invoice_type: InvoiceType,
    pub unit_id: Uuid,
    pub amount: Decimal,
    pub total_paid: Decimal,
    pub remaining_balance: Decimal,
    pub is_paid: bool,
    pub issued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payments: Option<Vec<PaymentResponse>>,
}

impl InvoiceResponse {
    pub fn with_payments(mut self, payments: Vec<Payment>) -> Self {
        self.payments = Some(payments.into_iter().map(PaymentResponse::from).collect());
        self
    }
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id.into(),
            invoice_number: invoice.invoice_number,
            invoice_type: invoice.invoice_type,
            unit_id: invoice.unit_id.into(),
            amount: invoice.amount,
            total_paid: invoice.total_paid,
            remaining_balance: invoice.remaining_balance,
            is_paid: invoice.is_paid,
            issued_at: invoice.issued_at,
            updated_at: invoice.updated_at,
            payments: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id.into(),
            invoice_id: payment.invoice_id.into(),
            amount: payment.amount,
            recorded_by: payment.recorded_by.map(Uuid::from),
            created_at: payment.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentApplicationResponse {
    pub payment: PaymentResponse,
    pub invoice: InvoiceResponse,
}
