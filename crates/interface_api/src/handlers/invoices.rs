//! Invoice and payment handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use core_kernel::InvoiceId;
use domain_ledger::{Actor, LedgerStore};

use crate::dto::invoices::*;
use crate::{error::ApiError, AppState};

/// Gets an invoice with its payments, oldest first
pub async fn get_invoice<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let invoice_id = InvoiceId::from(id);
    let invoice = state.payments.get_invoice(invoice_id).await?;
    let payments = state.payments.payments(invoice_id).await?;

    Ok(Json(InvoiceResponse::from(invoice).with_payments(payments)))
}

/// Applies a payment to an invoice
pub async fn apply_payment<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApplyPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentApplicationResponse>), ApiError> {
    let application = state
        .payments
        .apply_payment(InvoiceId::from(id), request.amount, &actor)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PaymentApplicationResponse {
            payment: application.payment.into(),
            invoice: application.invoice.into(),
        }),
    ))
}
