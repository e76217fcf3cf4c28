//! Ledger maintenance handlers (admin only)

use axum::{extract::State, Extension, Json};

use domain_ledger::{Actor, LedgerStore, RepairReport};

use crate::{error::ApiError, AppState};

/// Recomputes every invoice's totals from its payments
pub async fn reconcile<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<RepairReport>, ApiError> {
    Ok(Json(state.payments.reconcile_all(&actor).await?))
}

/// Removes surplus payments from over-collected claim invoices
pub async fn repair_overpayments<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<RepairReport>, ApiError> {
    Ok(Json(state.payments.repair_overpayments(&actor).await?))
}
