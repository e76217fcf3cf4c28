//! PM advance handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{AdvanceId, ProjectId, UserId};
use domain_ledger::{Actor, LedgerStore};

use crate::dto::advances::*;
use crate::{error::ApiError, AppState};

/// Issues a new advance
pub async fn issue_advance<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<IssueAdvanceRequest>,
) -> Result<(StatusCode, Json<AdvanceResponse>), ApiError> {
    request.validate()?;

    let advance = state
        .advances
        .issue(
            UserId::from(request.staff_id),
            request.project_id.map(ProjectId::from),
            request.amount,
            request.notes,
            &actor,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(advance.into())))
}

/// Gets an advance by ID
pub async fn get_advance<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let advance = state.advances.get(AdvanceId::from(id)).await?;
    Ok(Json(advance.into()))
}

/// Overwrites the remaining amount (admin only)
pub async fn correct_advance<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<CorrectAdvanceRequest>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let advance = state
        .advances
        .correct(AdvanceId::from(id), request.remaining_amount, &actor)
        .await?;
    Ok(Json(advance.into()))
}
