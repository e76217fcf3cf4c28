//! Accounting note handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{AdvanceId, NoteId, ProjectId, UnitId};
use domain_ledger::{Actor, ConversionRequest, LedgerStore, NewAccountingNote, DEFAULT_SOURCE_TYPE};

use crate::dto::notes::*;
use crate::{error::ApiError, AppState};

/// Records a pending accounting note
pub async fn record_note<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<RecordNoteRequest>,
) -> Result<(StatusCode, Json<NoteResponse>), ApiError> {
    request.validate()?;

    let mut new_note = NewAccountingNote::new(request.description, request.amount, actor.id);
    if let Some(unit_id) = request.unit_id {
        new_note = new_note.for_unit(UnitId::from(unit_id));
    }
    if let Some(project_id) = request.project_id {
        new_note = new_note.in_project(ProjectId::from(project_id));
    }
    if request.source_type.is_some() || request.pm_advance_id.is_some() {
        new_note = new_note.funded_by(
            request.source_type.unwrap_or(DEFAULT_SOURCE_TYPE),
            request.pm_advance_id.map(AdvanceId::from),
        );
    }

    let note = state.notes.record_note(new_note).await?;
    Ok((StatusCode::CREATED, Json(note.into())))
}

/// Gets a note by ID
pub async fn get_note<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
) -> Result<Json<NoteResponse>, ApiError> {
    let note = state.notes.get_note(NoteId::from(id)).await?;
    Ok(Json(note.into()))
}

/// Converts a pending note into an expense on the unit's claim invoice
pub async fn convert_note<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<ConvertNoteRequest>,
) -> Result<Json<ConversionResponse>, ApiError> {
    let conversion = ConversionRequest {
        source_type: request.source_type,
        pm_advance_id: request.pm_advance_id.map(AdvanceId::from),
    };

    let result = state
        .notes
        .convert(NoteId::from(id), conversion, &actor)
        .await?;
    Ok(Json(result.into()))
}

/// Rejects a pending note
pub async fn reject_note<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<NoteResponse>, ApiError> {
    let note = state.notes.reject(NoteId::from(id), &actor).await?;
    Ok(Json(note.into()))
}

/// Deletes a pending note (admin only)
pub async fn delete_note<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.notes.delete_note(NoteId::from(id), &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
