//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

use domain_ledger::LedgerError;

use crate::auth::AuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Well-formed request the ledger refuses; `details` carries the amounts
    #[error("Unprocessable: {message}")]
    Unprocessable {
        message: String,
        details: Option<Value>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiError {
    fn unprocessable(err: &LedgerError, details: Option<Value>) -> Self {
        ApiError::Unprocessable {
            message: err.to_string(),
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Unauthorized".to_string(),
                None,
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::Unprocessable { message, details } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "unprocessable",
                message,
                details,
            ),
            ApiError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                msg,
                None,
            ),
            ApiError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg,
                None,
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg,
                None,
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Maps the ledger error taxonomy onto HTTP statuses
impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        if err.is_not_found() {
            return ApiError::NotFound(err.to_string());
        }

        match &err {
            LedgerError::AlreadyProcessed(_) => ApiError::Conflict(err.to_string()),
            LedgerError::Forbidden { .. } => ApiError::Forbidden(err.to_string()),
            LedgerError::MissingUnit(note_id) => {
                ApiError::unprocessable(&err, Some(json!({ "note_id": note_id })))
            }
            LedgerError::PmAdvanceRequired(note_id) => {
                ApiError::unprocessable(&err, Some(json!({ "note_id": note_id })))
            }
            LedgerError::PmAdvanceInsufficient {
                advance_id,
                remaining,
                needed,
            } => ApiError::unprocessable(
                &err,
                Some(json!({
                    "advance_id": advance_id,
                    "remaining": remaining,
                    "needed": needed,
                })),
            ),
            LedgerError::InvalidAmount(_) => ApiError::Validation(err.to_string()),
            LedgerError::Overpayment {
                invoice_id,
                attempted,
                max_allowed,
            } => ApiError::unprocessable(
                &err,
                Some(json!({
                    "invoice_id": invoice_id,
                    "attempted": attempted,
                    "max_allowed": max_allowed,
                })),
            ),
            LedgerError::InvalidAdvanceCorrection {
                advance_id,
                requested,
                amount,
            } => ApiError::unprocessable(
                &err,
                Some(json!({
                    "advance_id": advance_id,
                    "requested": requested,
                    "amount": amount,
                })),
            ),
            LedgerError::Store(port) if port.is_transient() => {
                error!(error = %err, "Ledger store unavailable");
                ApiError::Unavailable("ledger store unavailable".to_string())
            }
            _ => {
                error!(error = %err, "Ledger operation failed");
                ApiError::Internal("ledger operation failed".to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NoRecognizedRole => ApiError::Forbidden(err.to_string()),
            _ => ApiError::Unauthorized,
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{AdvanceId, NoteId, PortError};
    use rust_decimal_macros::dec;

    fn status_of(err: LedgerError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_ledger_error_statuses() {
        assert_eq!(status_of(LedgerError::NoteNotFound(NoteId::new())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(LedgerError::AlreadyProcessed(NoteId::new())), StatusCode::CONFLICT);
        assert_eq!(
            status_of(LedgerError::MissingUnit(NoteId::new())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(LedgerError::PmAdvanceNotFound(AdvanceId::new())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(LedgerError::Store(PortError::internal("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(LedgerError::Store(PortError::connection("refused"))),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_insufficient_advance_carries_details() {
        let err = ApiError::from(LedgerError::PmAdvanceInsufficient {
            advance_id: AdvanceId::new(),
            remaining: dec!(50.00),
            needed: dec!(80.00),
        });

        match err {
            ApiError::Unprocessable { details: Some(details), .. } => {
                assert_eq!(details["remaining"], json!(dec!(50.00)));
                assert_eq!(details["needed"], json!(dec!(80.00)));
            }
            other => panic!("unexpected mapping: {:?}", other),
        }
    }
}
