//! API middleware

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{info, warn};

use domain_ledger::{Actor, LedgerStore};

use crate::auth::{actor_from_claims, validate_token};
use crate::error::ApiError;
use crate::AppState;

/// Authentication middleware
///
/// Validates the bearer token and stores the resolved [`Actor`] in the
/// request extensions.
pub async fn auth_middleware<S: LedgerStore>(
    State(state): State<AppState<S>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        Some(token) => token,
        None => {
            warn!("Missing or invalid Authorization header");
            return ApiError::Unauthorized.into_response();
        }
    };

    let actor = match validate_token(token, &state.config.jwt_secret)
        .and_then(|claims| actor_from_claims(&claims))
    {
        Ok(actor) => actor,
        Err(e) => {
            warn!("Token rejected: {}", e);
            return ApiError::from(e).into_response();
        }
    };

    request.extensions_mut().insert(actor);
    next.run(request).await
}

/// Audit logging middleware
///
/// Logs every ledger request with the acting user and outcome.
pub async fn audit_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let (user_id, role) = request
        .extensions()
        .get::<Actor>()
        .map(|a| (a.id.to_string(), a.role.as_str()))
        .unwrap_or_else(|| ("anonymous".to_string(), "-"));

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        user = %user_id,
        role = role,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}
