//! HTTP API Layer
//!
//! REST surface of the ledger engine using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: thin adapters from HTTP to the `domain_ledger` services
//! - **Middleware**: JWT authentication resolving an `Actor`, audit logging
//! - **DTOs**: request/response bodies
//! - **Error Handling**: `LedgerError` mapped onto HTTP statuses
//!
//! The router is generic over the [`LedgerStore`], so the same routes run
//! against PostgreSQL in production and the in-memory store in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(Arc::new(PostgresLedgerStore::new(pool)), config);
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use domain_ledger::{LedgerStore, NoteService, PaymentService, PmAdvanceLedger};

use crate::config::ApiConfig;
use crate::handlers::{advances, health, invoices, maintenance, notes};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
pub struct AppState<S: LedgerStore> {
    pub store: Arc<S>,
    pub notes: Arc<NoteService<S>>,
    pub payments: Arc<PaymentService<S>>,
    pub advances: Arc<PmAdvanceLedger<S>>,
    pub config: ApiConfig,
}

impl<S: LedgerStore> AppState<S> {
    /// Builds every ledger service over one shared store
    pub fn new(store: Arc<S>, config: ApiConfig) -> Self {
        Self {
            notes: Arc::new(NoteService::new(store.clone())),
            payments: Arc::new(PaymentService::new(store.clone())),
            advances: Arc::new(PmAdvanceLedger::new(store.clone())),
            store,
            config,
        }
    }
}

impl<S: LedgerStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            notes: self.notes.clone(),
            payments: self.payments.clone(),
            advances: self.advances.clone(),
            config: self.config.clone(),
        }
    }
}

/// Creates the main API router
pub fn create_router<S: LedgerStore>(state: AppState<S>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check::<S>));

    let note_routes = Router::new()
        .route("/", post(notes::record_note::<S>))
        .route("/:id", get(notes::get_note::<S>).delete(notes::delete_note::<S>))
        .route("/:id/convert", post(notes::convert_note::<S>))
        .route("/:id/reject", post(notes::reject_note::<S>));

    let invoice_routes = Router::new()
        .route("/:id", get(invoices::get_invoice::<S>))
        .route("/:id/payments", post(invoices::apply_payment::<S>));

    let advance_routes = Router::new()
        .route("/", post(advances::issue_advance::<S>))
        .route("/:id", get(advances::get_advance::<S>))
        .route("/:id/remaining", put(advances::correct_advance::<S>));

    let maintenance_routes = Router::new()
        .route("/reconcile", post(maintenance::reconcile::<S>))
        .route("/repair-overpayments", post(maintenance::repair_overpayments::<S>));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/notes", note_routes)
        .nest("/invoices", invoice_routes)
        .nest("/advances", advance_routes)
        .nest("/maintenance", maintenance_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::<S>,
        ));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
