//! HTTP tests for the ledger API against the in-memory store

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use core_kernel::UserId;
use domain_ledger::ports::mock::InMemoryLedger;
use domain_ledger::{Invoice, InvoiceType, PmAdvance, Unit};
use interface_api::auth::create_token;
use interface_api::config::ApiConfig;
use interface_api::{create_router, AppState};

struct TestApp {
    router: Router,
    store: Arc<InMemoryLedger>,
    config: ApiConfig,
    unit: Unit,
}

impl TestApp {
    async fn new() -> Self {
        let store = Arc::new(InMemoryLedger::new());
        let unit = store.seed_unit(Unit::new("A-1204", "Tower A 12-04")).await;
        let config = ApiConfig::default();
        let router = create_router(AppState::new(store.clone(), config.clone()));

        Self {
            router,
            store,
            config,
            unit,
        }
    }

    fn token(&self, role: &str) -> String {
        create_token(
            UserId::new(),
            vec![role.to_string()],
            &self.config.jwt_secret,
            self.config.jwt_expiration_secs,
        )
        .unwrap()
    }

    async fn send(&self, method: &str, uri: &str, role: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(role) = role {
            builder = builder.header("Authorization", format!("Bearer {}", self.token(role)));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn record_note(&self, amount: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/v1/notes",
                Some("STAFF"),
                Some(json!({
                    "unit_id": self.unit.id,
                    "description": "Replace corridor lights",
                    "amount": amount,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;

    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.send("GET", "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new().await;
    let (status, body) = app.send("POST", "/api/v1/notes", None, Some(json!({}))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_unrecognized_role_is_forbidden() {
    let app = TestApp::new().await;
    let (status, _) = app
        .send("POST", "/api/v1/maintenance/reconcile", Some("auditor"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_convert_consolidates_and_rejects_second_attempt() {
    let app = TestApp::new().await;
    let first = app.record_note("250.00").await;
    let second = app.record_note("100.00").await;

    let (status, body) = app
        .send("POST", &format!("/api/v1/notes/{}/convert", first), Some("ACCOUNTANT"), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["note"]["status"], "CONVERTED");
    assert_eq!(body["expense"]["source_type"], "OFFICE_FUND");
    assert_eq!(body["invoice_created"], true);
    let invoice_id = body["invoice"]["id"].clone();

    let (status, body) = app
        .send("POST", &format!("/api/v1/notes/{}/convert", second), Some("ADMIN"), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["invoice_created"], false);
    assert_eq!(body["invoice"]["id"], invoice_id);
    assert_eq!(decimal(&body["invoice"]["amount"]), dec!(350.00));
    assert_eq!(decimal(&body["invoice"]["remaining_balance"]), dec!(350.00));

    let (status, body) = app
        .send("POST", &format!("/api/v1/notes/{}/convert", first), Some("ACCOUNTANT"), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn test_staff_cannot_convert() {
    let app = TestApp::new().await;
    let note = app.record_note("20.00").await;

    let (status, _) = app
        .send("POST", &format!("/api/v1/notes/{}/convert", note), Some("STAFF"), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_insufficient_advance_returns_details() {
    let app = TestApp::new().await;
    let advance = app
        .store
        .seed_advance(PmAdvance::issue(UserId::new(), None, dec!(50.00), None).unwrap())
        .await;
    let note = app.record_note("80.00").await;

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/v1/notes/{}/convert", note),
            Some("ACCOUNTANT"),
            Some(json!({ "source_type": "PM_ADVANCE", "pm_advance_id": advance.id })),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(decimal(&body["details"]["remaining"]), dec!(50.00));
    assert_eq!(decimal(&body["details"]["needed"]), dec!(80.00));

    let snapshot = app.store.snapshot().await;
    assert!(snapshot.invoices.is_empty());
    assert_eq!(snapshot.advances[&advance.id].remaining_amount, dec!(50.00));
}

#[tokio::test]
async fn test_unknown_note_is_not_found() {
    let app = TestApp::new().await;
    let (status, _) = app
        .send(
            "GET",
            &format!("/api/v1/notes/{}", uuid::Uuid::new_v4()),
            Some("ACCOUNTANT"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_overpayment_reports_max_allowed() {
    let app = TestApp::new().await;
    let invoice = app
        .store
        .seed_invoice(Invoice::new(
            InvoiceType::ManagementService,
            "MS-2026-001",
            app.unit.id,
            dec!(200.00),
        ))
        .await;
    let uri = format!("/api/v1/invoices/{}/payments", invoice.id.as_uuid());

    let (status, body) = app
        .send("POST", &uri, Some("ACCOUNTANT"), Some(json!({ "amount": "50.00" })))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(decimal(&body["invoice"]["remaining_balance"]), dec!(150.00));

    let (status, body) = app
        .send("POST", &uri, Some("ACCOUNTANT"), Some(json!({ "amount": "200.00" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(decimal(&body["details"]["max_allowed"]), dec!(150.00));

    let (status, body) = app
        .send("GET", &format!("/api/v1/invoices/{}", invoice.id.as_uuid()), Some("ACCOUNTANT"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_maintenance_is_admin_only() {
    let app = TestApp::new().await;

    let (status, _) = app
        .send("POST", "/api/v1/maintenance/reconcile", Some("ACCOUNTANT"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send("POST", "/api/v1/maintenance/repair-overpayments", Some("ADMIN"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "overpayment_repair");
}

#[tokio::test]
async fn test_advance_issue_and_correction() {
    let app = TestApp::new().await;
    let staff = UserId::new();

    let (status, body) = app
        .send(
            "POST",
            "/api/v1/advances",
            Some("ACCOUNTANT"),
            Some(json!({ "staff_id": staff, "amount": "500.00", "notes": "Site float" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(decimal(&body["remaining_amount"]), dec!(500.00));
    let uri = format!("/api/v1/advances/{}/remaining", body["id"].as_str().unwrap());

    let (status, _) = app
        .send("PUT", &uri, Some("ACCOUNTANT"), Some(json!({ "remaining_amount": "100.00" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send("PUT", &uri, Some("ADMIN"), Some(json!({ "remaining_amount": "600.00" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(decimal(&body["details"]["amount"]), dec!(500.00));

    let (status, body) = app
        .send("PUT", &uri, Some("ADMIN"), Some(json!({ "remaining_amount": "120.00" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["spent"]), dec!(380.00));
}
