//! End-to-end tests for the integration relay
//!
//! Each test builds the full router against a spawned mock collaborator
//! server that plays the OAuth2 token endpoint, the internal customer
//! directory + upsert API, and the external source systems.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode},
    routing::{get, post},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`

use hookrelay::api::state::AppState;
use hookrelay::config::Config;
use hookrelay::ledger::{JobLedger, JobStatus};
use hookrelay::signature::SignatureVerifier;

const TEST_SECRET: &str = "test-webhook-secret";

/// Call recorder shared with the mock collaborator handlers
#[derive(Clone, Default)]
struct MockCollab {
    order_upserts: Arc<Mutex<Vec<Value>>>,
    measurement_upserts: Arc<Mutex<Vec<Value>>>,
    search_calls: Arc<AtomicUsize>,
}

async fn mock_token() -> Json<Value> {
    Json(json!({"access_token": "test-token", "expires_in": 3600}))
}

/// Fuzzy directory search: q=ACME-01 also matches the superset code
/// ACME-01x, which the resolver must reject.
async fn mock_search(
    State(mock): State<MockCollab>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    mock.search_calls.fetch_add(1, Ordering::SeqCst);

    let q = params.get("q").map(String::as_str).unwrap_or("");
    let candidates = match q {
        "ACME-01" => json!([
            {"code": "ACME-01x", "id": "A"},
            {"code": "ACME-01", "id": "B"},
        ]),
        "BETA-02" => json!([{"code": "BETA-02", "id": "C"}]),
        _ => json!([]),
    };
    Json(candidates)
}

async fn mock_upsert_order(
    State(mock): State<MockCollab>,
    Json(body): Json<Value>,
) -> Json<Value> {
    mock.order_upserts.lock().unwrap().push(body);
    Json(json!({"id": "ord-1", "upserted": true}))
}

async fn mock_upsert_measurement(
    State(mock): State<MockCollab>,
    Json(body): Json<Value>,
) -> Json<Value> {
    mock.measurement_upserts.lock().unwrap().push(body);
    Json(json!({"id": "mea-1", "upserted": true}))
}

async fn mock_external_orders() -> Json<Value> {
    Json(json!({"items": [
        {"external_order_id": "EXT-1", "customer_code": "ACME-01", "title": "Widgets"},
        {"external_order_id": "EXT-2", "customer_code": "BETA-02"},
        {"external_order_id": "EXT-3", "customer_code": "NOPE-99"},
    ]}))
}

async fn mock_external_measurements() -> Json<Value> {
    Json(json!({"items": [
        {"external_measurement_id": "M-1", "customer_code": "ACME-01", "external_order_id": "EXT-1"},
        {"external_measurement_id": "M-2"},
    ]}))
}

/// Spawn the mock collaborator on an ephemeral port
async fn start_mock_collaborator() -> (String, MockCollab) {
    let mock = MockCollab::default();

    let router = Router::new()
        .route("/oauth/token", post(mock_token))
        .route("/api/m2m/customers/search", get(mock_search))
        .route("/api/internal/orders/upsert", post(mock_upsert_order))
        .route(
            "/api/internal/measurements/upsert",
            post(mock_upsert_measurement),
        )
        .route("/orders", get(mock_external_orders))
        .route("/measurements", get(mock_external_measurements))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .expect("Mock server failed");
    });

    (format!("http://{addr}"), mock)
}

fn test_config(collab_base: &str) -> Config {
    let config_toml = format!(
        r#"
[oauth]
token_url = "{collab_base}/oauth/token"
client_id = "test-client"

[internal_api]
base_url = "{collab_base}"

[external]
ordering_base_url = "{collab_base}"
measurement_base_url = "{collab_base}"
max_attempts = 2
"#
    );

    let mut config: Config = toml::from_str(&config_toml).expect("Failed to parse test config");
    config.webhook.secret = Some(TEST_SECRET.to_string());
    config.oauth.client_secret = Some("test-client-secret".to_string());
    config.external.api_key = Some("test-api-key".to_string());
    config
}

/// Builds the app under test with isolated dependencies
async fn build_test_app() -> (Router, MockCollab, JobLedger, TempDir) {
    let (collab_base, mock) = start_mock_collaborator().await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let ledger = JobLedger::open(temp_dir.path().join("ledger")).expect("Failed to open ledger");

    let state = AppState::from_config(test_config(&collab_base), ledger.clone())
        .expect("Failed to build state");

    (hookrelay::api::router(state), mock, ledger, temp_dir)
}

fn signed_webhook_request(path: &str, event_id: &str, body: &str) -> Request<Body> {
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature =
        SignatureVerifier::new(TEST_SECRET, 300).signature_for(&timestamp, body.as_bytes());

    Request::builder()
        .uri(path)
        .method("POST")
        .header("content-type", "application/json")
        .header("X-Signature", signature)
        .header("X-Timestamp", timestamp)
        .header("X-Event-Id", event_id)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn order_body() -> String {
    json!({
        "customer_code": "ACME-01",
        "external_order_id": "ORD-100",
        "title": "Spring order",
        "status": "confirmed",
    })
    .to_string()
}

#[tokio::test]
async fn test_health() {
    let (app, _mock, _ledger, _temp) = build_test_app().await;

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body, json!({"status": "healthy", "service": "integration"}));
}

#[tokio::test]
async fn test_order_webhook_processed() {
    let (app, mock, ledger, _temp) = build_test_app().await;

    let request = signed_webhook_request("/webhooks/orders.updated", "evt-1", &order_body());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "processed");
    assert_eq!(body["event_id"], "evt-1");
    assert_eq!(body["result"]["upserted"], true);

    // Exact code match wins over the superset candidate
    let upserts = mock.order_upserts.lock().unwrap();
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0]["customer_id"], "B");
    assert_eq!(upserts[0]["external_order_id"], "ORD-100");
    assert_eq!(upserts[0]["source_system"], "ExternalOrdering");
    drop(upserts);

    // Ledger walked through to succeeded with one attempt
    let job_id = body["job_id"].as_str().unwrap();
    let record = ledger.get(job_id).unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Succeeded);
    assert_eq!(record.attempts, 1);
    assert_eq!(record.event_id.as_deref(), Some("evt-1"));
}

#[tokio::test]
async fn test_replay_is_acknowledged_without_reprocessing() {
    let (app, mock, _ledger, _temp) = build_test_app().await;

    let first = app
        .clone()
        .oneshot(signed_webhook_request(
            "/webhooks/orders.updated",
            "evt-dup",
            &order_body(),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(response_json(first).await["status"], "processed");

    let second = app
        .oneshot(signed_webhook_request(
            "/webhooks/orders.updated",
            "evt-dup",
            &order_body(),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let body = response_json(second).await;
    assert_eq!(body["status"], "duplicate");
    assert_eq!(body["event_id"], "evt-dup");
    assert!(body.get("job_id").is_none());

    // No second forward call was made
    assert_eq!(mock.order_upserts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_tampered_signature_leaves_no_trace() {
    let (app, mock, _ledger, _temp) = build_test_app().await;

    // Signature computed over a different body than the one sent
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = SignatureVerifier::new(TEST_SECRET, 300)
        .signature_for(&timestamp, b"some other body entirely");
    let request = Request::builder()
        .uri("/webhooks/orders.updated")
        .method("POST")
        .header("content-type", "application/json")
        .header("X-Signature", signature)
        .header("X-Timestamp", timestamp)
        .header("X-Event-Id", "evt-tampered")
        .body(Body::from(order_body()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(mock.order_upserts.lock().unwrap().len(), 0);

    // The rejected event left no idempotency entry: a corrected resend with
    // the same event id is accepted as new
    let corrected = signed_webhook_request("/webhooks/orders.updated", "evt-tampered", &order_body());
    let response = app.oneshot(corrected).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["status"], "processed");
}

#[tokio::test]
async fn test_missing_signature_headers_are_unauthorized() {
    let (app, _mock, _ledger, _temp) = build_test_app().await;

    let request = Request::builder()
        .uri("/webhooks/orders.updated")
        .method("POST")
        .header("content-type", "application/json")
        .header("X-Event-Id", "evt-nosig")
        .body(Body::from(order_body()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_payload_is_rejected_but_still_deduped() {
    let (app, _mock, _ledger, _temp) = build_test_app().await;

    let bad_body = json!({"customer_code": "ACME-01"}).to_string();

    let first = app
        .clone()
        .oneshot(signed_webhook_request(
            "/webhooks/orders.updated",
            "evt-bad",
            &bad_body,
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);
    let body = response_json(first).await;
    assert!(body["detail"].as_str().unwrap().contains("Invalid payload"));

    // Dedupe happens before validation: the malformed duplicate is
    // acknowledged, never double-validated
    let second = app
        .oneshot(signed_webhook_request(
            "/webhooks/orders.updated",
            "evt-bad",
            &bad_body,
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(response_json(second).await["status"], "duplicate");
}

#[tokio::test]
async fn test_unresolvable_customer_fails_the_job() {
    let (app, _mock, _ledger, _temp) = build_test_app().await;

    let body = json!({
        "customer_code": "NOPE-99",
        "external_order_id": "ORD-404",
    })
    .to_string();

    let request = signed_webhook_request("/webhooks/orders.updated", "evt-404", &body);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = response_json(response).await["detail"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(detail.contains("Customer not found with code: NOPE-99"));
}

#[tokio::test]
async fn test_uuid_customer_code_skips_directory_lookup() {
    let (app, mock, _ledger, _temp) = build_test_app().await;

    let customer_id = "123e4567-e89b-12d3-a456-426614174000";
    let body = json!({
        "customer_code": customer_id,
        "external_order_id": "ORD-77",
    })
    .to_string();

    let request = signed_webhook_request("/webhooks/orders.updated", "evt-uuid", &body);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(mock.search_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mock.order_upserts.lock().unwrap()[0]["customer_id"], customer_id);
}

#[tokio::test]
async fn test_measurement_webhook_processed() {
    let (app, mock, _ledger, _temp) = build_test_app().await;

    let body = json!({
        "customer_code": "BETA-02",
        "external_measurement_id": "MEA-9",
        "external_order_id": "ORD-100",
        "summary": {"total": 42},
    })
    .to_string();

    let request = signed_webhook_request("/webhooks/measurements.updated", "evt-m1", &body);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["status"], "processed");

    let upserts = mock.measurement_upserts.lock().unwrap();
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0]["customer_id"], "C");
    assert_eq!(upserts[0]["external_measurement_id"], "MEA-9");
    assert_eq!(upserts[0]["source_system"], "ExternalMeasurement");
    assert_eq!(upserts[0]["order_source_system"], "ExternalOrdering");
}

#[tokio::test]
async fn test_sync_orders_isolates_per_item_failures() {
    let (app, mock, _ledger, _temp) = build_test_app().await;

    let request = Request::builder()
        .uri("/sync/orders?page=1&page_size=100")
        .method("POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["processed"], 2);
    assert_eq!(body["failed"], 1);

    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["id"], "EXT-3");
    assert!(
        errors[0]["error"]
            .as_str()
            .unwrap()
            .contains("Customer not found")
    );

    // The two resolvable orders were forwarded through the same resolver
    // as the webhook path
    let upserts = mock.order_upserts.lock().unwrap();
    assert_eq!(upserts.len(), 2);
    assert_eq!(upserts[0]["customer_id"], "B");
    assert_eq!(upserts[1]["customer_id"], "C");
}

#[tokio::test]
async fn test_sync_measurements_counts_undeserializable_items() {
    let (app, mock, _ledger, _temp) = build_test_app().await;

    let request = Request::builder()
        .uri("/sync/measurements")
        .method("POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["processed"], 1);
    assert_eq!(body["failed"], 1);
    // The item without a customer_code cannot name itself better than its id
    assert_eq!(body["errors"][0]["id"], "M-2");

    assert_eq!(mock.measurement_upserts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_sync_rejects_out_of_range_page_size() {
    let (app, _mock, _ledger, _temp) = build_test_app().await;

    let request = Request::builder()
        .uri("/sync/orders?page_size=501")
        .method("POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
