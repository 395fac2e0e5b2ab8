use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use http_body_util::BodyExt;

use super::{
    error::ApiError,
    models::{HealthResponse, SyncParams, SyncResponse, WebhookResponse},
    state::AppState,
};
use crate::pipeline::{self, InboundEvent, WebhookKind, WebhookOutcome};
use crate::sync;

const SIGNATURE_HEADER: &str = "X-Signature";
const TIMESTAMP_HEADER: &str = "X-Timestamp";
const EVENT_ID_HEADER: &str = "X-Event-Id";

/// Inbound webhook endpoint (POST /webhooks/orders.updated)
pub async fn webhook_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    handle_webhook(state, WebhookKind::OrdersUpdated, headers, body).await
}

/// Inbound webhook endpoint (POST /webhooks/measurements.updated)
pub async fn webhook_measurements(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    handle_webhook(state, WebhookKind::MeasurementsUpdated, headers, body).await
}

async fn handle_webhook(
    state: AppState,
    kind: WebhookKind,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    // A request without signature headers is unauthenticated, not malformed
    let signature = required_header(&headers, SIGNATURE_HEADER)
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {SIGNATURE_HEADER} header")))?;
    let timestamp = required_header(&headers, TIMESTAMP_HEADER)
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {TIMESTAMP_HEADER} header")))?;
    let event_id = required_header(&headers, EVENT_ID_HEADER)
        .ok_or_else(|| ApiError::InvalidPayload(format!("missing {EVENT_ID_HEADER} header")))?;

    let body_bytes = body
        .collect()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .to_bytes();

    let event = InboundEvent {
        event_id,
        timestamp,
        signature,
        body: body_bytes,
    };

    let response = match pipeline::process_webhook(&state, kind, event).await? {
        WebhookOutcome::Duplicate { event_id } => WebhookResponse {
            status: "duplicate".to_string(),
            event_id,
            job_id: None,
            result: None,
        },
        WebhookOutcome::Processed {
            event_id,
            job_id,
            result,
        } => WebhookResponse {
            status: "processed".to_string(),
            event_id,
            job_id: Some(job_id),
            result: Some(result),
        },
    };

    Ok((StatusCode::OK, Json(response)))
}

/// Pull-sync endpoint (POST /sync/orders)
pub async fn sync_orders(
    State(state): State<AppState>,
    Query(params): Query<SyncParams>,
) -> Result<impl IntoResponse, ApiError> {
    let report = sync::sync_orders(&state, &params).await?;
    Ok((StatusCode::OK, Json(sync_response(report))))
}

/// Pull-sync endpoint (POST /sync/measurements)
pub async fn sync_measurements(
    State(state): State<AppState>,
    Query(params): Query<SyncParams>,
) -> Result<impl IntoResponse, ApiError> {
    let report = sync::sync_measurements(&state, &params).await?;
    Ok((StatusCode::OK, Json(sync_response(report))))
}

/// Health check endpoint (GET /health)
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            service: "integration",
        }),
    )
}

fn sync_response(report: sync::SyncReport) -> SyncResponse {
    SyncResponse {
        status: "completed".to_string(),
        processed: report.processed,
        failed: report.failed,
        errors: (!report.errors.is_empty()).then_some(report.errors),
    }
}

fn required_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .filter(|value| !value.is_empty())
}
