//! Inbound event pipeline
//!
//! One webhook delivery walks through six ordered steps:
//!
//! 1. Verify — HMAC signature + replay window. Failures are terminal with no
//!    side effects: no job, no idempotency entry, so a corrected resend with
//!    the same event id is still accepted as new.
//! 2. Dedupe — `check_and_set` on the event id. A duplicate is acknowledged
//!    with 200 so the sender does not retry it. Dedupe runs strictly before
//!    validation; a malformed duplicate is still deduped.
//! 3. Validate — deserialize the typed payload and check required fields.
//! 4. Record — create the ledger job. Failure is fatal: an attempt that
//!    cannot be recorded must not run invisibly.
//! 5. Execute — mark running, resolve the customer id, forward the
//!    normalized payload to the internal API.
//! 6. Finalize — mark succeeded/failed. Status updates are best-effort;
//!    losing one must not abort or re-run the business action.
//!
//! Steps 4-6 run in a spawned task: job completion is not tied to the client
//! connection, so a dropped connection cannot strand a job in `running`.

use bytes::Bytes;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::api::models::{MeasurementPayload, OrderPayload};
use crate::api::state::AppState;
use crate::api::validation::{validate_measurement, validate_order};
use crate::clients::ClientError;
use crate::ledger::{JobStatus, JobType, LedgerError};
use crate::resolver::ResolveError;
use crate::signature::VerifyError;

pub const ORDER_SOURCE_SYSTEM: &str = "ExternalOrdering";
pub const MEASUREMENT_SOURCE_SYSTEM: &str = "ExternalMeasurement";

/// One inbound webhook delivery, as received off the wire
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub event_id: String,
    pub timestamp: String,
    pub signature: String,
    pub body: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookKind {
    OrdersUpdated,
    MeasurementsUpdated,
}

impl WebhookKind {
    pub fn event_type(self) -> &'static str {
        match self {
            WebhookKind::OrdersUpdated => "orders.updated",
            WebhookKind::MeasurementsUpdated => "measurements.updated",
        }
    }

    fn job_type(self) -> JobType {
        match self {
            WebhookKind::OrdersUpdated => JobType::WebhookOrder,
            WebhookKind::MeasurementsUpdated => JobType::WebhookMeasurement,
        }
    }
}

#[derive(Debug)]
pub enum WebhookOutcome {
    Duplicate {
        event_id: String,
    },
    Processed {
        event_id: String,
        job_id: String,
        result: Value,
    },
}

/// Execution-phase failures (step 5), always recorded on the job before
/// surfacing
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Forward(#[from] ClientError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid signature: {0}")]
    Unauthorized(#[from] VerifyError),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Failed to record job: {0}")]
    JobCreation(#[from] LedgerError),

    #[error("Processing failed: {0}")]
    Processing(#[from] ProcessingError),

    #[error("Processing task aborted: {0}")]
    Aborted(String),
}

enum WebhookPayload {
    Order(OrderPayload),
    Measurement(MeasurementPayload),
}

/// Run one webhook delivery through the pipeline.
pub async fn process_webhook(
    state: &AppState,
    kind: WebhookKind,
    event: InboundEvent,
) -> Result<WebhookOutcome, PipelineError> {
    // 1. Verify: an unauthenticated caller must never reach the dedupe store
    if let Err(e) = state
        .verifier
        .verify(&event.timestamp, &event.body, &event.signature)
    {
        warn!(event_id = %event.event_id, error = %e, "webhook signature invalid");
        return Err(PipelineError::Unauthorized(e));
    }

    // 2. Dedupe
    if !state.idempotency.check_and_set(&event.event_id) {
        info!(
            event_type = kind.event_type(),
            event_id = %event.event_id,
            "webhook duplicate"
        );
        return Ok(WebhookOutcome::Duplicate {
            event_id: event.event_id,
        });
    }

    // 3. Validate
    let payload = parse_payload(kind, &event.body).map_err(|e| {
        error!(event_id = %event.event_id, error = %e, "webhook payload invalid");
        PipelineError::InvalidPayload(e)
    })?;

    // 4-6. Detached from the request so a dropped connection does not
    // leave the job stuck in running
    let state = state.clone();
    let event_id = event.event_id;
    tokio::spawn(async move { execute(state, kind, payload, event_id).await })
        .await
        .map_err(|e| PipelineError::Aborted(e.to_string()))?
}

fn parse_payload(kind: WebhookKind, body: &[u8]) -> Result<WebhookPayload, String> {
    match kind {
        WebhookKind::OrdersUpdated => {
            let payload: OrderPayload =
                serde_json::from_slice(body).map_err(|e| e.to_string())?;
            validate_order(&payload).map_err(|e| e.to_string())?;
            Ok(WebhookPayload::Order(payload))
        }
        WebhookKind::MeasurementsUpdated => {
            let payload: MeasurementPayload =
                serde_json::from_slice(body).map_err(|e| e.to_string())?;
            validate_measurement(&payload).map_err(|e| e.to_string())?;
            Ok(WebhookPayload::Measurement(payload))
        }
    }
}

async fn execute(
    state: AppState,
    kind: WebhookKind,
    payload: WebhookPayload,
    event_id: String,
) -> Result<WebhookOutcome, PipelineError> {
    let snapshot = match &payload {
        WebhookPayload::Order(p) => serde_json::to_value(p),
        WebhookPayload::Measurement(p) => serde_json::to_value(p),
    }
    .map_err(|e| PipelineError::InvalidPayload(e.to_string()))?;

    // 4. Record; failure here is fatal to the request
    let job_id = state
        .ledger
        .create_job(kind.job_type(), snapshot, Some(event_id.clone()))?;

    // 5. Execute
    update_status_best_effort(&state, &job_id, JobStatus::Running, None);

    match forward(&state, payload).await {
        Ok(result) => {
            // 6. Finalize
            update_status_best_effort(&state, &job_id, JobStatus::Succeeded, None);
            info!(
                event_type = kind.event_type(),
                event_id = %event_id,
                job_id = %job_id,
                "webhook processed"
            );
            Ok(WebhookOutcome::Processed {
                event_id,
                job_id,
                result,
            })
        }
        Err(e) => {
            update_status_best_effort(&state, &job_id, JobStatus::Failed, Some(e.to_string()));
            error!(
                event_id = %event_id,
                job_id = %job_id,
                error = %e,
                "webhook processing failed"
            );
            Err(PipelineError::Processing(e))
        }
    }
}

async fn forward(state: &AppState, payload: WebhookPayload) -> Result<Value, ProcessingError> {
    match payload {
        WebhookPayload::Order(payload) => {
            let customer_id = state
                .resolver
                .ensure_customer_id(&payload.customer_code)
                .await?;

            let order_data = json!({
                "customer_id": customer_id,
                "external_order_id": payload.external_order_id,
                "source_system": ORDER_SOURCE_SYSTEM,
                "title": payload.title,
                "status": payload.status,
                "ordered_at": payload.ordered_at,
            });

            Ok(state.internal.upsert_order(&order_data).await?)
        }
        WebhookPayload::Measurement(payload) => {
            let customer_id = state
                .resolver
                .ensure_customer_id(&payload.customer_code)
                .await?;

            // The internal API resolves external_order_id -> order_id
            let order_source_system = payload
                .external_order_id
                .is_some()
                .then_some(ORDER_SOURCE_SYSTEM);
            let measurement_data = json!({
                "customer_id": customer_id,
                "external_order_id": payload.external_order_id,
                "order_source_system": order_source_system,
                "external_measurement_id": payload.external_measurement_id,
                "source_system": MEASUREMENT_SOURCE_SYSTEM,
                "summary": payload.summary,
                "measured_at": payload.measured_at,
            });

            Ok(state.internal.upsert_measurement(&measurement_data).await?)
        }
    }
}

/// Status updates are best-effort: a lost update must never abort or re-run
/// an otherwise-successful business action.
pub(crate) fn update_status_best_effort(
    state: &AppState,
    job_id: &str,
    status: JobStatus,
    last_error: Option<String>,
) {
    if let Err(e) = state.ledger.update_status(job_id, status, last_error) {
        warn!(job_id, ?status, error = %e, "job status update failed");
    }
}
