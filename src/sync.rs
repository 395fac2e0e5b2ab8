//! Pull-based reconciliation
//!
//! Webhooks are the primary arrival path; this is the fallback for missed
//! events. A sync run fetches one page from the external source (guarded by
//! retry/backoff and the circuit breaker) and upserts each item through the
//! same resolver + forwarding leg the webhook path uses.
//!
//! Failure semantics differ from the webhook pipeline: one bad record never
//! aborts the page — its error is accumulated into the report. The whole
//! page aborts only on authentication failure or when the external source's
//! retry budget is exhausted (including an open breaker).

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info};

use crate::api::models::{SyncItemError, SyncParams};
use crate::api::state::AppState;
use crate::api::validation::{SyncParamsError, validate_sync_params};
use crate::clients::{ClientError, PageQuery};
use crate::ledger::{JobStatus, JobType, LedgerError};
use crate::pipeline::{
    MEASUREMENT_SOURCE_SYSTEM, ORDER_SOURCE_SYSTEM, update_status_best_effort,
};
use crate::resolver::ResolveError;

#[derive(Debug)]
pub struct SyncReport {
    pub processed: usize,
    pub failed: usize,
    pub errors: Vec<SyncItemError>,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(#[from] SyncParamsError),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error(transparent)]
    Fetch(ClientError),

    #[error("Failed to record job: {0}")]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Deserialize)]
struct ExternalOrderItem {
    external_order_id: String,
    customer_code: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    ordered_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalMeasurementItem {
    external_measurement_id: String,
    customer_code: String,
    #[serde(default)]
    external_order_id: Option<String>,
    #[serde(default)]
    summary: Option<Value>,
    #[serde(default)]
    measured_at: Option<String>,
}

/// Reconcile one page of orders from the external ordering system.
pub async fn sync_orders(state: &AppState, params: &SyncParams) -> Result<SyncReport, SyncError> {
    let (job_id, items) = fetch_page(state, params, JobType::SyncOrders, |q| {
        let state = state.clone();
        async move { state.external.fetch_orders(&q).await }
    })
    .await?;

    let mut report = SyncReport {
        processed: 0,
        failed: 0,
        errors: Vec::new(),
    };

    for item in items {
        let id = item_id(&item, "external_order_id");
        match upsert_order_item(state, item).await {
            Ok(()) => report.processed += 1,
            Err(e) => {
                report.failed += 1;
                error!(external_order_id = %id, error = %e, "order sync failed");
                report.errors.push(SyncItemError { id, error: e });
            }
        }
    }

    update_status_best_effort(state, &job_id, JobStatus::Succeeded, None);
    info!(
        processed = report.processed,
        failed = report.failed,
        page = params.page,
        "orders synced"
    );
    Ok(report)
}

/// Reconcile one page of measurements from the external measurement system.
pub async fn sync_measurements(
    state: &AppState,
    params: &SyncParams,
) -> Result<SyncReport, SyncError> {
    let (job_id, items) = fetch_page(state, params, JobType::SyncMeasurements, |q| {
        let state = state.clone();
        async move { state.external.fetch_measurements(&q).await }
    })
    .await?;

    let mut report = SyncReport {
        processed: 0,
        failed: 0,
        errors: Vec::new(),
    };

    for item in items {
        let id = item_id(&item, "external_measurement_id");
        match upsert_measurement_item(state, item).await {
            Ok(()) => report.processed += 1,
            Err(e) => {
                report.failed += 1;
                error!(external_measurement_id = %id, error = %e, "measurement sync failed");
                report.errors.push(SyncItemError { id, error: e });
            }
        }
    }

    update_status_best_effort(state, &job_id, JobStatus::Succeeded, None);
    info!(
        processed = report.processed,
        failed = report.failed,
        page = params.page,
        "measurements synced"
    );
    Ok(report)
}

/// Shared front half of a sync run: validate parameters, check
/// authentication, record the job, fetch the page.
async fn fetch_page<F, Fut>(
    state: &AppState,
    params: &SyncParams,
    job_type: JobType,
    fetch: F,
) -> Result<(String, Vec<Value>), SyncError>
where
    F: FnOnce(PageQuery) -> Fut,
    Fut: Future<Output = Result<Vec<Value>, ClientError>>,
{
    validate_sync_params(params)?;

    // Token fetch doubles as the auth check; failure aborts the page
    state
        .oauth
        .get_token()
        .await
        .map_err(|e| SyncError::Auth(e.to_string()))?;

    let job_id = state.ledger.create_job(
        job_type,
        json!({
            "updated_since": params.updated_since,
            "page": params.page,
            "page_size": params.page_size,
        }),
        None,
    )?;
    update_status_best_effort(state, &job_id, JobStatus::Running, None);

    let query = PageQuery {
        updated_since: params.updated_since.clone(),
        page: params.page,
        page_size: params.page_size,
    };

    match fetch(query).await {
        Ok(items) => Ok((job_id, items)),
        Err(e) => {
            update_status_best_effort(state, &job_id, JobStatus::Failed, Some(e.to_string()));
            error!(?job_type, error = %e, "sync fetch failed");
            Err(SyncError::Fetch(e))
        }
    }
}

async fn upsert_order_item(state: &AppState, item: Value) -> Result<(), String> {
    let item: ExternalOrderItem = serde_json::from_value(item).map_err(|e| e.to_string())?;

    let customer_id = resolve(state, &item.customer_code).await?;

    let order_data = json!({
        "customer_id": customer_id,
        "external_order_id": item.external_order_id,
        "source_system": ORDER_SOURCE_SYSTEM,
        "title": item.title,
        "status": item.status,
        "ordered_at": item.ordered_at,
    });

    state
        .internal
        .upsert_order(&order_data)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

async fn upsert_measurement_item(state: &AppState, item: Value) -> Result<(), String> {
    let item: ExternalMeasurementItem = serde_json::from_value(item).map_err(|e| e.to_string())?;

    let customer_id = resolve(state, &item.customer_code).await?;

    let order_source_system = item.external_order_id.is_some().then_some(ORDER_SOURCE_SYSTEM);
    let measurement_data = json!({
        "customer_id": customer_id,
        "external_order_id": item.external_order_id,
        "order_source_system": order_source_system,
        "external_measurement_id": item.external_measurement_id,
        "source_system": MEASUREMENT_SOURCE_SYSTEM,
        "summary": item.summary,
        "measured_at": item.measured_at,
    });

    state
        .internal
        .upsert_measurement(&measurement_data)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

async fn resolve(state: &AppState, customer_code: &str) -> Result<String, String> {
    state
        .resolver
        .ensure_customer_id(customer_code)
        .await
        .map_err(|e| match e {
            ResolveError::CustomerNotFound(code) => {
                format!("Customer not found with code: {code}")
            }
            ResolveError::Transport(e) => e.to_string(),
        })
}

fn item_id(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}
