//! API models for the webhook, sync, and health endpoints.
//!
//! Inbound webhook bodies deserialize into [`OrderPayload`] /
//! [`MeasurementPayload`]; `customer_code` and the external id are mandatory
//! (enforced in [`super::validation`]), everything else is optional domain
//! data plus an open `metadata` map.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Body of `POST /webhooks/orders.updated`
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OrderPayload {
    pub customer_code: String,
    pub external_order_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ordered_at: Option<String>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, Value>>,
}

/// Body of `POST /webhooks/measurements.updated`
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MeasurementPayload {
    pub customer_code: String,
    pub external_measurement_id: String,
    #[serde(default)]
    pub external_order_id: Option<String>,
    #[serde(default)]
    pub summary: Option<Value>,
    #[serde(default)]
    pub measured_at: Option<String>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebhookResponse {
    pub status: String,
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Query parameters for the pull-sync endpoints
#[derive(Debug, Deserialize, Clone)]
pub struct SyncParams {
    #[serde(default)]
    pub updated_since: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for SyncParams {
    fn default() -> Self {
        Self {
            updated_since: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    100
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncItemError {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncResponse {
    pub status: String,
    pub processed: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<SyncItemError>>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
