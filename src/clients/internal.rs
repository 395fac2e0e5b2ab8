//! Internal customer-management API client
//!
//! Bearer-authenticated calls into the internal API: customer directory
//! search (used by the resolver) and idempotent order/measurement upserts
//! (the forward leg of the pipeline).

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{ClientError, OAuth2Client};
use crate::config::InternalApiConfig;

/// One row from the directory search.
///
/// The search is fuzzy upstream; callers must post-filter on `code`.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerCandidate {
    pub id: String,
    pub code: String,
}

pub struct InternalApiClient {
    http: Client,
    base_url: String,
    oauth: Arc<OAuth2Client>,
    lookup_timeout: Duration,
    forward_timeout: Duration,
}

impl InternalApiClient {
    pub fn new(config: &InternalApiConfig, oauth: Arc<OAuth2Client>) -> Result<Self, ClientError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            oauth,
            lookup_timeout: Duration::from_secs(config.lookup_timeout_seconds),
            forward_timeout: Duration::from_secs(config.forward_timeout_seconds),
        })
    }

    /// Search the customer directory. Returns raw candidates; the upstream
    /// match may be a substring match.
    pub async fn search_customers(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<CustomerCandidate>, ClientError> {
        let token = self.oauth.get_token().await?;

        let response = self
            .http
            .get(format!("{}/api/m2m/customers/search", self.base_url))
            .query(&[("q", query), ("limit", &limit.to_string())])
            .bearer_auth(token)
            .header("Cache-Control", "no-store")
            .timeout(self.lookup_timeout)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::RequestFailed(e.to_string()))
    }

    /// Upsert an order, keyed upstream by `(source_system, external_order_id)`.
    pub async fn upsert_order(&self, order_data: &Value) -> Result<Value, ClientError> {
        let result = self.forward("/api/internal/orders/upsert", order_data).await?;
        info!(
            external_order_id = order_data
                .get("external_order_id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(""),
            "order upserted"
        );
        Ok(result)
    }

    /// Upsert a measurement, keyed upstream by `(source_system, external_measurement_id)`.
    pub async fn upsert_measurement(&self, measurement_data: &Value) -> Result<Value, ClientError> {
        let result = self
            .forward("/api/internal/measurements/upsert", measurement_data)
            .await?;
        info!(
            external_measurement_id = measurement_data
                .get("external_measurement_id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(""),
            "measurement upserted"
        );
        Ok(result)
    }

    async fn forward(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        let token = self.oauth.get_token().await?;

        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .bearer_auth(token)
            .header("Cache-Control", "no-store")
            .timeout(self.forward_timeout)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::RequestFailed(e.to_string()))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        detail,
    })
}
