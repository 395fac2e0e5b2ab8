//! External source system client (pull-sync fetch)
//!
//! Paginated, API-key-authenticated reads from the external ordering and
//! measurement systems. Every attempt passes through a circuit breaker;
//! transient failures are retried with capped exponential backoff plus
//! jitter, and HTTP 429 honors the server's `Retry-After` hint.

use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::ClientError;
use crate::breaker::CircuitBreaker;
use crate::config::ExternalConfig;

#[derive(Debug, Clone, Default)]
pub struct PageQuery {
    pub updated_since: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Deserialize)]
struct ItemsEnvelope {
    #[serde(default)]
    items: Vec<Value>,
}

enum AttemptError {
    RateLimited(Duration),
    Failed(ClientError),
}

pub struct ExternalSourceClient {
    http: Client,
    ordering_base_url: String,
    measurement_base_url: String,
    api_key: String,
    max_attempts: u32,
    backoff_max: Duration,
    breaker: Mutex<CircuitBreaker>,
}

impl ExternalSourceClient {
    pub fn new(config: &ExternalConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        Ok(Self {
            http,
            ordering_base_url: config.ordering_base_url.clone(),
            measurement_base_url: config.measurement_base_url.clone(),
            api_key: config.api_key.clone().unwrap_or_default(),
            max_attempts: config.max_attempts,
            backoff_max: Duration::from_secs(config.backoff_max_seconds),
            breaker: Mutex::new(CircuitBreaker::new(
                config.breaker.failure_threshold,
                Duration::from_secs(config.breaker.cooldown_seconds),
            )),
        })
    }

    /// Fetch one page of orders updated since the given instant.
    pub async fn fetch_orders(&self, query: &PageQuery) -> Result<Vec<Value>, ClientError> {
        let url = format!("{}/orders", self.ordering_base_url);
        let items = self.fetch_page(&url, query).await?;
        info!(count = items.len(), page = query.page, "external orders fetched");
        Ok(items)
    }

    /// Fetch one page of measurements updated since the given instant.
    pub async fn fetch_measurements(&self, query: &PageQuery) -> Result<Vec<Value>, ClientError> {
        let url = format!("{}/measurements", self.measurement_base_url);
        let items = self.fetch_page(&url, query).await?;
        info!(count = items.len(), page = query.page, "external measurements fetched");
        Ok(items)
    }

    async fn fetch_page(&self, url: &str, query: &PageQuery) -> Result<Vec<Value>, ClientError> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            if !self.breaker.lock().expect("breaker lock poisoned").can_attempt() {
                return Err(ClientError::BreakerOpen);
            }

            match self.fetch_once(url, query).await {
                Ok(items) => {
                    self.breaker
                        .lock()
                        .expect("breaker lock poisoned")
                        .record_success();
                    return Ok(items);
                }
                Err(AttemptError::RateLimited(retry_after)) => {
                    // Not an upstream fault; wait out the hint without
                    // advancing the backoff curve or the breaker.
                    warn!(url, attempt, ?retry_after, "rate limited by external source");
                    last_error = "rate limited".to_string();
                    tokio::time::sleep(retry_after).await;
                }
                Err(AttemptError::Failed(e)) => {
                    self.breaker
                        .lock()
                        .expect("breaker lock poisoned")
                        .record_failure();
                    last_error = e.to_string();

                    if attempt == self.max_attempts {
                        break;
                    }

                    let backoff = self.backoff_for(attempt);
                    warn!(url, attempt, error = %last_error, ?backoff, "external fetch failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        warn!(url, attempts = self.max_attempts, error = %last_error, "external fetch failed after retries");
        Err(ClientError::RetriesExhausted {
            attempts: self.max_attempts,
            last_error,
        })
    }

    async fn fetch_once(&self, url: &str, query: &PageQuery) -> Result<Vec<Value>, AttemptError> {
        let mut params = vec![
            ("page", query.page.to_string()),
            ("page_size", query.page_size.to_string()),
        ];
        if let Some(updated_since) = &query.updated_since {
            params.push(("updated_since", updated_since.clone()));
        }

        let response = self
            .http
            .get(url)
            .query(&params)
            .bearer_auth(&self.api_key)
            .header("Cache-Control", "no-store")
            .send()
            .await
            .map_err(|e| AttemptError::Failed(ClientError::from_reqwest(e)))?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5u64);
            return Err(AttemptError::RateLimited(Duration::from_secs(retry_after)));
        }

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AttemptError::Failed(ClientError::Status {
                status: status.as_u16(),
                detail,
            }));
        }

        let envelope: ItemsEnvelope = response
            .json()
            .await
            .map_err(|e| AttemptError::Failed(ClientError::RequestFailed(e.to_string())))?;

        Ok(envelope.items)
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let base = Duration::from_secs(2u64.saturating_pow(attempt)).min(self.backoff_max);
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
        base + jitter
    }
}
