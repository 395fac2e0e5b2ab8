//! OAuth2 client-credentials token client
//!
//! Machine-to-machine bearer tokens for the internal API. The token is
//! cached and refreshed once 90% of its stated lifetime has elapsed, so
//! concurrent callers almost always hit the cache.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::ClientError;
use crate::config::OAuthConfig;

const REFRESH_FRACTION: f64 = 0.9;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

pub struct OAuth2Client {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl OAuth2Client {
    pub fn new(config: &OAuthConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        Ok(Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone().unwrap_or_default(),
            cached: Mutex::new(None),
        })
    }

    /// Return a bearer token, fetching a fresh one if the cache is cold or
    /// past its refresh point.
    ///
    /// The cache lock is held across the fetch so a cold start produces one
    /// token request, not one per concurrent caller.
    pub async fn get_token(&self) -> Result<String, ClientError> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.expires_at > Instant::now() {
                return Ok(entry.token.clone());
            }
        }

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .header("Cache-Control", "no-store")
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Token(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Token(e.to_string()))?;

        debug!(expires_in = body.expires_in, "OAuth2 token refreshed");

        let refresh_after = Duration::from_secs_f64(body.expires_in as f64 * REFRESH_FRACTION);
        let token = body.access_token.clone();
        *cached = Some(CachedToken {
            token: body.access_token,
            expires_at: Instant::now() + refresh_after,
        });

        Ok(token)
    }
}
