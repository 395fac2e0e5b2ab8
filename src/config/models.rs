use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub internal_api: InternalApiConfig,
    #[serde(default)]
    pub external: ExternalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            webhook: WebhookConfig::default(),
            oauth: OAuthConfig::default(),
            internal_api: InternalApiConfig::default(),
            external: ExternalConfig::default(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            ledger_path: default_ledger_path(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/ledger")
}

/// Inbound webhook verification settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookConfig {
    /// Maximum accepted |now - X-Timestamp| before an event is rejected as a replay
    #[serde(default = "default_max_age_seconds")]
    pub max_age_seconds: i64,
    /// How long event ids are remembered for deduplication
    #[serde(default = "default_idempotency_ttl_hours")]
    pub idempotency_ttl_hours: i64,
    /// HMAC secret (loaded from environment, not from config file)
    #[serde(skip)]
    pub secret: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_age_seconds: default_max_age_seconds(),
            idempotency_ttl_hours: default_idempotency_ttl_hours(),
            secret: None,
        }
    }
}

fn default_max_age_seconds() -> i64 {
    300
}

fn default_idempotency_ttl_hours() -> i64 {
    24
}

/// OAuth2 client-credentials settings for internal API calls
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub token_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_oauth_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Client secret (loaded from environment, not from config file)
    #[serde(skip)]
    pub client_secret: Option<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_url: String::new(),
            client_id: String::new(),
            timeout_seconds: default_oauth_timeout_seconds(),
            client_secret: None,
        }
    }
}

fn default_oauth_timeout_seconds() -> u64 {
    10
}

/// Internal customer-management API (search + upsert)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InternalApiConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_lookup_timeout_seconds")]
    pub lookup_timeout_seconds: u64,
    #[serde(default = "default_forward_timeout_seconds")]
    pub forward_timeout_seconds: u64,
}

impl Default for InternalApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            lookup_timeout_seconds: default_lookup_timeout_seconds(),
            forward_timeout_seconds: default_forward_timeout_seconds(),
        }
    }
}

fn default_lookup_timeout_seconds() -> u64 {
    10
}

fn default_forward_timeout_seconds() -> u64 {
    30
}

/// External source systems (pull-sync fetch)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExternalConfig {
    #[serde(default)]
    pub ordering_base_url: String,
    #[serde(default)]
    pub measurement_base_url: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_max_seconds")]
    pub backoff_max_seconds: u64,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub breaker: BreakerConfig,
    /// API key (loaded from environment, not from config file)
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            ordering_base_url: String::new(),
            measurement_base_url: String::new(),
            max_attempts: default_max_attempts(),
            backoff_max_seconds: default_backoff_max_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
            breaker: BreakerConfig::default(),
            api_key: None,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_max_seconds() -> u64 {
    300
}

fn default_request_timeout_seconds() -> u64 {
    30
}

/// Circuit breaker tuning for the external source client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_seconds: default_cooldown_seconds(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_seconds() -> u64 {
    60
}
