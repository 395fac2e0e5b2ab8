//! HTTP clients for the systems this relay talks to
//!
//! - [`oauth`]: client-credentials token endpoint, with a cached token
//! - [`internal`]: internal customer-management API (search + upserts)
//! - [`external`]: external ordering/measurement source systems (pull-sync)

pub mod external;
pub mod internal;
pub mod oauth;

pub use external::{ExternalSourceClient, PageQuery};
pub use internal::{CustomerCandidate, InternalApiClient};
pub use oauth::OAuth2Client;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("token endpoint error: {0}")]
    Token(String),

    #[error("circuit breaker is open")]
    BreakerOpen,

    #[error("failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl ClientError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::RequestFailed(err.to_string())
        }
    }
}
