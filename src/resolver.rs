//! Customer identifier resolution
//!
//! Webhook payloads carry an external-facing customer code (e.g. "ACME-01");
//! the internal API wants the canonical customer id. Already-canonical ids
//! pass through untouched. Codes go through the directory search, whose
//! matching is fuzzy upstream — candidates are post-filtered here for exact
//! code equality before one is accepted.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::{ClientError, InternalApiClient};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Customer not found with code: {0}")]
    CustomerNotFound(String),

    #[error(transparent)]
    Transport(#[from] ClientError),
}

pub struct CustomerResolver {
    internal: Arc<InternalApiClient>,
}

impl CustomerResolver {
    pub fn new(internal: Arc<InternalApiClient>) -> Self {
        Self { internal }
    }

    /// Resolve a customer code (or already-canonical id) to the internal id.
    ///
    /// A canonical UUID string is returned unchanged without any network
    /// call. Anything else is treated as a code and looked up; no exact
    /// match is [`ResolveError::CustomerNotFound`], distinct from transport
    /// failures.
    pub async fn ensure_customer_id(&self, code_or_id: &str) -> Result<String, ResolveError> {
        if is_canonical_uuid(code_or_id) {
            return Ok(code_or_id.to_string());
        }

        let candidates = self.internal.search_customers(code_or_id, 1).await?;

        // The upstream search may return substring matches even with
        // limit=1 requested; only an exact code match counts.
        for candidate in candidates {
            if candidate.code == code_or_id {
                info!(customer_code = code_or_id, customer_id = %candidate.id, "customer resolved");
                return Ok(candidate.id);
            }
        }

        warn!(customer_code = code_or_id, "customer not found");
        Err(ResolveError::CustomerNotFound(code_or_id.to_string()))
    }
}

/// Canonical hyphenated UUID form: 8-4-4-4-12 hex groups, case-insensitive.
///
/// `Uuid::try_parse` also accepts braced, simple, and URN forms, all of
/// which have lengths other than 36 — the length check pins this to the
/// hyphenated form only.
fn is_canonical_uuid(s: &str) -> bool {
    s.len() == 36 && Uuid::try_parse(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_uuid_forms() {
        assert!(is_canonical_uuid("123e4567-e89b-12d3-a456-426614174000"));
        assert!(is_canonical_uuid("123E4567-E89B-12D3-A456-426614174000"));
    }

    #[test]
    fn test_non_canonical_forms_rejected() {
        // simple (no hyphens)
        assert!(!is_canonical_uuid("123e4567e89b12d3a456426614174000"));
        // braced
        assert!(!is_canonical_uuid("{123e4567-e89b-12d3-a456-426614174000}"));
        // urn
        assert!(!is_canonical_uuid(
            "urn:uuid:123e4567-e89b-12d3-a456-426614174000"
        ));
        // plain customer codes
        assert!(!is_canonical_uuid("ACME-01"));
        assert!(!is_canonical_uuid(""));
        // right shape, bad hex
        assert!(!is_canonical_uuid("123e4567-e89b-12d3-a456-42661417400z"));
    }

    #[tokio::test]
    async fn test_uuid_passthrough_makes_no_network_call() {
        use crate::clients::OAuth2Client;
        use crate::config::{InternalApiConfig, OAuthConfig};

        // A client pointed at an unroutable host: any network call would fail
        let oauth = Arc::new(OAuth2Client::new(&OAuthConfig::default()).unwrap());
        let internal = Arc::new(
            InternalApiClient::new(
                &InternalApiConfig {
                    base_url: "http://127.0.0.1:1".to_string(),
                    ..Default::default()
                },
                oauth,
            )
            .unwrap(),
        );
        let resolver = CustomerResolver::new(internal);

        let id = "123e4567-e89b-12d3-a456-426614174000";
        assert_eq!(resolver.ensure_customer_id(id).await.unwrap(), id);
    }
}
