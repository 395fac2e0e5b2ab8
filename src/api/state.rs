use std::sync::Arc;

use crate::clients::{ClientError, ExternalSourceClient, InternalApiClient, OAuth2Client};
use crate::config::Config;
use crate::idempotency::IdempotencyStore;
use crate::ledger::JobLedger;
use crate::resolver::CustomerResolver;
use crate::signature::SignatureVerifier;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub verifier: Arc<SignatureVerifier>,
    pub idempotency: Arc<IdempotencyStore>,
    pub ledger: Arc<JobLedger>,
    pub oauth: Arc<OAuth2Client>,
    pub internal: Arc<InternalApiClient>,
    pub external: Arc<ExternalSourceClient>,
    pub resolver: Arc<CustomerResolver>,
}

impl AppState {
    /// Wire up all components from configuration. The ledger is passed in so
    /// callers (and tests) control where it lives on disk.
    pub fn from_config(config: Config, ledger: JobLedger) -> Result<Self, ClientError> {
        let secret = config.webhook.secret.clone().unwrap_or_default();
        let verifier = Arc::new(SignatureVerifier::new(
            &secret,
            config.webhook.max_age_seconds,
        ));
        let idempotency = Arc::new(IdempotencyStore::new(config.webhook.idempotency_ttl_hours));

        let oauth = Arc::new(OAuth2Client::new(&config.oauth)?);
        let internal = Arc::new(InternalApiClient::new(
            &config.internal_api,
            Arc::clone(&oauth),
        )?);
        let external = Arc::new(ExternalSourceClient::new(&config.external)?);
        let resolver = Arc::new(CustomerResolver::new(Arc::clone(&internal)));

        Ok(Self {
            config: Arc::new(config),
            verifier,
            idempotency,
            ledger: Arc::new(ledger),
            oauth,
            internal,
            external,
            resolver,
        })
    }
}
