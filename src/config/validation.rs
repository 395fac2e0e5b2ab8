use thiserror::Error;

use super::models::Config;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("webhook.max_age_seconds must be positive, got {0}")]
    InvalidMaxAge(i64),

    #[error("webhook.idempotency_ttl_hours must be positive, got {0}")]
    InvalidIdempotencyTtl(i64),

    #[error("external.max_attempts must be at least 1")]
    InvalidMaxAttempts,

    #[error("external.breaker.failure_threshold must be at least 1")]
    InvalidFailureThreshold,

    #[error("{0} must not have a trailing slash: {1}")]
    TrailingSlash(&'static str, String),
}

pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.webhook.max_age_seconds <= 0 {
        return Err(ValidationError::InvalidMaxAge(config.webhook.max_age_seconds));
    }

    if config.webhook.idempotency_ttl_hours <= 0 {
        return Err(ValidationError::InvalidIdempotencyTtl(
            config.webhook.idempotency_ttl_hours,
        ));
    }

    if config.external.max_attempts == 0 {
        return Err(ValidationError::InvalidMaxAttempts);
    }

    if config.external.breaker.failure_threshold == 0 {
        return Err(ValidationError::InvalidFailureThreshold);
    }

    // Base URLs are joined with absolute paths; a trailing slash would
    // produce double slashes in every request.
    for (name, url) in [
        ("internal_api.base_url", &config.internal_api.base_url),
        ("external.ordering_base_url", &config.external.ordering_base_url),
        (
            "external.measurement_base_url",
            &config.external.measurement_base_url,
        ),
    ] {
        if url.ends_with('/') {
            return Err(ValidationError::TrailingSlash(name, url.clone()));
        }
    }

    Ok(())
}
