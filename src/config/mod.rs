//! Configuration management for hookrelay
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `HOOKRELAY__<section>__<key>`
//!
//! Examples:
//! - `HOOKRELAY__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `HOOKRELAY__WEBHOOK__MAX_AGE_SECONDS=600`
//! - `HOOKRELAY__EXTERNAL__MAX_ATTEMPTS=5`
//!
//! Secrets (`WEBHOOK_SECRET`, `OAUTH2_CLIENT_SECRET`, `EXTERNAL_API_KEY`) are
//! read from plain environment variables only, never from the TOML file.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/hookrelay.toml`.
//! This can be overridden using the `HOOKRELAY_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{
    BreakerConfig, Config, ExternalConfig, InternalApiConfig, OAuthConfig, ServerConfig,
    WebhookConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or validation
    /// fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
