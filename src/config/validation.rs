//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that both upstreams are usable URLs
//! - Validate value ranges (percentage, timeouts, limits)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{BackendConfig, ProxyConfig};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    validate_backend("backends.legacy.url", &config.backends.legacy, &mut errors);
    validate_backend("backends.new.url", &config.backends.new, &mut errors);

    // The legacy endpoint is reached by address; its certificate names a public host.
    let legacy_is_https = Url::parse(&config.backends.legacy.url)
        .map(|u| u.scheme() == "https")
        .unwrap_or(false);
    let has_server_name = config
        .backends
        .legacy
        .tls_server_name
        .as_deref()
        .is_some_and(|n| !n.is_empty());
    if legacy_is_https && !has_server_name {
        errors.push(ValidationError::new(
            "backends.legacy.tls_server_name",
            "required when the legacy backend uses https",
        ));
    }

    if !(0..=100).contains(&config.migration.percentage) {
        errors.push(ValidationError::new(
            "migration.percentage",
            format!("{} is not between 0 and 100", config.migration.percentage),
        ));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be > 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.timeouts.read_header_secs == 0 {
        errors.push(ValidationError::new("timeouts.read_header_secs", "must be > 0"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_backend(field: &'static str, backend: &BackendConfig, errors: &mut Vec<ValidationError>) {
    if backend.url.is_empty() {
        errors.push(ValidationError::new(field, "is required"));
        return;
    }
    match Url::parse(&backend.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("'{}' must be an http(s) URL with a host", url),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("'{}': {}", backend.url, e))),
    }
}
