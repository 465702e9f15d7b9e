//! Configuration validation.
//!
//! Serde handles syntax; this module checks that values make sense
//! together. Every problem is reported, not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatekeeperConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("auth.api_token must be set")]
    MissingApiToken,

    #[error("auth.hmac_secret must be set")]
    MissingHmacSecret,

    #[error("security.{0} must be greater than zero")]
    Zero(&'static str),

    #[error("security.slowdown_step_ms ({step}) exceeds security.slowdown_max_ms ({max})")]
    SlowdownStepAboveMax { step: u64, max: u64 },

    #[error("{field} is not a valid socket address: {value}")]
    BadAddress { field: &'static str, value: String },

    #[error("admin.api_key must be set when the admin endpoints are enabled")]
    MissingAdminKey,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatekeeperConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.api_token.is_empty() {
        errors.push(ValidationError::MissingApiToken);
    }
    if config.auth.hmac_secret.is_empty() {
        errors.push(ValidationError::MissingHmacSecret);
    }

    let security = &config.security;
    let nonzero = [
        ("max_failures", u64::from(security.max_failures)),
        ("fail_window_secs", security.fail_window_secs),
        ("block_duration_secs", security.block_duration_secs),
        ("cleanup_tick_secs", security.cleanup_tick_secs),
    ];
    for (field, value) in nonzero {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }
    if security.slowdown_step_ms > security.slowdown_max_ms {
        errors.push(ValidationError::SlowdownStepAboveMax {
            step: security.slowdown_step_ms,
            max: security.slowdown_max_ms,
        });
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::MissingAdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
