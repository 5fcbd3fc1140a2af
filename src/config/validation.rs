//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (threshold fractions, size limit)
//! - Check that the selected offload backend is fully described
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LargeResponseConfig → Result<(), Vec<ValidationError>>
//! - `threshold_error < threshold_warn` is accepted with a warning; ordering is the operator's call

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{LargeResponseConfig, OffloadBackend};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be within [0, 1], got {value}")]
    FractionOutOfRange { field: &'static str, value: f64 },

    #[error("guard.size_limit_in_mb must be positive, got {0}")]
    NonPositiveSizeLimit(f64),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("offload.endpoint is required for the http backend")]
    MissingEndpoint,

    #[error("{field} is not a socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &LargeResponseConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let guard = &config.guard;

    for (field, value) in [
        ("guard.threshold_warn", guard.threshold_warn),
        ("guard.threshold_error", guard.threshold_error),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ValidationError::FractionOutOfRange { field, value });
        }
    }

    if !(guard.size_limit_in_mb > 0.0) {
        errors.push(ValidationError::NonPositiveSizeLimit(guard.size_limit_in_mb));
    }

    if guard.output_bucket.trim().is_empty() {
        errors.push(ValidationError::Empty("guard.output_bucket"));
    }
    if guard.mime_type.trim().is_empty() {
        errors.push(ValidationError::Empty("guard.mime_type"));
    }
    if guard.ref_property.is_empty() {
        errors.push(ValidationError::Empty("guard.ref_property"));
    }

    if config.offload.backend == OffloadBackend::Http
        && config.offload.endpoint.as_deref().map_or(true, str::is_empty)
    {
        errors.push(ValidationError::MissingEndpoint);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if guard.threshold_error < guard.threshold_warn {
        tracing::warn!(
            threshold_warn = guard.threshold_warn,
            threshold_error = guard.threshold_error,
            "threshold_error is below threshold_warn; responses under the warn threshold still pass untouched"
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
