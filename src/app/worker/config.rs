//! Worker configuration and query validation
//!
//! Settings shared by every worker, plus the startup checks a query
//! configuration must pass before a worker is allowed to own it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::models::{MessageFormat, QueryConfig};
use crate::app::retry::BackoffStrategy;
use crate::constants::notify;
use crate::errors::{ConfigError, ConfigResult};

/// Delivery settings shared by all workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// How items are rendered for hub subscribers
    pub message_format: MessageFormat,
    /// Bound on each chat-bot notification
    #[serde(with = "humantime_serde")]
    pub notify_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            message_format: MessageFormat::default(),
            notify_timeout: notify::TIMEOUT,
        }
    }
}

impl WorkerConfig {
    /// Validate configuration values and return errors for invalid settings
    pub fn validate(&self) -> ConfigResult<()> {
        if self.notify_timeout.is_zero() {
            return Err(invalid("notify_timeout", "0s", "Timeout must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Check that a query configuration can drive a worker
///
/// All problems are collected so they can be reported together.
pub fn validate_query(query: &QueryConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();
    let label = if query.name.trim().is_empty() {
        errors.push("query name must not be empty".to_string());
        "<unnamed>"
    } else {
        query.name.as_str()
    };

    if !matches!(query.endpoint.scheme(), "http" | "https") {
        errors.push(format!(
            "{}: endpoint scheme '{}' is not http(s)",
            label,
            query.endpoint.scheme()
        ));
    }
    if query.retry.max_attempts == 0 {
        errors.push(format!("{}: max_attempts must be at least 1", label));
    }
    if query.items_per_pass == 0 {
        errors.push(format!("{}: items_per_pass must be at least 1", label));
    }
    if query.fetch_timeout.is_zero() {
        errors.push(format!("{}: fetch_timeout must be positive", label));
    }
    if let Some(window) = query.freshness_window {
        if window.is_zero() {
            errors.push(format!(
                "{}: freshness_window must be positive (omit it to disable)",
                label
            ));
        }
    }
    match &query.retry.backoff {
        BackoffStrategy::Jitter { min, max } if min > max => {
            errors.push(format!("{}: jitter min exceeds max", label));
        }
        BackoffStrategy::Exponential { base, max } if base > max => {
            errors.push(format!("{}: backoff base exceeds max", label));
        }
        _ => {}
    }
    for pointer in [&query.payload.items, &query.payload.id, &query.payload.url] {
        if !pointer.is_empty() && !pointer.starts_with('/') {
            errors.push(format!(
                "{}: payload pointer '{}' must start with '/'",
                label, pointer
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationFailed { errors })
    }
}
