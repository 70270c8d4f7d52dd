//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds, window sizes, probabilities)
//! - Check addresses parse before anything binds to them
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{AppConfig, CircuitBreakerConfig};

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the whole application configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "server.request_timeout_secs",
            "must be greater than 0",
        ));
    }

    collect_breaker_errors(&config.circuit_breaker, "circuit_breaker", &mut errors);

    let external = &config.external_service;
    if external.breaker_id.trim().is_empty() {
        errors.push(ValidationError::new(
            "external_service.breaker_id",
            "must not be empty",
        ));
    }
    if !(0.0..=1.0).contains(&external.failure_probability) {
        errors.push(ValidationError::new(
            "external_service.failure_probability",
            format!("{} is outside 0.0..=1.0", external.failure_probability),
        ));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the settings a single breaker is built from.
pub fn validate_breaker_config(config: &CircuitBreakerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    collect_breaker_errors(config, "circuit_breaker", &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn collect_breaker_errors(
    config: &CircuitBreakerConfig,
    prefix: &str,
    errors: &mut Vec<ValidationError>,
) {
    if !(0.0..=100.0).contains(&config.failure_rate_threshold) {
        errors.push(ValidationError::new(
            format!("{prefix}.failure_rate_threshold"),
            format!("{} is outside 0..=100", config.failure_rate_threshold),
        ));
    }
    if config.sliding_window_size == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.sliding_window_size"),
            "must be at least 1",
        ));
    }
    // A minimum above the window size can never be reached.
    if config.minimum_number_of_calls > config.sliding_window_size {
        errors.push(ValidationError::new(
            format!("{prefix}.minimum_number_of_calls"),
            format!(
                "{} exceeds sliding_window_size {}",
                config.minimum_number_of_calls, config.sliding_window_size
            ),
        ));
    }
    if config.permitted_number_of_calls_in_half_open_state == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.permitted_number_of_calls_in_half_open_state"),
            "must be at least 1",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = AppConfig::default();
        config.server.bind_address = "not-an-address".into();
        config.circuit_breaker.failure_rate_threshold = 150.0;
        config.circuit_breaker.permitted_number_of_calls_in_half_open_state = 0;
        config.external_service.failure_probability = 1.5;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "server.bind_address",
                "circuit_breaker.failure_rate_threshold",
                "circuit_breaker.permitted_number_of_calls_in_half_open_state",
                "external_service.failure_probability",
            ]
        );
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let config = CircuitBreakerConfig::new().with_failure_rate_threshold(f64::NAN);
        assert!(validate_breaker_config(&config).is_err());
    }

    #[test]
    fn test_minimum_above_window_rejected() {
        let config = CircuitBreakerConfig::new()
            .with_sliding_window_size(4)
            .with_minimum_number_of_calls(5);
        let errors = validate_breaker_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "circuit_breaker.minimum_number_of_calls");
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = CircuitBreakerConfig::new()
            .with_sliding_window_size(0)
            .with_minimum_number_of_calls(0);
        let errors = validate_breaker_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "circuit_breaker.sliding_window_size");
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = AppConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::new("server.bind_address", "bad");
        assert_eq!(err.to_string(), "server.bind_address: bad");
    }
}
