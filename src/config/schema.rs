//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the circuit breaker service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Settings shared by every breaker the registry creates.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Simulated downstream dependency.
    pub external_service: ExternalServiceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Circuit breaker configuration.
///
/// Immutable once a breaker is built from it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failure rate in percent (0-100) at which the breaker opens.
    pub failure_rate_threshold: f64,

    /// Outcomes required before the failure rate is evaluated.
    pub minimum_number_of_calls: usize,

    /// Maximum number of outcomes kept in the sliding window.
    pub sliding_window_size: usize,

    /// Time the breaker stays open before letting probe calls through.
    #[serde(rename = "wait_duration_in_open_state_secs", with = "duration_secs")]
    pub wait_duration_in_open_state: Duration,

    /// Probe calls allowed while half-open.
    pub permitted_number_of_calls_in_half_open_state: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            minimum_number_of_calls: 10,
            sliding_window_size: 100,
            wait_duration_in_open_state: Duration::from_secs(60),
            permitted_number_of_calls_in_half_open_state: 10,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_rate_threshold(mut self, percent: f64) -> Self {
        self.failure_rate_threshold = percent;
        self
    }

    pub fn with_minimum_number_of_calls(mut self, calls: usize) -> Self {
        self.minimum_number_of_calls = calls;
        self
    }

    pub fn with_sliding_window_size(mut self, size: usize) -> Self {
        self.sliding_window_size = size;
        self
    }

    pub fn with_wait_duration_in_open_state(mut self, wait: Duration) -> Self {
        self.wait_duration_in_open_state = wait;
        self
    }

    pub fn with_permitted_number_of_calls_in_half_open_state(mut self, calls: u32) -> Self {
        self.permitted_number_of_calls_in_half_open_state = calls;
        self
    }
}

/// Simulated external dependency configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExternalServiceConfig {
    /// Registry id of the breaker guarding the service.
    pub breaker_id: String,

    /// Probability (0.0-1.0) that a simulated call fails.
    pub failure_probability: f64,

    /// Simulated processing time of a successful call, in milliseconds.
    pub latency_ms: u64,
}

impl Default for ExternalServiceConfig {
    fn default() -> Self {
        Self {
            breaker_id: "external".to_string(),
            failure_probability: 0.5,
            latency_ms: 100,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Durations written as (possibly fractional) seconds.
pub(crate) mod duration_secs {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|e| de::Error::custom(format!("invalid duration {secs}s: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.circuit_breaker.failure_rate_threshold, 50.0);
        assert_eq!(config.circuit_breaker.sliding_window_size, 100);
        assert_eq!(config.circuit_breaker.wait_duration_in_open_state, Duration::from_secs(60));
        assert_eq!(config.external_service.breaker_id, "external");
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [circuit_breaker]
            failure_rate_threshold = 25.0
            wait_duration_in_open_state_secs = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.circuit_breaker.failure_rate_threshold, 25.0);
        assert_eq!(
            config.circuit_breaker.wait_duration_in_open_state,
            Duration::from_millis(500)
        );
        assert_eq!(config.circuit_breaker.minimum_number_of_calls, 10);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_negative_wait_rejected_by_parser() {
        let result: Result<AppConfig, _> = toml::from_str(
            r#"
            [circuit_breaker]
            wait_duration_in_open_state_secs = -1.0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_builder() {
        let config = CircuitBreakerConfig::new()
            .with_failure_rate_threshold(75.0)
            .with_minimum_number_of_calls(2)
            .with_sliding_window_size(8)
            .with_wait_duration_in_open_state(Duration::from_millis(10))
            .with_permitted_number_of_calls_in_half_open_state(1);
        assert_eq!(config.failure_rate_threshold, 75.0);
        assert_eq!(config.minimum_number_of_calls, 2);
        assert_eq!(config.sliding_window_size, 8);
        assert_eq!(config.wait_duration_in_open_state, Duration::from_millis(10));
        assert_eq!(config.permitted_number_of_calls_in_half_open_state, 1);
    }
}
