//! Simulated external dependency.
//!
//! # Responsibilities
//! - Stand in for an unreliable downstream API (random failures, latency)
//! - Route every call through the breaker registered under `breaker_id`
//! - Report that breaker's status
//!
//! # Design Decisions
//! - Failure injection is pluggable so tests can script outcomes
//! - The fallback is a canned answer; callers always get a response

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::config::ExternalServiceConfig;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerStatus};
use crate::resilience::registry::CircuitBreakerRegistry;
use crate::{Error, Result};

pub const SUCCESS_RESPONSE: &str = "External service response: Success!";
pub const FALLBACK_RESPONSE: &str = "External service response (fallback): Success!";

/// Error raised by the simulated dependency.
#[derive(Debug, thiserror::Error)]
pub enum ExternalError {
    #[error("External service is down")]
    Unavailable,
}

type FailureSource = Box<dyn Fn() -> bool + Send + Sync>;

/// Demo service whose calls fail at random.
pub struct ExternalService {
    breaker: Arc<CircuitBreaker>,
    latency: Duration,
    should_fail: FailureSource,
}

impl ExternalService {
    /// Create the service and register its breaker.
    pub fn new(registry: &CircuitBreakerRegistry, config: &ExternalServiceConfig) -> Result<Self> {
        let probability = config.failure_probability;
        if !(0.0..=1.0).contains(&probability) {
            return Err(Error::InvalidArgument(format!(
                "failure probability {probability} is outside 0.0..=1.0"
            )));
        }
        let should_fail: FailureSource = Box::new(move || rand::thread_rng().gen_bool(probability));
        Self::with_failure_source(registry, config, should_fail)
    }

    /// Create the service with a custom failure decision, called once per
    /// attempted call.
    pub fn with_failure_source(
        registry: &CircuitBreakerRegistry,
        config: &ExternalServiceConfig,
        should_fail: FailureSource,
    ) -> Result<Self> {
        let breaker = registry.get_or_create(&config.breaker_id)?;
        Ok(Self {
            breaker,
            latency: Duration::from_millis(config.latency_ms),
            should_fail,
        })
    }

    /// Call the dependency through its circuit breaker.
    pub async fn call_external_api(&self) -> String {
        self.breaker
            .execute_async(|| self.simulate_call(), Self::fallback)
            .await
    }

    pub fn status(&self) -> CircuitBreakerStatus {
        self.breaker.status()
    }

    pub fn breaker_id(&self) -> &str {
        self.breaker.name()
    }

    async fn simulate_call(&self) -> std::result::Result<String, ExternalError> {
        if (self.should_fail)() {
            return Err(ExternalError::Unavailable);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(SUCCESS_RESPONSE.to_string())
    }

    fn fallback() -> String {
        FALLBACK_RESPONSE.to_string()
    }
}

impl std::fmt::Debug for ExternalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalService")
            .field("breaker", &self.breaker.name())
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use crate::resilience::circuit_breaker::State;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn registry() -> CircuitBreakerRegistry {
        CircuitBreakerRegistry::new(
            CircuitBreakerConfig::new()
                .with_failure_rate_threshold(50.0)
                .with_minimum_number_of_calls(4)
                .with_sliding_window_size(4)
                .with_wait_duration_in_open_state(Duration::from_millis(30))
                .with_permitted_number_of_calls_in_half_open_state(2),
        )
        .unwrap()
    }

    fn config() -> ExternalServiceConfig {
        ExternalServiceConfig {
            latency_ms: 0,
            ..ExternalServiceConfig::default()
        }
    }

    #[test]
    fn test_rejects_bad_probability() {
        let mut config = config();
        config.failure_probability = 2.0;
        assert!(matches!(
            ExternalService::new(&registry(), &config),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_registers_breaker() {
        let registry = registry();
        let service = ExternalService::new(&registry, &config()).unwrap();
        assert_eq!(service.breaker_id(), "external");
        assert!(registry.get("external").is_some());
        assert_eq!(service.status().state, State::Closed);
    }

    #[tokio::test]
    async fn test_never_failing_service() {
        let mut config = config();
        config.failure_probability = 0.0;
        let service = ExternalService::new(&registry(), &config).unwrap();

        for _ in 0..5 {
            assert_eq!(service.call_external_api().await, SUCCESS_RESPONSE);
        }
        assert_eq!(service.status().failure_rate_percent, 0.0);
    }

    #[tokio::test]
    async fn test_outage_and_recovery() {
        let down = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&down);
        let service = ExternalService::with_failure_source(
            &registry(),
            &config(),
            Box::new(move || flag.load(Ordering::SeqCst)),
        )
        .unwrap();

        for _ in 0..4 {
            assert_eq!(service.call_external_api().await, FALLBACK_RESPONSE);
        }
        assert_eq!(service.status().state, State::Open);

        down.store(false, Ordering::SeqCst);
        // Still open: healthy dependency is not consulted yet
        assert_eq!(service.call_external_api().await, FALLBACK_RESPONSE);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(service.call_external_api().await, SUCCESS_RESPONSE);
        assert_eq!(service.status().state, State::Closed);
    }
}
