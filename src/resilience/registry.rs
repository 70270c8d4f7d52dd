//! Registry of named circuit breakers.
//!
//! # Responsibilities
//! - Map a caller-chosen id to one breaker per logical dependency
//! - Create each breaker on first use from the shared configuration
//! - Answer status queries for one id or for every registered id
//!
//! # Design Decisions
//! - Owned value passed to whoever needs lookups; no process-wide singleton
//! - `DashMap::entry` gives compute-if-absent: concurrent first calls for the
//!   same id build exactly one breaker
//! - Breakers live as long as the registry; there is no removal

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::config::validation::validate_breaker_config;
use crate::config::CircuitBreakerConfig;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerStatus};
use crate::{Error, Result};

/// Status of one registered breaker, tagged with its id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerStatusEntry {
    pub id: String,
    #[serde(flatten)]
    pub status: CircuitBreakerStatus,
}

/// Lazily populated id → breaker map sharing one configuration.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry. The configuration is validated up front so
    /// that creating a breaker later cannot fail.
    pub fn new(config: CircuitBreakerConfig) -> Result<Self> {
        if let Err(errors) = validate_breaker_config(&config) {
            let detail = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::InvalidArgument(detail));
        }
        tracing::info!("Circuit breaker registry initialized");
        Ok(Self {
            config,
            breakers: DashMap::new(),
        })
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Breaker registered under `id`, created on first use.
    pub fn get_or_create(&self, id: &str) -> Result<Arc<CircuitBreaker>> {
        if id.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "circuit breaker id must not be empty".to_string(),
            ));
        }
        if let Some(existing) = self.breakers.get(id) {
            return Ok(Arc::clone(existing.value()));
        }

        let entry = self
            .breakers
            .entry(id.to_string())
            .or_try_insert_with(|| {
                tracing::info!(breaker = %id, "Creating circuit breaker with default configuration");
                CircuitBreaker::new(id, self.config.clone()).map(Arc::new)
            })?;
        Ok(Arc::clone(entry.value()))
    }

    /// Breaker registered under `id`, if any call has created it.
    pub fn get(&self, id: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Run `operation` through the breaker registered under `id`.
    ///
    /// The only error is [`Error::InvalidArgument`] for an empty id; failures
    /// of the operation are answered by `fallback`.
    pub fn execute<T, E, Op, Fb>(&self, id: &str, operation: Op, fallback: Fb) -> Result<T>
    where
        Op: FnOnce() -> std::result::Result<T, E>,
        E: fmt::Display,
        Fb: FnOnce() -> T,
    {
        let breaker = self.get_or_create(id)?;
        Ok(breaker.execute(operation, fallback))
    }

    /// Async counterpart of [`execute`](Self::execute).
    pub async fn execute_async<T, E, Op, Fut, Fb>(
        &self,
        id: &str,
        operation: Op,
        fallback: Fb,
    ) -> Result<T>
    where
        Op: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
        Fb: FnOnce() -> T,
    {
        let breaker = self.get_or_create(id)?;
        Ok(breaker.execute_async(operation, fallback).await)
    }

    pub fn status(&self, id: &str) -> Option<CircuitBreakerStatus> {
        self.breakers.get(id).map(|r| r.value().status())
    }

    /// Status of every registered breaker, sorted by id.
    pub fn statuses(&self) -> Vec<BreakerStatusEntry> {
        let mut statuses: Vec<BreakerStatusEntry> = self
            .breakers
            .iter()
            .map(|r| BreakerStatusEntry {
                id: r.key().clone(),
                status: r.value().status(),
            })
            .collect();
        statuses.sort_by(|a, b| a.id.cmp(&b.id));
        statuses
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
