//! Per-dependency circuit breakers with an HTTP demo service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http ──▶ service::external ──▶ resilience::registry
//!                                                         │
//!                                                         ▼
//!                                               resilience::circuit_breaker
//!                                                 │                  │
//!                                          operation            fallback
//!                                                 │
//!                                                 ▼
//!                                      resilience::sliding_window
//!
//!     Cross-cutting: config, observability, lifecycle
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod service;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::{CircuitBreaker, CircuitBreakerRegistry, State};
