//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers and HTTP handlers produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (call counters, state gauges)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (breaker, from, to) on every state change
//! - Metrics are cheap (atomic increments behind the facade)

pub mod logging;
pub mod metrics;
