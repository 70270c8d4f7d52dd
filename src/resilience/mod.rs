//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Caller:
//!     → registry.rs (breaker for the dependency id, created on first use)
//!     → circuit_breaker.rs (admit, run operation or fallback)
//!     → sliding_window.rs (record outcome, failure rate for the next decision)
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency id, never global
//! - Fail fast while open; the fallback always answers
//! - Recovery is probed with a bounded number of half-open calls
//! - No retries or timeouts here; those belong to the guarded operation

pub mod circuit_breaker;
pub mod registry;
pub mod sliding_window;

pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitBreakerStatus, State};
pub use registry::{BreakerStatusEntry, CircuitBreakerRegistry};
pub use sliding_window::{CallOutcome, SlidingWindow, WindowSnapshot};
