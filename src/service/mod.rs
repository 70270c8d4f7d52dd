//! Services protected by circuit breakers.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → external.rs (simulated dependency)
//!     → registry (breaker for the dependency's id)
//!     → operation or fallback
//! ```

pub mod external;

pub use external::ExternalService;
