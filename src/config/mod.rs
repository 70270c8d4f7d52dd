//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, apply environment overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → CircuitBreakerConfig shared by every breaker in the registry
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a breaker never sees a changed config
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::AppConfig;
pub use schema::CircuitBreakerConfig;
pub use schema::ExternalServiceConfig;
pub use schema::ObservabilityConfig;
pub use schema::ServerConfig;
