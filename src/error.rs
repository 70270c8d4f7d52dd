//! Crate-wide error type.

use crate::config::ConfigError;

/// Errors surfaced to callers of the crate.
///
/// Failures of a guarded operation never show up here: the breaker records
/// them and answers with the fallback instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Programmer error: a breaker or registry was used with arguments it
    /// cannot work with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
