//! Configuration loading from disk and environment.
//!
//! Priority: environment > config file > defaults.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Prefix of the environment variables overriding breaker settings.
pub const ENV_PREFIX: &str = "CIRCUIT_BREAKER_";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for environment variable {key}")]
    Env { key: String, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve the effective configuration: optional file, then process
/// environment overrides, then validation.
pub fn load(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    load_with(path, |key| std::env::var(key).ok())
}

/// [`load`] with variables looked up through `lookup` instead of the
/// process environment.
pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Override configuration values from variables found through `lookup`.
///
/// `lookup` is the process environment in production and a map in tests.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let breaker = &mut config.circuit_breaker;
    if let Some(v) = env_value(&lookup, "FAILURE_RATE_THRESHOLD")? {
        breaker.failure_rate_threshold = v;
    }
    if let Some(v) = env_value(&lookup, "MINIMUM_NUMBER_OF_CALLS")? {
        breaker.minimum_number_of_calls = v;
    }
    if let Some(v) = env_value(&lookup, "SLIDING_WINDOW_SIZE")? {
        breaker.sliding_window_size = v;
    }
    if let Some(secs) = env_value::<f64, _>(&lookup, "WAIT_DURATION_IN_OPEN_STATE")? {
        let key = format!("{ENV_PREFIX}WAIT_DURATION_IN_OPEN_STATE");
        breaker.wait_duration_in_open_state =
            Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::Env {
                key,
                value: secs.to_string(),
            })?;
    }
    if let Some(v) = env_value(&lookup, "PERMITTED_NUMBER_OF_CALLS_IN_HALF_OPEN_STATE")? {
        breaker.permitted_number_of_calls_in_half_open_state = v;
    }

    if let Some(addr) = lookup("BIND_ADDRESS") {
        config.server.bind_address = addr;
    }
    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    Ok(())
}

fn env_value<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let key = format!("{ENV_PREFIX}{name}");
    match lookup(&key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_breaker_settings() {
        let mut config = AppConfig::default();
        let lookup = lookup_from(&[
            ("CIRCUIT_BREAKER_FAILURE_RATE_THRESHOLD", "30"),
            ("CIRCUIT_BREAKER_MINIMUM_NUMBER_OF_CALLS", "4"),
            ("CIRCUIT_BREAKER_SLIDING_WINDOW_SIZE", "8"),
            ("CIRCUIT_BREAKER_WAIT_DURATION_IN_OPEN_STATE", "1.5"),
            ("CIRCUIT_BREAKER_PERMITTED_NUMBER_OF_CALLS_IN_HALF_OPEN_STATE", "2"),
            ("BIND_ADDRESS", "127.0.0.1:9000"),
        ]);

        apply_env_overrides(&mut config, lookup).unwrap();

        let breaker = &config.circuit_breaker;
        assert_eq!(breaker.failure_rate_threshold, 30.0);
        assert_eq!(breaker.minimum_number_of_calls, 4);
        assert_eq!(breaker.sliding_window_size, 8);
        assert_eq!(breaker.wait_duration_in_open_state, Duration::from_millis(1500));
        assert_eq!(breaker.permitted_number_of_calls_in_half_open_state, 2);
        assert_eq!(config.server.bind_address, "127.0.0.1:9000");
    }

    #[test]
    fn test_unparsable_env_value() {
        let mut config = AppConfig::default();
        let lookup = lookup_from(&[("CIRCUIT_BREAKER_SLIDING_WINDOW_SIZE", "ten")]);

        let err = apply_env_overrides(&mut config, lookup).unwrap_err();
        match err {
            ConfigError::Env { key, value } => {
                assert_eq!(key, "CIRCUIT_BREAKER_SLIDING_WINDOW_SIZE");
                assert_eq!(value, "ten");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_negative_wait_from_env() {
        let mut config = AppConfig::default();
        let lookup = lookup_from(&[("CIRCUIT_BREAKER_WAIT_DURATION_IN_OPEN_STATE", "-3")]);
        assert!(matches!(
            apply_env_overrides(&mut config, lookup),
            Err(ConfigError::Env { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "circuit-breaker-config-{}.toml",
            std::process::id()
        ));
        fs::write(
            &path,
            r#"
            [server]
            bind_address = "127.0.0.1:18080"

            [circuit_breaker]
            failure_rate_threshold = 50.0
            minimum_number_of_calls = 4
            sliding_window_size = 4
            wait_duration_in_open_state_secs = 1
            permitted_number_of_calls_in_half_open_state = 2
            "#,
        )
        .unwrap();

        let config = load_with(Some(&path), lookup_from(&[])).unwrap();
        std::fs::remove_file(&path).unwrap_or_default();

        assert_eq!(config.server.bind_address, "127.0.0.1:18080");
        assert_eq!(config.circuit_breaker.sliding_window_size, 4);
        assert_eq!(
            config.circuit_breaker.wait_duration_in_open_state,
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_load_reports_validation() {
        let path = std::env::temp_dir().join(format!(
            "circuit-breaker-invalid-{}.toml",
            std::process::id()
        ));
        fs::write(
            &path,
            r#"
            [circuit_breaker]
            sliding_window_size = 2
            minimum_number_of_calls = 3
            "#,
        )
        .unwrap();

        let err = load_with(Some(&path), lookup_from(&[])).unwrap_err();
        std::fs::remove_file(&path).unwrap_or_default();

        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
        assert!(err.to_string().contains("minimum_number_of_calls"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_with(Some(Path::new("/definitely/not/here.toml")), lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_env_wins_over_file() {
        let path = std::env::temp_dir().join(format!(
            "circuit-breaker-layered-{}.toml",
            std::process::id()
        ));
        fs::write(
            &path,
            r#"
            [circuit_breaker]
            failure_rate_threshold = 40.0
            sliding_window_size = 20

            [observability]
            log_level = "warn"
            "#,
        )
        .unwrap();

        let lookup = lookup_from(&[
            ("CIRCUIT_BREAKER_FAILURE_RATE_THRESHOLD", "65"),
            ("LOG_LEVEL", "debug"),
        ]);
        let config = load_with(Some(&path), lookup).unwrap();
        std::fs::remove_file(&path).unwrap_or_default();

        assert_eq!(config.circuit_breaker.failure_rate_threshold, 65.0);
        assert_eq!(config.circuit_breaker.sliding_window_size, 20);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_env_override_is_validated() {
        let lookup = lookup_from(&[("CIRCUIT_BREAKER_SLIDING_WINDOW_SIZE", "0")]);
        let err = load_with(None, lookup).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
