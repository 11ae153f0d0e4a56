//! Process-level configuration for the demonstration binary (§10.3). The
//! engine itself is a library with no env/CLI config of its own; these
//! knobs only drive the Scheduler Loop runner in `main.rs`.

use std::env;
use thiserror::Error;

use crate::utils::parse_duration_string;

/// Configuration errors with descriptive messages.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Invalid duration format for {var}: {message}")]
    InvalidDuration { var: String, message: String },
}

/// Process-level configuration: how many poller workers to run, how often
/// each one ticks the scheduler, where to serve `/metrics`, and whether to
/// emit logs as JSON.
#[derive(Debug, Clone)]
pub struct Config {
    pub poller_workers: usize,
    pub poll_tick_interval: std::time::Duration,
    pub metrics_port: u16,
    pub json_logs: bool,
}

/// Helper to parse an environment variable with a default value.
fn env_parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var: name.into(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Helper to parse a boolean environment variable.
fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .to_lowercase()
        == "true"
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let poller_workers: usize = env_parse_or("POLLER_WORKERS", 4)?;
        if poller_workers == 0 {
            return Err(ConfigError::InvalidValue {
                var: "POLLER_WORKERS".into(),
                message: "must be greater than 0".into(),
            });
        }

        let tick_str = env::var("POLL_TICK_INTERVAL").unwrap_or_else(|_| "1s".to_string());
        let poll_tick_interval =
            parse_duration_string(&tick_str).map_err(|e| ConfigError::InvalidDuration {
                var: "POLL_TICK_INTERVAL".into(),
                message: e,
            })?;

        let metrics_port: u16 = env_parse_or("METRICS_PORT", 9090)?;
        let json_logs = env_bool("JSON_LOGS", false);

        Ok(Config {
            poller_workers,
            poll_tick_interval,
            metrics_port,
            json_logs,
        })
    }

    /// Creates a default Config for testing purposes.
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Config {
            poller_workers: 4,
            poll_tick_interval: std::time::Duration::from_secs(1),
            metrics_port: 9090,
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    // Tests that mutate process environment variables run `#[serial]` so
    // Rust's parallel test runner doesn't interleave them within this file.
    fn clear_env_vars() {
        for var in ["POLLER_WORKERS", "POLL_TICK_INTERVAL", "METRICS_PORT", "JSON_LOGS"] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn defaults_with_no_env_vars_set() {
        clear_env_vars();

        let config = Config::from_env().unwrap();
        assert_eq!(config.poller_workers, 4);
        assert_eq!(config.poll_tick_interval, std::time::Duration::from_secs(1));
        assert_eq!(config.metrics_port, 9090);
        assert!(!config.json_logs);

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn custom_worker_count() {
        clear_env_vars();

        env::set_var("POLLER_WORKERS", "16");
        let config = Config::from_env().unwrap();
        assert_eq!(config.poller_workers, 16);

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn zero_workers_is_rejected() {
        clear_env_vars();

        env::set_var("POLLER_WORKERS", "0");
        let result = Config::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref var, .. }) if var == "POLLER_WORKERS"
        ));

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn custom_tick_interval() {
        clear_env_vars();

        env::set_var("POLL_TICK_INTERVAL", "5m");
        let config = Config::from_env().unwrap();
        assert_eq!(config.poll_tick_interval, std::time::Duration::from_secs(300));

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn invalid_tick_interval_returns_error() {
        clear_env_vars();

        env::set_var("POLL_TICK_INTERVAL", "garbage");
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidDuration { .. })));

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn json_logs_flag_parsed() {
        clear_env_vars();

        env::set_var("JSON_LOGS", "true");
        let config = Config::from_env().unwrap();
        assert!(config.json_logs);

        clear_env_vars();
    }

    #[test]
    fn for_testing_creates_valid_config() {
        let config = Config::for_testing();
        assert_eq!(config.poller_workers, 4);
        assert_eq!(config.metrics_port, 9090);
    }
}
