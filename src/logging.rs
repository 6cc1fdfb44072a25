//! Tracing subscriber setup
//!
//! ```text
//! Registry
//!   ├── EnvFilter (RUST_LOG, else the CLI log level)
//!   └── Fmt Layer (JSON or pretty console output)
//! ```

use crate::config::LogFormat;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Logging setup errors
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Failed to set global subscriber (may already be initialized): {0}")]
    AlreadyInitialized(String),
}

/// Build the level filter: `RUST_LOG` when set, `default_level` otherwise
pub fn env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_level).map_err(|e| LoggingError::InvalidFilter {
        filter: default_level.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber
pub fn init_subscriber(format: LogFormat, default_level: &str) -> Result<(), LoggingError> {
    let filter = env_filter(default_level)?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true);

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry.with(fmt_layer.json()).try_init(),
        LogFormat::Pretty => registry.with(fmt_layer.pretty()).try_init(),
    };

    result.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_filter_default_level() {
        std::env::remove_var("RUST_LOG");
        assert!(env_filter("debug").is_ok());
        assert!(env_filter("smslog_receiver=trace,info").is_ok());
    }

    #[test]
    #[serial]
    fn test_env_filter_invalid_level() {
        std::env::remove_var("RUST_LOG");
        assert!(matches!(
            env_filter("smslog_receiver=verbose"),
            Err(LoggingError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_init_subscriber_twice() {
        let _ = init_subscriber(LogFormat::Pretty, "info");
        // A second global subscriber is always refused.
        assert!(init_subscriber(LogFormat::Json, "info").is_err());
    }
}
