//! Logging configuration from environment variables.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `EVBUS_LOG_LEVEL` or `RUST_LOG` | `info` | `EnvFilter` directive |
//! | `EVBUS_JSON_LOGS` | `false` (`true` in containers) | JSON formatted logs |
//! | `EVBUS_LOG_TARGET` | `true` | Include the event target |

use std::env;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Logging initialization errors.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("Failed to install global subscriber: {0}")]
    Init(String),
}

/// Logging settings.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive (e.g. `info`, `evbus=debug,info`).
    pub log_level: String,

    /// Emit one JSON object per line instead of human-readable output.
    pub json_logs: bool,

    /// Include the event target (module path).
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        Self {
            log_level: lookup("EVBUS_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),

            json_logs: lookup("EVBUS_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            with_target: lookup("EVBUS_LOG_TARGET")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),
        }
    }

    /// Parse the filter directive.
    ///
    /// # Errors
    ///
    /// `TelemetryError::Filter` if the directive is malformed.
    pub fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        EnvFilter::try_new(&self.log_level).map_err(|e| TelemetryError::Filter {
            filter: self.log_level.clone(),
            reason: e.to_string(),
        })
    }
}

/// Install the global `tracing` subscriber.
///
/// # Errors
///
/// Fails on a malformed filter or when a global subscriber already exists.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter()?)
        .with_target(config.with_target)
        .with_thread_ids(true);

    let installed = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| TelemetryError::Init(e.to_string()))?;

    tracing::debug!(
        log_level = %config.log_level,
        json_logs = config.json_logs,
        "Logging initialized"
    );
    Ok(())
}
