//! # Runtime Configuration
//!
//! Loaded from the TOML file named by `EVBUS_CONFIG` (defaults otherwise),
//! then overridden from the environment.
//!
//! ```toml
//! shutdown_grace_secs = 10
//!
//! [broker]
//! serializer = "json"
//! match_plugin = "glob"
//! capacity = 10000
//! error_callback_timeout_ms = 5000
//!
//! [dead_letter]
//! path = "./dead-letter.jsonl"
//!
//! [[ingress]]
//! name = "audit"
//! kind = "log"
//! acct = ["p1"]
//!
//! [[ingress]]
//! name = "archive"
//! kind = "file"
//! acct = ["p2"]
//! path = "./archive.jsonl"
//!
//! [[contexts.p1.default]]
//! "prod-*" = { token = "abc" }
//!
//! [[contexts.p2.ops]]
//! "special" = "ops-user"
//! ```

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use evbus::{BrokerConfig, Contexts, DEFAULT_MATCHER, DEFAULT_SERIALIZER};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "EVBUS_CONFIG";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// TOML parse error.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// An environment override could not be parsed.
    #[error("Invalid value '{value}' for {var}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },

    /// An ingress entry declares no credential providers.
    #[error("Ingress '{ingress}' must declare at least one credential provider in `acct`")]
    EmptyAcct {
        /// Ingress name.
        ingress: String,
    },

    /// A file ingress has no target path.
    #[error("Ingress '{ingress}' of kind 'file' requires a `path`")]
    MissingPath {
        /// Ingress name.
        ingress: String,
    },

    /// Two ingress entries share a name.
    #[error("Ingress name '{ingress}' is used more than once")]
    DuplicateIngress {
        /// Ingress name.
        ingress: String,
    },

    /// Any other invalid setting.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Broker settings.
    pub broker: BrokerSection,
    /// Credential contexts handed to every `propagate`.
    pub contexts: Contexts,
    /// Ingress plugins to register.
    pub ingress: Vec<IngressConfig>,
    /// Where failed deliveries are recorded, if anywhere.
    pub dead_letter: Option<DeadLetterConfig>,
    /// How long shutdown waits for the listener to drain.
    pub shutdown_grace_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            broker: BrokerSection::default(),
            contexts: Contexts::default(),
            ingress: Vec::new(),
            dead_letter: None,
            shutdown_grace_secs: 10,
        }
    }
}

/// `[broker]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerSection {
    /// Codec name.
    pub serializer: String,
    /// Default matcher name.
    pub match_plugin: String,
    /// Queue bound; absent means unbounded.
    pub capacity: Option<usize>,
    /// Error-callback timeout in milliseconds.
    pub error_callback_timeout_ms: u64,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            serializer: DEFAULT_SERIALIZER.to_string(),
            match_plugin: DEFAULT_MATCHER.to_string(),
            capacity: None,
            error_callback_timeout_ms: 5_000,
        }
    }
}

impl BrokerSection {
    /// Convert into the broker's own configuration.
    #[must_use]
    pub fn to_broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            serializer: self.serializer.clone(),
            match_plugin: self.match_plugin.clone(),
            capacity: self.capacity,
            error_callback_timeout: Duration::from_millis(self.error_callback_timeout_ms),
        }
    }
}

/// Built-in ingress kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngressKind {
    /// Log each delivery through `tracing`.
    Log,
    /// Append each delivery to a JSON-lines file.
    File,
}

/// One `[[ingress]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct IngressConfig {
    /// Unique plugin name.
    pub name: String,
    /// Plugin implementation.
    pub kind: IngressKind,
    /// Accepted credential providers.
    #[serde(default)]
    pub acct: Vec<String>,
    /// Target file (`file` kind only).
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// `[dead_letter]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DeadLetterConfig {
    /// JSON-lines file receiving error reports.
    pub path: PathBuf,
}

impl RuntimeConfig {
    /// Load from `EVBUS_CONFIG` (or defaults) and apply environment overrides.
    ///
    /// # Errors
    ///
    /// I/O, parse, override and validation errors.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env::var(CONFIG_ENV) {
            Ok(path) => {
                info!(path = %path, "Loading configuration file");
                Self::from_file(path)?
            }
            Err(_) => {
                info!("No {} set, using default configuration", CONFIG_ENV);
                Self::default()
            }
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    ///
    /// # Errors
    ///
    /// `ConfigError::Io` or `ConfigError::Parse`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse a TOML string.
    ///
    /// # Errors
    ///
    /// `ConfigError::Parse` on malformed TOML or unexpected shapes.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `EVBUS_SERIALIZER`, `EVBUS_MATCH_PLUGIN` and `EVBUS_CAPACITY`.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidEnv` if `EVBUS_CAPACITY` is not a number.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(serializer) = lookup("EVBUS_SERIALIZER") {
            self.broker.serializer = serializer;
        }
        if let Some(matcher) = lookup("EVBUS_MATCH_PLUGIN") {
            self.broker.match_plugin = matcher;
        }
        if let Some(capacity) = lookup("EVBUS_CAPACITY") {
            let parsed = capacity.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "EVBUS_CAPACITY",
                value: capacity.clone(),
            })?;
            self.broker.capacity = Some(parsed);
        }
        Ok(())
    }

    /// Reject configurations the broker would fail on later.
    ///
    /// # Errors
    ///
    /// The first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.capacity == Some(0) {
            return Err(ConfigError::Invalid("broker.capacity must be positive".into()));
        }

        let mut seen = HashSet::new();
        for ingress in &self.ingress {
            if !seen.insert(ingress.name.as_str()) {
                return Err(ConfigError::DuplicateIngress {
                    ingress: ingress.name.clone(),
                });
            }
            if ingress.acct.is_empty() {
                return Err(ConfigError::EmptyAcct {
                    ingress: ingress.name.clone(),
                });
            }
            if ingress.kind == IngressKind::File && ingress.path.is_none() {
                return Err(ConfigError::MissingPath {
                    ingress: ingress.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Shutdown grace period.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
