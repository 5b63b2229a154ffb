//! # evbus Runtime
//!
//! Process wiring around the [`evbus`] broker: TOML configuration, logging,
//! built-in ingress plugins, a dead-letter file and a line-oriented producer.
//!
//! ## Modules
//!
//! - `config` - `RuntimeConfig` loaded from `EVBUS_CONFIG` plus env overrides
//! - `telemetry` - `tracing-subscriber` setup
//! - `plugins` - `log` and `file` ingress plugins
//! - `dead_letter` - error callback writing failed deliveries to disk
//! - `producer` - NDJSON reader feeding `Broker::put`
//! - `runtime` - `BusRuntime` lifecycle (start, graceful shutdown)

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod dead_letter;
pub mod plugins;
pub mod producer;
pub mod runtime;
pub mod telemetry;

pub use config::{ConfigError, IngressConfig, IngressKind, RuntimeConfig};
pub use dead_letter::DeadLetterFile;
pub use plugins::{build_ingress, FileIngress, LogIngress};
pub use producer::{parse_line, produce_from};
pub use runtime::BusRuntime;
pub use telemetry::{init_logging, TelemetryConfig, TelemetryError};
