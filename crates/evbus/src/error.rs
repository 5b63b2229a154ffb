//! # Broker Errors
//!
//! Configuration and serialization errors are surfaced to the caller.
//! Delivery errors never leave `propagate`; they are logged and optionally
//! reported to the error callback.

use crate::event::Priority;
use thiserror::Error;

/// Errors surfaced by broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// An ingress plugin declares no credential providers.
    #[error("Ingress plugin '{plugin}' declares no credential providers (ACCT is empty)")]
    Configuration {
        /// Name of the misconfigured plugin.
        plugin: String,
    },

    /// The payload could not be serialized.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// A plugin was looked up by a name nobody registered.
    #[error("No {kind} plugin registered under '{name}'")]
    PluginNotFound {
        /// Plugin family ("serializer", "matcher", "ingress").
        kind: &'static str,
        /// Requested name.
        name: String,
    },

    /// The bus is bounded and currently full.
    #[error("Event queue is full (capacity: {capacity})")]
    QueueFull {
        /// Configured capacity.
        capacity: usize,
    },

    /// An explicit priority collides with the reserved stop sentinel.
    #[error("Priority {priority} is reserved for the stop sentinel")]
    ReservedPriority {
        /// The rejected priority.
        priority: Priority,
    },
}

/// Errors from turning a producer value into an event body.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// The value could not be converted into a serializable document.
    #[error("Payload is not serializable: {0}")]
    Value(#[source] serde_json::Error),

    /// The codec rejected the document.
    #[error("Codec '{codec}' failed to encode payload: {reason}")]
    Encode {
        /// Codec name.
        codec: String,
        /// Underlying error message.
        reason: String,
    },
}

/// Outcome of a single failed delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The plugin's `publish` returned an error.
    #[error("Ingress plugin '{plugin}' failed to publish for profile '{profile}': {error:#}")]
    Publish {
        /// Plugin name.
        plugin: String,
        /// Profile of the triggering event.
        profile: String,
        /// Error returned by the plugin.
        error: anyhow::Error,
    },

    /// The delivery task panicked.
    #[error("Delivery task for plugin '{plugin}' (profile '{profile}') panicked")]
    Panicked {
        /// Plugin name.
        plugin: String,
        /// Profile of the triggering event.
        profile: String,
    },

    /// The delivery task was cancelled before it finished.
    #[error("Delivery task for plugin '{plugin}' (profile '{profile}') was cancelled")]
    Cancelled {
        /// Plugin name.
        plugin: String,
        /// Profile of the triggering event.
        profile: String,
    },
}

impl DeliveryError {
    /// Name of the plugin whose delivery failed.
    #[must_use]
    pub fn plugin(&self) -> &str {
        match self {
            Self::Publish { plugin, .. }
            | Self::Panicked { plugin, .. }
            | Self::Cancelled { plugin, .. } => plugin,
        }
    }

    /// Profile of the event whose delivery failed.
    #[must_use]
    pub fn profile(&self) -> &str {
        match self {
            Self::Publish { profile, .. }
            | Self::Panicked { profile, .. }
            | Self::Cancelled { profile, .. } => profile,
        }
    }
}

/// Result alias for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;
