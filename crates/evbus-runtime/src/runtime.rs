//! # Bus Runtime
//!
//! Wires a [`Broker`] from a [`RuntimeConfig`] and drives its listener.
//!
//! ## Shutdown Sequence
//!
//! 1. Enqueue the stop sentinel (lowest precedence, so queued events drain first)
//! 2. Wait for the listener to return
//! 3. Wait for outstanding error reports (dead-letter writes)
//!
//! All three share one grace period; whatever is still running when it
//! expires is aborted.

use std::sync::Arc;
use std::time::Duration;

use evbus::{Broker, Contexts};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::{ConfigError, RuntimeConfig};
use crate::dead_letter::DeadLetterFile;
use crate::plugins::build_ingress;

/// A configured broker plus its listener task.
pub struct BusRuntime {
    broker: Arc<Broker>,
    contexts: Arc<Contexts>,
    listener: Option<JoinHandle<u64>>,
}

impl BusRuntime {
    /// Build the broker and register every configured plugin.
    ///
    /// # Errors
    ///
    /// Configuration validation and plugin construction errors.
    pub fn new(config: &RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let broker = Broker::new(config.broker.to_broker_config());
        if !broker.serializers().contains(&config.broker.serializer) {
            return Err(ConfigError::Invalid(format!(
                "unknown serializer '{}' (available: {})",
                config.broker.serializer,
                broker.serializers().names().join(", ")
            )));
        }
        if !broker.matchers().contains(&config.broker.match_plugin) {
            return Err(ConfigError::Invalid(format!(
                "unknown match plugin '{}' (available: {})",
                config.broker.match_plugin,
                broker.matchers().names().join(", ")
            )));
        }

        for ingress in &config.ingress {
            broker.register_ingress(build_ingress(ingress)?);
            info!(ingress = %ingress.name, kind = ?ingress.kind, "Ingress registered");
        }

        if let Some(dead_letter) = &config.dead_letter {
            broker.set_error_callback(Arc::new(DeadLetterFile::new(&dead_letter.path)));
            info!(path = %dead_letter.path.display(), "Dead-letter file configured");
        }

        Ok(Self {
            broker: Arc::new(broker),
            contexts: Arc::new(config.contexts.clone()),
            listener: None,
        })
    }

    /// The broker, for producers.
    #[must_use]
    pub fn broker(&self) -> Arc<Broker> {
        Arc::clone(&self.broker)
    }

    /// Whether the listener task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.listener.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Upgrade the bus and spawn the listener. Calling twice is a no-op.
    pub async fn start(&mut self) {
        if self.listener.is_some() {
            warn!("Bus runtime already started");
            return;
        }

        self.broker.init().await;
        let broker = Arc::clone(&self.broker);
        let contexts = Arc::clone(&self.contexts);
        self.listener = Some(tokio::spawn(async move { broker.listen(&contexts).await }));
        info!("Bus runtime started");
    }

    /// Stop the listener, letting it drain for at most `grace`.
    ///
    /// The grace period covers enqueuing the stop sentinel, the listener
    /// draining the queue, and outstanding error reports. Returns the number
    /// of events the listener processed, or `None` if it was never started,
    /// panicked or had to be aborted.
    pub async fn shutdown(&mut self, grace: Duration) -> Option<u64> {
        info!("Initiating graceful shutdown...");
        let mut listener = self.listener.take()?;
        let deadline = Instant::now() + grace;

        let drained = tokio::time::timeout(grace, async {
            self.broker.stop().await;
            (&mut listener).await
        })
        .await;

        let processed = match drained {
            Ok(Ok(processed)) => Some(processed),
            Ok(Err(e)) => {
                error!(error = %e, "Listener task failed");
                None
            }
            Err(_) => {
                listener.abort();
                warn!(grace_secs = grace.as_secs(), "Listener did not drain in time, aborted");
                None
            }
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        if !self.broker.drain_reports(remaining).await {
            warn!("Some error reports were not recorded before shutdown");
        }

        info!(?processed, "Shutdown complete");
        processed
    }
}

impl std::fmt::Debug for BusRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusRuntime")
            .field("broker", &self.broker)
            .field("running", &self.is_running())
            .finish()
    }
}
