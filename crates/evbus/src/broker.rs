//! # Broker
//!
//! Owns the bus and the plugin registries, and fans events out to ingress
//! plugins.
//!
//! ## Flow
//!
//! ```text
//!  producer ──put / put_nowait──→ EventQueue ──get──→ listen ──propagate──┐
//!                                                                         │
//!              ┌──────────────────────────┬──────────────────────────────┘
//!              ↓                          ↓
//!        ingress "a" publish        ingress "b" publish      (concurrent tasks)
//!              │                          │
//!              └───── failures ──→ log + ErrorCallback (own task, timeout)
//! ```
//!
//! ## Failure Semantics
//!
//! | Failure | Handling |
//! |---------|----------|
//! | Serialization on `put` | Returned to the producer, nothing enqueued |
//! | Ingress with empty ACCT | `BrokerError::Configuration`, before any delivery |
//! | Provider missing from contexts | Zero matches |
//! | `publish` error / panic | Logged, reported, never returned |

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::contexts::Contexts;
use crate::delivery::{
    report_failure, DeliveryOutcome, ErrorCallback, ErrorReport, PropagationSummary,
};
use crate::error::{BrokerError, BrokerResult, DeliveryError};
use crate::event::{Event, Priority, STOP_PRIORITY};
use crate::ingress::{DeliveryContext, IngressPlugin};
use crate::matcher::{ExactMatcher, GlobMatcher, Matcher, RegexMatcher, DEFAULT_MATCHER};
use crate::queue::{Entry, EventQueue};
use crate::registry::PluginRegistry;
use crate::serial::{to_document, BincodeSerializer, JsonSerializer, Serializer, DEFAULT_SERIALIZER};

/// Default bound on how long an error callback may run.
pub const DEFAULT_ERROR_CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Codec used to serialize producer values.
    pub serializer: String,
    /// Matcher used when the contexts do not select one.
    pub match_plugin: String,
    /// Bus bound (`None` = unbounded).
    pub capacity: Option<usize>,
    /// Upper bound on a single error-callback invocation.
    pub error_callback_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            serializer: DEFAULT_SERIALIZER.to_string(),
            match_plugin: DEFAULT_MATCHER.to_string(),
            capacity: None,
            error_callback_timeout: DEFAULT_ERROR_CALLBACK_TIMEOUT,
        }
    }
}

/// In-process event broker.
///
/// Share it as `Arc<Broker>` between producers and the listener.
pub struct Broker {
    config: BrokerConfig,
    queue: EventQueue,
    serializers: PluginRegistry<dyn Serializer>,
    matchers: PluginRegistry<dyn Matcher>,
    ingress: PluginRegistry<dyn IngressPlugin>,
    error_callback: RwLock<Option<Arc<dyn ErrorCallback>>>,

    /// Error-callback invocations still running.
    reports: Mutex<JoinSet<()>>,
}

/// Aborts delivery tasks still running when `propagate` is dropped.
struct DeliveryGuard(Vec<AbortHandle>);

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        let pending = self.0.iter().filter(|h| !h.is_finished()).count();
        if pending > 0 {
            warn!(pending, "Propagation dropped, aborting in-flight deliveries");
        }
        for handle in &self.0 {
            handle.abort();
        }
    }
}

impl Broker {
    /// Create a broker with the built-in serializers and matchers registered.
    #[must_use]
    pub fn new(config: BrokerConfig) -> Self {
        let serializers: PluginRegistry<dyn Serializer> = PluginRegistry::new("serializer");
        serializers.register("json", Arc::new(JsonSerializer));
        serializers.register("bincode", Arc::new(BincodeSerializer));

        let matchers: PluginRegistry<dyn Matcher> = PluginRegistry::new("matcher");
        matchers.register("glob", Arc::new(GlobMatcher::new()));
        matchers.register("regex", Arc::new(RegexMatcher::new()));
        matchers.register("exact", Arc::new(ExactMatcher));

        Self {
            queue: EventQueue::with_capacity(config.capacity),
            config,
            serializers,
            matchers,
            ingress: PluginRegistry::new("ingress"),
            error_callback: RwLock::new(None),
            reports: Mutex::new(JoinSet::new()),
        }
    }

    // =========================================================================
    // PLUGINS
    // =========================================================================

    /// Register an ingress plugin under its own name.
    pub fn register_ingress(&self, plugin: Arc<dyn IngressPlugin>) {
        let name = plugin.name().to_string();
        if self.ingress.register(name.clone(), plugin).is_some() {
            info!(plugin = %name, "Replaced ingress plugin");
        }
    }

    /// Remove an ingress plugin. In-flight `propagate` calls are unaffected.
    pub fn unregister_ingress(&self, name: &str) -> Option<Arc<dyn IngressPlugin>> {
        self.ingress.unregister(name)
    }

    /// Install the hook notified of failed deliveries.
    pub fn set_error_callback(&self, callback: Arc<dyn ErrorCallback>) {
        *self.error_callback.write() = Some(callback);
    }

    /// Remove the error hook; failures are then only logged.
    pub fn clear_error_callback(&self) {
        *self.error_callback.write() = None;
    }

    /// Serializer registry.
    #[must_use]
    pub fn serializers(&self) -> &PluginRegistry<dyn Serializer> {
        &self.serializers
    }

    /// Matcher registry.
    #[must_use]
    pub fn matchers(&self) -> &PluginRegistry<dyn Matcher> {
        &self.matchers
    }

    /// Ingress registry.
    #[must_use]
    pub fn ingress(&self) -> &PluginRegistry<dyn IngressPlugin> {
        &self.ingress
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    // =========================================================================
    // PRODUCER SIDE
    // =========================================================================

    /// Serialize `body` and enqueue it without suspending.
    ///
    /// Works before any runtime exists: until [`init`](Self::init) runs the
    /// event sits in the FIFO bootstrap queue without a priority.
    ///
    /// # Errors
    ///
    /// - `BrokerError::Serialization` if `body` cannot be encoded
    /// - `BrokerError::PluginNotFound` if the configured codec is missing
    /// - `BrokerError::QueueFull` if the bus is bounded and full
    pub fn put_nowait<T: Serialize + ?Sized>(&self, body: &T, profile: &str) -> BrokerResult<()> {
        let event = self.serialize(body, profile)?;
        let size = event.body().len();
        self.queue.push_event_nowait(event)?;
        debug!(profile, size, "Event enqueued");
        Ok(())
    }

    /// Serialize `body` and enqueue it with a random priority.
    ///
    /// Upgrades the bus first. Waits for capacity on a bounded bus.
    ///
    /// # Errors
    ///
    /// `BrokerError::Serialization` or `BrokerError::PluginNotFound`; nothing
    /// is enqueued in either case.
    pub async fn put<T: Serialize + ?Sized>(&self, body: &T, profile: &str) -> BrokerResult<()> {
        self.init().await;
        let event = self.serialize(body, profile)?;
        let entry = Entry::random(event);
        let priority = entry.priority();
        self.queue.push(entry).await;
        debug!(profile, priority, "Event enqueued");
        Ok(())
    }

    /// Enqueue with an explicit priority. Lower values are dequeued first.
    ///
    /// # Errors
    ///
    /// `BrokerError::ReservedPriority` for `priority >= STOP_PRIORITY`, plus
    /// the errors of [`put`](Self::put).
    pub async fn put_with_priority<T: Serialize + ?Sized>(
        &self,
        body: &T,
        profile: &str,
        priority: Priority,
    ) -> BrokerResult<()> {
        if priority >= STOP_PRIORITY {
            return Err(BrokerError::ReservedPriority { priority });
        }
        self.init().await;
        let event = self.serialize(body, profile)?;
        self.queue.push(Entry::new(priority, event)).await;
        debug!(profile, priority, "Event enqueued");
        Ok(())
    }

    /// Enqueue the stop sentinel without suspending.
    ///
    /// The listener drains every normal event before it sees the sentinel.
    ///
    /// # Errors
    ///
    /// `BrokerError::QueueFull` if the bus is bounded and full.
    pub fn stop_nowait(&self) -> BrokerResult<()> {
        self.queue.push_nowait(Entry::stop())?;
        info!("Stop sentinel enqueued");
        Ok(())
    }

    /// Enqueue the stop sentinel, waiting for capacity if needed.
    pub async fn stop(&self) {
        self.queue.push(Entry::stop()).await;
        info!("Stop sentinel enqueued");
    }

    fn serialize<T: Serialize + ?Sized>(&self, body: &T, profile: &str) -> BrokerResult<Event> {
        let serializer = self.serializers.get(&self.config.serializer)?;
        let document = to_document(body)?;
        let bytes = serializer.dump(&document)?;
        Ok(Event::new(profile, bytes))
    }

    // =========================================================================
    // CONSUMER SIDE
    // =========================================================================

    /// Upgrade the bus to its async priority phase. Idempotent.
    pub async fn init(&self) -> &EventQueue {
        self.queue.ensure_async();
        &self.queue
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the stop sentinel is dequeued. Cancel-safe.
    pub async fn get(&self) -> Option<Event> {
        self.init().await.pop().await.into_event()
    }

    /// The bus itself.
    #[must_use]
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Consume events until the stop sentinel, propagating each one.
    ///
    /// Configuration errors abort only the event that hit them. Returns the
    /// number of events processed.
    pub async fn listen(&self, contexts: &Contexts) -> u64 {
        info!(ingress = self.ingress.len(), "Broker listener started");
        let mut processed = 0u64;

        while let Some(event) = self.get().await {
            processed += 1;
            let profile = event.profile().to_string();
            match self.propagate(contexts, event).await {
                Ok(summary) => debug!(
                    profile = %profile,
                    scheduled = summary.scheduled(),
                    failed = summary.failed(),
                    "Event propagated"
                ),
                Err(e) => error!(profile = %profile, error = %e, "Propagation aborted"),
            }
        }

        info!(processed, "Broker listener stopped");
        processed
    }

    /// Wait for error-callback invocations still in flight.
    ///
    /// Returns `false` if some were still running after `deadline`; those
    /// are aborted.
    pub async fn drain_reports(&self, deadline: Duration) -> bool {
        let mut reports = std::mem::take(&mut *self.reports.lock());
        if reports.is_empty() {
            return true;
        }

        let pending = reports.len();
        let drained = tokio::time::timeout(deadline, async {
            while reports.join_next().await.is_some() {}
        })
        .await;

        match drained {
            Ok(()) => {
                debug!(pending, "Error reports drained");
                true
            }
            Err(_) => {
                warn!(
                    remaining = reports.len(),
                    "Error reports still running at deadline, aborting"
                );
                reports.abort_all();
                false
            }
        }
    }

    // =========================================================================
    // FAN-OUT
    // =========================================================================

    /// Deliver `event` to every ingress plugin whose credentials match its
    /// profile, concurrently.
    ///
    /// The ingress registry is snapshotted on entry. Returns once every
    /// delivery finished; individual failures are logged, reported to the
    /// error callback and summarized, never returned.
    ///
    /// # Errors
    ///
    /// - `BrokerError::Configuration` if a plugin declares no providers
    /// - `BrokerError::PluginNotFound` if the selected matcher is missing
    ///
    /// Both are raised before any delivery starts.
    pub async fn propagate(
        &self,
        contexts: &Contexts,
        event: Event,
    ) -> BrokerResult<PropagationSummary> {
        let match_plugin = contexts
            .match_plugin()
            .unwrap_or(self.config.match_plugin.as_str());
        let matcher = self.matchers.get(match_plugin)?;
        let plugins = self.ingress.snapshot();

        // Resolve every delivery first so configuration errors abort cleanly
        let mut plan = Vec::new();
        for (name, plugin) in &plugins {
            let providers = plugin.acct();
            if providers.is_empty() {
                return Err(BrokerError::Configuration {
                    plugin: name.clone(),
                });
            }
            for provider in &providers {
                for (pattern, credential) in contexts.credentials(provider) {
                    if matcher.find(event.profile(), pattern) {
                        plan.push((
                            name.clone(),
                            Arc::clone(plugin),
                            DeliveryContext::new(credential.clone()),
                        ));
                    }
                }
            }
        }

        let event = Arc::new(event);
        let tasks: Vec<_> = plan
            .into_iter()
            .map(|(name, plugin, ctx)| {
                let event = Arc::clone(&event);
                let task_ctx = ctx.clone();
                let handle =
                    tokio::spawn(async move { plugin.publish(&task_ctx, event.body()).await });
                (name, ctx, handle)
            })
            .collect();
        let _guard = DeliveryGuard(tasks.iter().map(|(_, _, h)| h.abort_handle()).collect());

        debug!(
            profile = event.profile(),
            scheduled = tasks.len(),
            "Deliveries scheduled"
        );

        let callback = self.error_callback.read().clone();
        let mut summary = PropagationSummary::default();

        for (plugin, ctx, handle) in tasks {
            let profile = event.profile().to_string();
            let result = match handle.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(error)) => Err(DeliveryError::Publish {
                    plugin: plugin.clone(),
                    profile: profile.clone(),
                    error,
                }),
                Err(join_err) if join_err.is_panic() => Err(DeliveryError::Panicked {
                    plugin: plugin.clone(),
                    profile: profile.clone(),
                }),
                Err(_) => Err(DeliveryError::Cancelled {
                    plugin: plugin.clone(),
                    profile: profile.clone(),
                }),
            };

            let result = result.map_err(Arc::new);
            if let Err(err) = &result {
                error!(plugin = %plugin, profile = %profile, error = %err, "Delivery failed");
                if let Some(callback) = &callback {
                    let report = ErrorReport {
                        exception: Arc::clone(err),
                        plugin: plugin.clone(),
                        profile: profile.clone(),
                        body: event.body().to_vec(),
                        context: ctx,
                    };
                    let mut reports = self.reports.lock();
                    while reports.try_join_next().is_some() {}
                    reports.spawn(report_failure(
                        Arc::clone(callback),
                        report,
                        self.config.error_callback_timeout,
                    ));
                }
            }

            summary.outcomes.push(DeliveryOutcome {
                plugin,
                profile,
                result,
            });
        }

        Ok(summary)
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("config", &self.config)
            .field("queued", &self.queue.len())
            .field("ingress", &self.ingress.names())
            .finish()
    }
}
