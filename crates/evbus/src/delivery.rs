//! # Delivery Outcomes and Error Reporting
//!
//! Each fan-out task yields a [`DeliveryOutcome`]. Failed outcomes are
//! logged and, when an [`ErrorCallback`] is configured, turned into an
//! [`ErrorReport`] and handed to it on a separate task.
//!
//! ## Failure Containment
//!
//! ```text
//! Scheduled → Running → Succeeded
//!                    └→ Failed ──(callback configured)──→ ErrorReported
//! ```
//!
//! The callback runs under a timeout. Its errors, panics and timeouts are
//! logged and go no further. The broker keeps the report tasks in a
//! `JoinSet` so shutdown can wait for them (`Broker::drain_reports`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::DeliveryError;
use crate::ingress::DeliveryContext;

/// Result of one delivery task.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    /// Plugin the event was delivered to.
    pub plugin: String,
    /// Profile of the event.
    pub profile: String,
    /// `Err` if `publish` failed, panicked or was cancelled.
    pub result: Result<(), Arc<DeliveryError>>,
}

impl DeliveryOutcome {
    /// Whether the delivery succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Aggregate of one `propagate` call. Informational only.
#[derive(Debug, Clone, Default)]
pub struct PropagationSummary {
    /// Every scheduled delivery, in scheduling order.
    pub outcomes: Vec<DeliveryOutcome>,
}

impl PropagationSummary {
    /// Number of successful deliveries.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of failed deliveries.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }

    /// Number of scheduled deliveries.
    #[must_use]
    pub fn scheduled(&self) -> usize {
        self.outcomes.len()
    }
}

/// Structured payload handed to the error callback.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// The failure.
    pub exception: Arc<DeliveryError>,
    /// Plugin whose delivery failed.
    pub plugin: String,
    /// Profile of the triggering event.
    pub profile: String,
    /// Body of the triggering event.
    pub body: Vec<u8>,
    /// Context the failed delivery was given.
    pub context: DeliveryContext,
}

impl ErrorReport {
    /// Render as `{exception, plugin, profile, body, context}`.
    ///
    /// The body is decoded as lossy UTF-8.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "exception": self.exception.to_string(),
            "plugin": self.plugin,
            "profile": self.profile,
            "body": String::from_utf8_lossy(&self.body),
            "context": self.context,
        })
    }
}

/// External hook notified of failed deliveries.
#[async_trait]
pub trait ErrorCallback: Send + Sync {
    /// Handle one failure report.
    ///
    /// # Errors
    ///
    /// Errors are logged by the broker and otherwise ignored.
    async fn on_error(&self, report: ErrorReport) -> anyhow::Result<()>;
}

/// Error callback that forwards reports onto a channel.
pub struct ChannelErrorCallback {
    sender: mpsc::UnboundedSender<ErrorReport>,
}

impl ChannelErrorCallback {
    /// Create the callback and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ErrorReport>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ErrorCallback for ChannelErrorCallback {
    async fn on_error(&self, report: ErrorReport) -> anyhow::Result<()> {
        self.sender
            .send(report)
            .map_err(|_| anyhow::anyhow!("error report receiver dropped"))
    }
}

/// Run the callback for one report under `timeout`.
///
/// The callback itself runs on a nested task so a panic inside it is
/// contained. Errors, panics and timeouts are logged; nothing is returned.
pub async fn report_failure(
    callback: Arc<dyn ErrorCallback>,
    report: ErrorReport,
    timeout: Duration,
) {
    let plugin = report.plugin.clone();
    let profile = report.profile.clone();
    let mut inner = tokio::spawn(async move { callback.on_error(report).await });

    match tokio::time::timeout(timeout, &mut inner).await {
        Ok(Ok(Ok(()))) => {
            debug!(plugin = %plugin, profile = %profile, "Error report delivered to callback");
        }
        Ok(Ok(Err(e))) => {
            error!(plugin = %plugin, profile = %profile, error = %e, "Error callback failed");
        }
        Ok(Err(join_err)) => {
            error!(
                plugin = %plugin,
                profile = %profile,
                error = %join_err,
                "Error callback panicked"
            );
        }
        Err(_) => {
            inner.abort();
            error!(
                plugin = %plugin,
                profile = %profile,
                timeout_ms = timeout.as_millis() as u64,
                "Error callback timed out"
            );
        }
    }
}
