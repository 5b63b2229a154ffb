//! # Ingress Plugins
//!
//! Subscribers that receive event bodies from the propagation engine.
//!
//! Every ingress plugin declares the credential providers it trusts (its
//! ACCT list). An event is delivered to a plugin once per configured
//! credential whose pattern matches the event's profile.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Per-delivery context handed to [`IngressPlugin::publish`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryContext {
    /// The matched credential profile.
    pub acct: Value,
}

impl DeliveryContext {
    /// Build a context around a matched credential.
    #[must_use]
    pub fn new(acct: Value) -> Self {
        Self { acct }
    }
}

/// A subscriber capable of publishing event bodies.
#[async_trait]
pub trait IngressPlugin: Send + Sync {
    /// Plugin name, used for logs and error reports.
    fn name(&self) -> &str;

    /// Names of the credential providers this plugin accepts.
    ///
    /// An empty list is a configuration error raised at propagate time.
    fn acct(&self) -> Vec<String>;

    /// Deliver one event body.
    ///
    /// # Errors
    ///
    /// Any error is contained by the broker: logged and reported to the
    /// error callback, never returned to the caller of `propagate`.
    async fn publish(&self, ctx: &DeliveryContext, body: &[u8]) -> anyhow::Result<()>;
}

/// A delivery captured by [`InternalIngress`].
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    /// Context the broker built for this delivery.
    pub ctx: DeliveryContext,
    /// Event body.
    pub body: Vec<u8>,
}

/// In-process ingress that forwards deliveries onto a channel.
pub struct InternalIngress {
    name: String,
    acct: Vec<String>,
    sender: mpsc::UnboundedSender<Delivered>,
}

impl InternalIngress {
    /// Create the plugin and the receiving end of its channel.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        acct: Vec<String>,
    ) -> (Self, mpsc::UnboundedReceiver<Delivered>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let plugin = Self {
            name: name.into(),
            acct,
            sender,
        };
        (plugin, receiver)
    }
}

#[async_trait]
impl IngressPlugin for InternalIngress {
    fn name(&self) -> &str {
        &self.name
    }

    fn acct(&self) -> Vec<String> {
        self.acct.clone()
    }

    async fn publish(&self, ctx: &DeliveryContext, body: &[u8]) -> anyhow::Result<()> {
        self.sender
            .send(Delivered {
                ctx: ctx.clone(),
                body: body.to_vec(),
            })
            .map_err(|_| anyhow::anyhow!("internal ingress '{}' receiver dropped", self.name))
    }
}
