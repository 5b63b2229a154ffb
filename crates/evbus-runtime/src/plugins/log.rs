use async_trait::async_trait;
use evbus::{DeliveryContext, IngressPlugin};
use tracing::info;

/// Ingress that records each delivery as a log line.
#[derive(Debug, Clone)]
pub struct LogIngress {
    name: String,
    acct: Vec<String>,
}

impl LogIngress {
    /// Create a log ingress accepting the given providers.
    #[must_use]
    pub fn new(name: impl Into<String>, acct: Vec<String>) -> Self {
        Self {
            name: name.into(),
            acct,
        }
    }
}

#[async_trait]
impl IngressPlugin for LogIngress {
    fn name(&self) -> &str {
        &self.name
    }

    fn acct(&self) -> Vec<String> {
        self.acct.clone()
    }

    async fn publish(&self, ctx: &DeliveryContext, body: &[u8]) -> anyhow::Result<()> {
        info!(
            ingress = %self.name,
            acct = %ctx.acct,
            body = %String::from_utf8_lossy(body),
            "Event delivered"
        );
        Ok(())
    }
}
