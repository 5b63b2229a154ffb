use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use evbus::{DeliveryContext, IngressPlugin};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use super::append_json_line;

/// Ingress that appends each delivery to a JSON-lines file.
///
/// Line shape: `{"ingress", "acct", "body"}`. The body is embedded as JSON
/// when it parses as JSON, otherwise as a lossy UTF-8 string.
#[derive(Debug)]
pub struct FileIngress {
    name: String,
    acct: Vec<String>,
    path: PathBuf,
    // Serializes appends so concurrent deliveries never interleave lines.
    write_lock: Mutex<()>,
}

impl FileIngress {
    /// Create a file ingress writing to `path`.
    #[must_use]
    pub fn new(name: impl Into<String>, acct: Vec<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            acct,
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Target file.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl IngressPlugin for FileIngress {
    fn name(&self) -> &str {
        &self.name
    }

    fn acct(&self) -> Vec<String> {
        self.acct.clone()
    }

    async fn publish(&self, ctx: &DeliveryContext, body: &[u8]) -> anyhow::Result<()> {
        let body = serde_json::from_slice::<Value>(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));
        let line = json!({
            "ingress": self.name,
            "acct": ctx.acct,
            "body": body,
        });

        let _guard = self.write_lock.lock().await;
        append_json_line(&self.path, &line)
            .await
            .with_context(|| format!("appending to {}", self.path.display()))?;

        debug!(ingress = %self.name, path = %self.path.display(), "Event appended");
        Ok(())
    }
}
