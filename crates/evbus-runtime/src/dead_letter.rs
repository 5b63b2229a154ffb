//! Dead-letter file for failed deliveries.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use evbus::{ErrorCallback, ErrorReport};
use tokio::sync::Mutex;
use tracing::warn;

use crate::plugins::append_json_line;

/// Error callback that appends each report to a JSON-lines file.
#[derive(Debug)]
pub struct DeadLetterFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl DeadLetterFile {
    /// Record reports in `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Target file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ErrorCallback for DeadLetterFile {
    async fn on_error(&self, report: ErrorReport) -> anyhow::Result<()> {
        warn!(
            plugin = %report.plugin,
            profile = %report.profile,
            path = %self.path.display(),
            "Recording failed delivery"
        );

        let _guard = self.write_lock.lock().await;
        append_json_line(&self.path, &report.to_json())
            .await
            .with_context(|| format!("writing dead letter to {}", self.path.display()))
    }
}
