//! Built-in ingress plugins, constructed from `[[ingress]]` entries.

mod file;
mod log;

use std::path::Path;
use std::sync::Arc;

use evbus::IngressPlugin;
use serde_json::Value;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::config::{ConfigError, IngressConfig, IngressKind};

pub use file::FileIngress;
pub use log::LogIngress;

/// Build the plugin an `[[ingress]]` entry describes.
///
/// # Errors
///
/// `ConfigError::MissingPath` for a `file` entry without a path.
pub fn build_ingress(config: &IngressConfig) -> Result<Arc<dyn IngressPlugin>, ConfigError> {
    let plugin: Arc<dyn IngressPlugin> = match config.kind {
        IngressKind::Log => Arc::new(LogIngress::new(&config.name, config.acct.clone())),
        IngressKind::File => {
            let path = config.path.clone().ok_or_else(|| ConfigError::MissingPath {
                ingress: config.name.clone(),
            })?;
            Arc::new(FileIngress::new(&config.name, config.acct.clone(), path))
        }
    };
    Ok(plugin)
}

/// Append `value` as one line of JSON, creating the file if needed.
pub(crate) async fn append_json_line(path: &Path, value: &Value) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await
}
