//! Line-oriented producer feeding the broker from a reader.
//!
//! Each line is a JSON document. An object of the form
//! `{"profile": "...", "body": ...}` selects the profile; any other value is
//! published as-is under the default profile.

use evbus::{Broker, DEFAULT_PROFILE};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Split one input line into `(profile, body)`.
///
/// Returns `None` for blank lines.
///
/// # Errors
///
/// The JSON parse error for malformed lines.
pub fn parse_line(line: &str) -> Result<Option<(String, Value)>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line)?;
    let parsed = match value {
        Value::Object(mut map) if map.contains_key("body") => {
            let profile = match map.remove("profile") {
                Some(Value::String(profile)) => profile,
                _ => DEFAULT_PROFILE.to_string(),
            };
            let body = map.remove("body").unwrap_or(Value::Null);
            (profile, body)
        }
        other => (DEFAULT_PROFILE.to_string(), other),
    };
    Ok(Some(parsed))
}

/// Publish every line of `reader` until EOF.
///
/// Malformed lines and rejected events are logged and skipped. Returns the
/// number of events enqueued.
///
/// # Errors
///
/// I/O errors from the reader.
pub async fn produce_from<R>(broker: &Broker, reader: R) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut produced = 0u64;
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let (profile, body) = match parse_line(&line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed input line");
                continue;
            }
        };

        match broker.put(&body, &profile).await {
            Ok(()) => {
                produced += 1;
                debug!(line = line_no, profile = %profile, "Event enqueued");
            }
            Err(e) => warn!(line = line_no, profile = %profile, error = %e, "Event rejected"),
        }
    }

    Ok(produced)
}
