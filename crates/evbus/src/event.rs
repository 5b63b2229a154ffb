//! # Event Envelope
//!
//! Defines the unit of work flowing through the broker and the priority keys
//! used to order it on the bus.
//!
//! ## Priority Scheme
//!
//! - Normal events get a random negative priority derived from a v4 UUID.
//!   Concurrent producers never contend on a shared counter.
//! - `STOP_PRIORITY` (`i64::MAX`) is reserved for the stop sentinel so it
//!   always sorts after every normal event.

use uuid::Uuid;

/// Profile used when a producer does not name one.
pub const DEFAULT_PROFILE: &str = "default";

/// Queue ordering key. Lower values are dequeued first.
pub type Priority = i64;

/// Reserved priority of the stop sentinel.
///
/// Every priority produced by [`random_priority`] is strictly below it, and
/// explicit priorities at or above it are rejected.
pub const STOP_PRIORITY: Priority = Priority::MAX;

/// Generate a random priority in `[i64::MIN, -1]`.
#[must_use]
pub fn random_priority() -> Priority {
    let bits = (Uuid::new_v4().as_u128() as u64) >> 1;
    // bits <= i64::MAX, so the result never overflows and is always negative
    -(bits as i64) - 1
}

/// An immutable envelope pairing a serialized payload with a routing profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Credential/routing context this event is associated with.
    profile: String,

    /// Serialized payload. The broker never inspects it.
    body: Vec<u8>,
}

impl Event {
    /// Create a new event.
    #[must_use]
    pub fn new(profile: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            profile: profile.into(),
            body,
        }
    }

    /// Profile name the event was tagged with.
    #[must_use]
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Serialized payload.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the event, returning its payload.
    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}
