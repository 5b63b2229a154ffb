//! # evbus - In-Memory Event Broker
//!
//! A single-process broker that queues profile-tagged events and fans each
//! one out to the ingress plugins whose credentials match its profile.
//!
//! ## Components
//!
//! ```text
//! ┌──────────────┐   put / put_nowait   ┌──────────────┐   get    ┌──────────────┐
//! │  Producers   │ ───────────────────→ │  EventQueue  │ ───────→ │  propagate   │
//! └──────────────┘                      │ (priority)   │          │  (fan-out)   │
//!                                       └──────────────┘          └──────┬───────┘
//!                                                                        │ publish
//!                                                          ┌─────────────┼─────────────┐
//!                                                          ↓             ↓             ↓
//!                                                      ingress a     ingress b     ingress c
//! ```
//!
//! - **Event queue:** sync FIFO until [`Broker::init`], then a priority heap.
//!   Random negative priorities break ties; `STOP_PRIORITY` is reserved for
//!   the stop sentinel.
//! - **Plugins:** serializers, matchers and ingress plugins live in typed
//!   registries and are looked up by name.
//! - **Failure isolation:** one failing subscriber never affects the others
//!   or the caller of `propagate`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use evbus::{Broker, BrokerConfig, Contexts, InternalIngress};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), evbus::BrokerError> {
//! let broker = Arc::new(Broker::new(BrokerConfig::default()));
//! let (ingress, mut deliveries) = InternalIngress::new("internal", vec!["p1".into()]);
//! broker.register_ingress(Arc::new(ingress));
//!
//! let contexts = Contexts::new().with_profile("p1", "default", "prod-*", json!({"token": "t"}));
//!
//! broker.put(&json!({"x": 1}), "prod-eu-1").await?;
//! if let Some(event) = broker.get().await {
//!     broker.propagate(&contexts, event).await?;
//! }
//! assert!(deliveries.recv().await.is_some());
//! # Ok(())
//! # }
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod broker;
pub mod contexts;
pub mod delivery;
pub mod error;
pub mod event;
pub mod ingress;
pub mod matcher;
pub mod queue;
pub mod registry;
pub mod serial;

// Re-export main types
pub use broker::{Broker, BrokerConfig, DEFAULT_ERROR_CALLBACK_TIMEOUT};
pub use contexts::{Contexts, CredentialSet, ProviderProfiles};
pub use delivery::{
    ChannelErrorCallback, DeliveryOutcome, ErrorCallback, ErrorReport, PropagationSummary,
};
pub use error::{BrokerError, BrokerResult, DeliveryError, SerializationError};
pub use event::{random_priority, Event, Priority, DEFAULT_PROFILE, STOP_PRIORITY};
pub use ingress::{Delivered, DeliveryContext, IngressPlugin, InternalIngress};
pub use matcher::{ExactMatcher, GlobMatcher, Matcher, RegexMatcher, DEFAULT_MATCHER};
pub use queue::{Entry, EventQueue, Slot};
pub use registry::PluginRegistry;
pub use serial::{BincodeSerializer, JsonSerializer, Serializer, DEFAULT_SERIALIZER};
