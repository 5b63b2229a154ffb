//! # Plugin Registry
//!
//! Named collection of trait objects populated at startup.
//!
//! Lookups fail fast with `BrokerError::PluginNotFound` instead of resolving
//! names dynamically at call time.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{BrokerError, BrokerResult};

/// A registry of plugins of one family, keyed by name.
pub struct PluginRegistry<T: ?Sized> {
    /// Plugin family, used in errors and logs.
    kind: &'static str,

    plugins: RwLock<BTreeMap<String, Arc<T>>>,
}

impl<T: ?Sized> PluginRegistry<T> {
    /// Create an empty registry for a plugin family.
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            plugins: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a plugin, returning the one it replaced.
    pub fn register(&self, name: impl Into<String>, plugin: Arc<T>) -> Option<Arc<T>> {
        let name = name.into();
        debug!(kind = self.kind, name = %name, "Plugin registered");
        self.plugins.write().insert(name, plugin)
    }

    /// Remove a plugin by name.
    pub fn unregister(&self, name: &str) -> Option<Arc<T>> {
        let removed = self.plugins.write().remove(name);
        if removed.is_some() {
            debug!(kind = self.kind, name, "Plugin unregistered");
        }
        removed
    }

    /// Look up a plugin by name.
    ///
    /// # Errors
    ///
    /// `BrokerError::PluginNotFound` if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> BrokerResult<Arc<T>> {
        self.plugins
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BrokerError::PluginNotFound {
                kind: self.kind(),
                name: name.to_string(),
            })
    }

    /// Whether a plugin is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.read().contains_key(name)
    }

    /// Registered names in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.plugins.read().keys().cloned().collect()
    }

    /// Point-in-time copy of every plugin, in name order.
    ///
    /// Later registrations do not affect a snapshot already taken.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, Arc<T>)> {
        self.plugins
            .read()
            .iter()
            .map(|(name, plugin)| (name.clone(), Arc::clone(plugin)))
            .collect()
    }

    /// Number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.read().len()
    }

    /// Whether no plugin is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.read().is_empty()
    }

    /// Plugin family name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl<T: ?Sized> std::fmt::Debug for PluginRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("kind", &self.kind)
            .field("names", &self.names())
            .finish()
    }
}
