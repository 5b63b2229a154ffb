//! # Credential Contexts
//!
//! External configuration read by `propagate` to decide who receives what.
//!
//! ```json
//! {
//!   "match_plugin": "glob",
//!   "p1": { "default": [ { "prod-*": { "token": "..." } } ] }
//! }
//! ```
//!
//! Every key other than `match_plugin` names a credential provider. Each
//! provider maps profile names to lists of `{pattern: credential}` entries;
//! the pattern is matched against the event's profile.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{pattern: credential}` entries, usually with a single key.
pub type CredentialSet = BTreeMap<String, Value>;

/// Profile name to credential sets for one provider.
pub type ProviderProfiles = BTreeMap<String, Vec<CredentialSet>>;

/// Credential contexts supplied to `propagate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contexts {
    /// Matcher to use instead of the broker default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_plugin: Option<String>,

    /// Provider name to its configured profiles.
    #[serde(flatten)]
    pub providers: BTreeMap<String, ProviderProfiles>,
}

impl Contexts {
    /// Empty contexts: nothing matches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a matcher by name.
    #[must_use]
    pub fn with_match_plugin(mut self, name: impl Into<String>) -> Self {
        self.match_plugin = Some(name.into());
        self
    }

    /// Add a `{pattern: credential}` entry under `provider` / `profile_name`.
    #[must_use]
    pub fn with_profile(
        mut self,
        provider: impl Into<String>,
        profile_name: impl Into<String>,
        pattern: impl Into<String>,
        credential: Value,
    ) -> Self {
        let mut set = CredentialSet::new();
        set.insert(pattern.into(), credential);
        self.providers
            .entry(provider.into())
            .or_default()
            .entry(profile_name.into())
            .or_default()
            .push(set);
        self
    }

    /// Configured matcher name, if any.
    #[must_use]
    pub fn match_plugin(&self) -> Option<&str> {
        self.match_plugin.as_deref()
    }

    /// Profiles of one provider; `None` when the provider is not configured.
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&ProviderProfiles> {
        self.providers.get(name)
    }

    /// Every `(pattern, credential)` pair configured under `provider`.
    ///
    /// Yields nothing when the provider is absent.
    pub fn credentials<'a>(&'a self, provider: &str) -> impl Iterator<Item = (&'a str, &'a Value)> {
        self.provider(provider)
            .into_iter()
            .flat_map(|profiles| profiles.values())
            .flatten()
            .flat_map(|set| set.iter().map(|(pattern, cred)| (pattern.as_str(), cred)))
    }
}
