//! # Matching Plugins
//!
//! Answer "does the observed profile satisfy this configured pattern".
//!
//! | Name | Semantics |
//! |------|-----------|
//! | `glob` | Shell-style wildcards (`*`, `?`, `[..]`, `{a,b}`). Default. |
//! | `regex` | Full-match regular expression. |
//! | `exact` | Plain string equality. |
//!
//! Invalid patterns never match. Compiled patterns are cached per matcher.

use std::collections::HashMap;

use globset::{Glob, GlobMatcher as CompiledGlob};
use parking_lot::RwLock;
use regex::Regex;
use tracing::warn;

/// Name of the default matcher.
pub const DEFAULT_MATCHER: &str = "glob";

/// A named pattern-matching strategy.
pub trait Matcher: Send + Sync {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Whether `name` satisfies `pattern`.
    fn find(&self, name: &str, pattern: &str) -> bool;
}

/// Cache of compiled patterns. `None` marks a pattern that failed to compile.
struct PatternCache<P> {
    compiled: RwLock<HashMap<String, Option<P>>>,
}

impl<P: Clone> PatternCache<P> {
    fn new() -> Self {
        Self {
            compiled: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile<E: std::fmt::Display>(
        &self,
        matcher: &'static str,
        pattern: &str,
        compile: impl FnOnce(&str) -> Result<P, E>,
    ) -> Option<P> {
        if let Some(cached) = self.compiled.read().get(pattern) {
            return cached.clone();
        }

        let compiled = match compile(pattern) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(matcher, pattern, error = %e, "Invalid pattern, treating as no match");
                None
            }
        };
        self.compiled
            .write()
            .insert(pattern.to_string(), compiled.clone());
        compiled
    }
}

/// Shell-style glob matching. The default matcher.
pub struct GlobMatcher {
    cache: PatternCache<CompiledGlob>,
}

impl GlobMatcher {
    /// Create a matcher with an empty pattern cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: PatternCache::new(),
        }
    }
}

impl Default for GlobMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher for GlobMatcher {
    fn name(&self) -> &'static str {
        "glob"
    }

    fn find(&self, name: &str, pattern: &str) -> bool {
        self.cache
            .get_or_compile(self.name(), pattern, |p| {
                Glob::new(p).map(|glob| glob.compile_matcher())
            })
            .is_some_and(|glob| glob.is_match(name))
    }
}

/// Regular-expression matching against the whole name.
pub struct RegexMatcher {
    cache: PatternCache<Regex>,
}

impl RegexMatcher {
    /// Create a matcher with an empty pattern cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: PatternCache::new(),
        }
    }
}

impl Default for RegexMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher for RegexMatcher {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn find(&self, name: &str, pattern: &str) -> bool {
        self.cache
            .get_or_compile(self.name(), pattern, |p| Regex::new(&format!("^(?:{p})$")))
            .is_some_and(|re| re.is_match(name))
    }
}

/// String equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl Matcher for ExactMatcher {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn find(&self, name: &str, pattern: &str) -> bool {
        name == pattern
    }
}
