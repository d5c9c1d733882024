//! Rule set cache
//!
//! Keyed by `<ruleSetName>#<pathPrefix>`. Entries are shared slices, so two lookups of the
//! same key between invalidations return the same allocation.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::types::Rule;

/// Cached rule sets
#[derive(Debug, Default)]
pub struct RuleCache {
    entries: DashMap<String, Arc<[Rule]>>,
}

impl RuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached rule set for `key`, built by `factory` on a miss
    pub fn get(&self, key: &str, factory: impl FnOnce() -> Vec<Rule>) -> Arc<[Rule]> {
        if let Some(rules) = self.entries.get(key) {
            return Arc::clone(rules.value());
        }
        let entry = self.entries.entry(key.to_string()).or_insert_with(|| {
            debug!(key, "Building rule set");
            factory().into()
        });
        Arc::clone(entry.value())
    }

    /// Drop every cached rule set
    pub fn invalidate(&self) {
        let count = self.entries.len();
        self.entries.clear();
        debug!(count, "Rule cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache key of a rule set for a path prefix
pub fn cache_key(rule_set: &str, path_prefix: &str) -> String {
    format!("{rule_set}#{path_prefix}")
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::types::RuleOperator;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn build(counter: &AtomicUsize) -> Vec<Rule> {
        counter.fetch_add(1, Ordering::SeqCst);
        vec![Rule::new("r", "pmfm.id", RuleOperator::NotEqual, "1").with_message("m")]
    }

    #[test]
    fn test_get_builds_once() {
        let cache = RuleCache::new();
        let built = AtomicUsize::new(0);

        let first = cache.get("set#pmfm.", || build(&built));
        let second = cache.get("set#pmfm.", || build(&built));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_rebuilds() {
        let cache = RuleCache::new();
        let built = AtomicUsize::new(0);

        let first = cache.get("set#", || build(&built));
        cache.invalidate();
        assert!(cache.is_empty());
        let second = cache.get("set#", || build(&built));

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key("notLandingPmfms", "pmfm."), "notLandingPmfms#pmfm.");
    }
}
