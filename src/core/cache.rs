//! Lock-free holder for the current snapshot.

use crate::core::Snapshot;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Holds zero or one current [`Snapshot`], replaceable atomically.
///
/// Readers load the current snapshot without taking a lock and never observe
/// a partially replaced one. The cache starts empty and, once populated, is
/// never emptied again: the only write operation is a wholesale replacement.
///
/// # Examples
///
/// ```rust
/// use periodic_config::core::{Snapshot, SnapshotCache};
///
/// let cache = SnapshotCache::new();
/// assert_eq!(cache.get("a"), None);
///
/// cache.set([("a", "1")].into_iter().collect::<Snapshot>());
/// assert_eq!(cache.get("a").as_deref(), Some("1"));
/// ```
#[derive(Debug, Default)]
pub struct SnapshotCache {
    current: ArcSwapOption<Snapshot>,
}

impl SnapshotCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }

    /// Read a single value from the current snapshot.
    ///
    /// Returns `None` before the first successful fetch, for absent keys, and
    /// for keys present without a value.
    pub fn get(&self, key: &str) -> Option<String> {
        let guard = self.current.load();
        match &*guard {
            Some(snapshot) => snapshot.get(key).map(str::to_owned),
            None => None,
        }
    }

    /// Get a reference-counted handle to the current snapshot, if any.
    ///
    /// Use this to read several keys from the same snapshot.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    /// Whether a snapshot has been stored yet.
    pub fn is_populated(&self) -> bool {
        self.current.load().is_some()
    }

    /// Replace the current snapshot wholesale.
    pub fn set(&self, snapshot: Snapshot) {
        self.current.store(Some(Arc::new(snapshot)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_until_set() {
        let cache = SnapshotCache::new();
        assert!(!cache.is_populated());
        assert!(cache.current().is_none());

        cache.set([("a", "1")].into_iter().collect());
        assert!(cache.is_populated());
        assert_eq!(cache.get("a"), Some("1".to_string()));
    }

    #[test]
    fn test_set_replaces_wholesale() {
        let cache = SnapshotCache::new();
        cache.set([("a", "1"), ("b", "2")].into_iter().collect());
        cache.set([("a", "3")].into_iter().collect());

        assert_eq!(cache.get("a"), Some("3".to_string()));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn test_held_snapshot_survives_swap() {
        let cache = SnapshotCache::new();
        cache.set([("a", "1")].into_iter().collect());

        let held = cache.current().unwrap();
        cache.set([("a", "2")].into_iter().collect());

        assert_eq!(held.get("a"), Some("1"));
        assert_eq!(cache.get("a"), Some("2".to_string()));
    }
}
