//! Index Manager - shared ownership of named time indexes
//!
//! Several consumers (a histogram, a table, a timeline) usually look at the
//! same record set through the same filters. The manager hands out one
//! `TimeIndex` per id and counts who holds it:
//!
//! ```text
//! acquire("events") ──► create + refcount 1
//! acquire("events") ──► same index, refcount 2
//! release("events") ──► refcount 1
//! release("events") ──► refcount 0 → dispose + forget
//! ```

use crate::index::{IndexStats, TimeIndex};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Configuration for indexes created by the manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Insert timeless records into the holds partition
    #[serde(default)]
    pub holds_active: bool,

    /// Records added per `add` call during bulk loads
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Result limit used when a query names none
    #[serde(default)]
    pub default_limit: Option<usize>,
}

fn default_batch_size() -> usize {
    10_000
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            holds_active: false,
            batch_size: default_batch_size(),
            default_limit: None,
        }
    }
}

/// A time index shared between consumers
pub type SharedTimeIndex<T> = Rc<RefCell<TimeIndex<T>>>;

struct Entry<T> {
    index: SharedTimeIndex<T>,
    refs: usize,
}

/// Reference-counted registry of time indexes
pub struct IndexManager<T> {
    entries: BTreeMap<String, Entry<T>>,
    config: IndexConfig,
}

impl<T> IndexManager<T> {
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(config: IndexConfig) -> Self {
        Self {
            entries: BTreeMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Get the index registered under `id`, creating it with `create` on
    /// first use, and take a reference to it
    ///
    /// Newly created indexes are named after `id` and receive the manager's
    /// configuration.
    pub fn acquire(
        &mut self,
        id: &str,
        create: impl FnOnce() -> TimeIndex<T>,
    ) -> SharedTimeIndex<T> {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.refs += 1;
            tracing::debug!(index = id, refs = entry.refs, "Acquired index");
            return Rc::clone(&entry.index);
        }

        let index = create().with_name(id).with_config(&self.config);
        let index = Rc::new(RefCell::new(index));
        self.entries.insert(
            id.to_string(),
            Entry {
                index: Rc::clone(&index),
                refs: 1,
            },
        );
        tracing::debug!(index = id, "Created index");
        index
    }

    /// Drop one reference; the last release disposes the index
    ///
    /// Returns true when the index was disposed.
    pub fn release(&mut self, id: &str) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            tracing::warn!(index = id, "Cannot release unknown index");
            return false;
        };

        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            tracing::debug!(index = id, refs = entry.refs, "Released index");
            return false;
        }

        if let Some(entry) = self.entries.remove(id) {
            entry.index.borrow_mut().dispose();
        }
        tracing::debug!(index = id, "Disposed index");
        true
    }

    /// Get an index without taking a reference
    pub fn get(&self, id: &str) -> Option<SharedTimeIndex<T>> {
        self.entries.get(id).map(|e| Rc::clone(&e.index))
    }

    pub fn ref_count(&self, id: &str) -> usize {
        self.entries.get(id).map(|e| e.refs).unwrap_or(0)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Statistics for every registered index
    pub fn stats(&self) -> Vec<(String, IndexStats)> {
        self.entries
            .iter()
            .map(|(id, e)| (id.clone(), e.index.borrow().stats()))
            .collect()
    }

    /// Dispose every index regardless of outstanding references
    pub fn dispose_all(&mut self) {
        for (id, entry) in std::mem::take(&mut self.entries) {
            entry.index.borrow_mut().dispose();
            tracing::debug!(index = %id, "Disposed index");
        }
    }
}

impl<T> Default for IndexManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Interval;

    fn create_index() -> TimeIndex<i64> {
        TimeIndex::new(|t: &i64| Some(Interval::instant(*t)))
    }

    #[test]
    fn test_acquire_shares_index() {
        let mut manager = IndexManager::new();

        let a = manager.acquire("events", create_index);
        a.borrow_mut().add(vec![1, 2, 3]);

        let b = manager.acquire("events", || panic!("index should be reused"));
        assert_eq!(b.borrow().len(), 3);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(manager.ref_count("events"), 2);
    }

    #[test]
    fn test_last_release_disposes() {
        let mut manager = IndexManager::new();
        let index = manager.acquire("events", create_index);
        manager.acquire("events", create_index);

        assert!(!manager.release("events"));
        assert!(!index.borrow().is_disposed());

        assert!(manager.release("events"));
        assert!(index.borrow().is_disposed());
        assert!(manager.get("events").is_none());
        assert!(!manager.release("events"));
    }

    #[test]
    fn test_config_applied_to_new_indexes() {
        let config = IndexConfig {
            holds_active: true,
            ..IndexConfig::default()
        };
        let mut manager = IndexManager::with_config(config);

        let index = manager.acquire("held", || {
            TimeIndex::new(|_: &i64| None).with_hold_time_fn(|_| None)
        });
        index.borrow_mut().add(vec![1, 2]);

        assert!(index.borrow().holds_active());
        assert_eq!(index.borrow().holds_len(), 2);
    }

    #[test]
    fn test_stats_and_dispose_all() {
        let mut manager = IndexManager::new();
        manager.acquire("b", create_index).borrow_mut().add(vec![1]);
        let a = manager.acquire("a", create_index);

        assert_eq!(manager.ids(), vec!["a", "b"]);
        let stats = manager.stats();
        assert_eq!(stats[1].1.records, 1);

        manager.dispose_all();
        assert!(manager.ids().is_empty());
        assert!(a.borrow().is_disposed());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: IndexConfig = toml::from_str("holds_active = true").unwrap();
        assert!(config.holds_active);
        assert_eq!(config.batch_size, 10_000);
        assert_eq!(config.default_limit, None);
    }
}
