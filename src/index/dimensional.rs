//! Dimensional Index - filterable, groupable views over one record set
//!
//! Records are added in bulk and indexed under every dimension. Each
//! dimension can be filtered independently; queries then read the records
//! that pass every filter without rescanning the set.
//!
//! # Example
//! ```
//! use timecube::index::{Count, DimensionalIndex, FilterValue, Key};
//!
//! let mut index = DimensionalIndex::new();
//! index.add_dimension("len", |s: &&str| Key::from(s.len() as i64));
//! index.add(["a", "bb", "cc", "ddd"]);
//!
//! index.filter_dimension("len", Some(FilterValue::exact(2i64)));
//! assert_eq!(index.get_results(None, None, true), vec![&"bb", &"cc"]);
//!
//! // groups ignore the grouped dimension's own filter
//! let groups = index.group_data("len", |k| k.clone(), &Count);
//! assert_eq!(groups.len(), 3);
//! ```
//!
//! # Removal
//! `clear()` drops every record and reapplies the remembered filters so a
//! caller can rebuild the set with `add()`. `remove_where()` tombstones
//! individual records.

use crate::index::arena::RecordArena;
use crate::index::dimension::{Accessor, FilterValue};
use crate::index::events::{IndexEvent, ListenerId, Listeners};
use crate::index::partition::Partition;
use crate::index::reduce::{into_results, reduce_partition, GroupResult, Reducer};
use crate::index::{Filterable, IndexStats, Key, RecordId};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Single-partition dimensional index
pub struct DimensionalIndex<T> {
    records: RecordArena<T>,
    partition: Partition,
    /// Logical dimensions by id
    accessors: BTreeMap<String, Accessor<T>>,
    /// Remembered non-`All` filter values, reapplied after `clear()`
    filters: BTreeMap<String, FilterValue>,
    /// Global post-filter applied to query results
    filter_fn: Option<Rc<dyn Fn(&T) -> bool>>,
    listeners: Listeners,
    disposed: bool,
    span: tracing::Span,
}

impl<T> Default for DimensionalIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DimensionalIndex<T> {
    /// Create an empty index
    pub fn new() -> Self {
        Self::with_name("default")
    }

    /// Create an empty index whose log lines carry `name`
    pub fn with_name(name: &str) -> Self {
        Self {
            records: RecordArena::new(),
            partition: Partition::new("main"),
            accessors: BTreeMap::new(),
            filters: BTreeMap::new(),
            filter_fn: None,
            listeners: Listeners::default(),
            disposed: false,
            span: tracing::debug_span!("dimensional_index", name = %name),
        }
    }

    // ==================== Record Methods ====================

    /// Add records. Prefer one call with many records over many calls.
    pub fn add(&mut self, items: impl IntoIterator<Item = T>) {
        if self.disposed {
            return;
        }
        let _enter = self.span.enter();

        let items = items.into_iter();
        self.records.reserve(items.size_hint().0);

        let mut added = 0;
        for item in items {
            let id = self.records.insert(item);
            if let Some(record) = self.records.get(id) {
                let accessors = &self.accessors;
                self.partition.insert(id, |dim| {
                    accessors
                        .get(dim)
                        .map(|a| a.keys(record))
                        .unwrap_or_default()
                });
                added += 1;
            }
        }

        tracing::debug!(added, total = self.records.len(), "Added records");
        if added > 0 {
            self.listeners.emit(IndexEvent::Added(added));
        }
    }

    /// Add a single record
    pub fn add_one(&mut self, item: T) {
        self.add(std::iter::once(item));
    }

    /// Remove every record, then reapply every remembered filter
    pub fn clear(&mut self) {
        if self.disposed {
            return;
        }
        let _enter = self.span.enter();

        for id in self.filters.keys() {
            self.partition.set_filter(id, FilterValue::All);
        }
        self.partition.clear();
        self.records.clear();
        for (id, value) in &self.filters {
            self.partition.set_filter(id, value.clone());
        }

        tracing::debug!(filters = self.filters.len(), "Cleared index");
        self.listeners.emit(IndexEvent::Cleared);
    }

    /// Remove every record matching the predicate, returning how many went
    pub fn remove_where(&mut self, predicate: impl Fn(&T) -> bool) -> usize {
        if self.disposed {
            return 0;
        }
        let _enter = self.span.enter();

        let doomed: Vec<RecordId> = self
            .records
            .iter()
            .filter(|(_, record)| predicate(record))
            .map(|(id, _)| id)
            .collect();

        for id in &doomed {
            self.partition.remove(*id);
            self.records.remove(*id);
        }

        tracing::debug!(removed = doomed.len(), "Removed records");
        if !doomed.is_empty() {
            self.listeners.emit(IndexEvent::Removed(doomed.len()));
        }
        doomed.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.len() == 0
    }

    // ==================== Dimension Methods ====================

    /// Add a dimension keyed by `accessor`, replacing any dimension with the
    /// same id (its filter is discarded)
    pub fn add_dimension(&mut self, id: &str, accessor: impl Fn(&T) -> Key + 'static) {
        self.add_dimension_with(id, Accessor::single(accessor));
    }

    /// Add a dimension where each record may carry several keys
    pub fn add_array_dimension(&mut self, id: &str, accessor: impl Fn(&T) -> Vec<Key> + 'static) {
        self.add_dimension_with(id, Accessor::array(accessor));
    }

    pub fn add_dimension_with(&mut self, id: &str, accessor: Accessor<T>) {
        if self.disposed {
            return;
        }
        let _enter = self.span.enter();

        let records = &self.records;
        let added = self.partition.add_dimension(id, accessor.is_array(), |rid| {
            records
                .get(rid)
                .map(|r| accessor.keys(r))
                .unwrap_or_default()
        });
        if !added {
            return;
        }

        self.filters.remove(id);
        self.accessors.insert(id.to_string(), accessor);

        tracing::debug!(dimension = id, "Added dimension");
        self.listeners.emit(IndexEvent::DimensionAdded(id.to_string()));
    }

    /// Drop a dimension and its remembered filter
    pub fn remove_dimension(&mut self, id: &str) -> bool {
        if self.disposed || self.accessors.remove(id).is_none() {
            return false;
        }
        let _enter = self.span.enter();

        self.partition.remove_dimension(id);
        self.filters.remove(id);

        tracing::debug!(dimension = id, "Removed dimension");
        self.listeners
            .emit(IndexEvent::DimensionRemoved(id.to_string()));
        true
    }

    pub fn has_dimension(&self, id: &str) -> bool {
        self.accessors.contains_key(id)
    }

    pub fn dimension_ids(&self) -> Vec<&str> {
        self.accessors.keys().map(String::as_str).collect()
    }

    /// Set the filter of a dimension, or clear it with `None`
    ///
    /// The value is remembered and reapplied after `clear()`.
    pub fn filter_dimension(&mut self, id: &str, value: Option<FilterValue>) {
        if self.disposed {
            return;
        }
        let _enter = self.span.enter();

        let value = value.unwrap_or_default();
        if !self.partition.set_filter(id, value.clone()) {
            tracing::warn!(dimension = id, "Cannot filter unknown dimension");
            return;
        }

        if value.is_all() {
            self.filters.remove(id);
        } else {
            self.filters.insert(id.to_string(), value);
        }
        self.listeners.emit(IndexEvent::Filtered(id.to_string()));
    }

    /// Current filter of a dimension
    pub fn filter_value(&self, id: &str) -> Option<&FilterValue> {
        self.partition.filter(id)
    }

    /// Set the global post-filter applied to `get_results`
    pub fn set_filter_function(&mut self, filter: impl Fn(&T) -> bool + 'static) {
        if self.disposed {
            return;
        }
        self.filter_fn = Some(Rc::new(filter));
    }

    pub fn clear_filter_function(&mut self) {
        self.filter_fn = None;
    }

    // ==================== Query Methods ====================

    /// Group the records passing every filter except the dimension's own
    ///
    /// `key_fn` maps dimension keys to group keys. The group exists only for
    /// the duration of the call; results are sorted by group key.
    pub fn group_data<R: Reducer<T>>(
        &self,
        id: &str,
        key_fn: impl Fn(&Key) -> Key,
        reducer: &R,
    ) -> Vec<GroupResult<R::Bin>> {
        if self.disposed {
            return Vec::new();
        }
        let _enter = self.span.enter();

        let mut bins = BTreeMap::new();
        if !reduce_partition(&self.partition, &self.records, id, &key_fn, reducer, &mut bins) {
            tracing::warn!(dimension = id, "Cannot group unknown dimension");
            return Vec::new();
        }
        into_results(bins)
    }

    /// Records passing every filter, ordered by a dimension
    ///
    /// Top (descending) order unless `from_bottom`. Without a dimension id the
    /// first dimension by id anchors the query.
    pub fn get_results(
        &self,
        limit: Option<usize>,
        dimension_id: Option<&str>,
        from_bottom: bool,
    ) -> Vec<&T> {
        if self.disposed {
            return Vec::new();
        }
        let _enter = self.span.enter();

        let anchor = match dimension_id.or_else(|| self.accessors.keys().next().map(String::as_str)) {
            Some(anchor) => anchor,
            None => {
                tracing::warn!("No dimension available to order results");
                return Vec::new();
            }
        };

        let Some(ordered) = self.partition.ordered(anchor, !from_bottom) else {
            tracing::warn!(dimension = anchor, "Cannot order results by unknown dimension");
            return Vec::new();
        };

        ordered
            .filter_map(|id| self.records.get(id))
            .filter(|record| self.filter_fn.as_ref().map(|f| f(record)).unwrap_or(true))
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    // ==================== Lifecycle Methods ====================

    pub fn subscribe(&mut self, listener: impl Fn(&IndexEvent) + 'static) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Release every record and dimension; later mutations are no-ops
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        let _enter = self.span.enter();

        self.disposed = true;
        self.records.clear();
        self.partition = Partition::new("main");
        self.accessors.clear();
        self.filters.clear();
        self.filter_fn = None;

        tracing::debug!("Disposed index");
        self.listeners.emit(IndexEvent::Disposed);
        self.listeners.clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            records: self.records.len(),
            main: self.partition.len(),
            timeless: 0,
            holds: 0,
            dimensions: self.accessors.len(),
            active_filters: self.partition.active_filters(),
        }
    }
}

impl<T> Filterable for DimensionalIndex<T> {
    fn filter_dimension(&mut self, id: &str, value: Option<FilterValue>) {
        DimensionalIndex::filter_dimension(self, id, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Count, ReduceFns};
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq)]
    struct Track {
        name: &'static str,
        speed: i64,
        tags: Vec<&'static str>,
    }

    fn track(name: &'static str, speed: i64, tags: &[&'static str]) -> Track {
        Track {
            name,
            speed,
            tags: tags.to_vec(),
        }
    }

    fn tracks() -> Vec<Track> {
        vec![
            track("alpha", 10, &["air"]),
            track("bravo", 30, &["sea", "air"]),
            track("charlie", 20, &["land"]),
            track("delta", 40, &["sea"]),
            track("echo", 20, &[]),
        ]
    }

    fn index() -> DimensionalIndex<Track> {
        let mut index = DimensionalIndex::with_name("tracks");
        index.add_dimension("speed", |t: &Track| Key::Int(t.speed));
        index.add_dimension("name", |t: &Track| Key::from(t.name));
        index.add_array_dimension("tags", |t: &Track| {
            t.tags.iter().map(|tag| Key::from(*tag)).collect()
        });
        index.add(tracks());
        index
    }

    fn names(results: Vec<&Track>) -> Vec<&'static str> {
        results.into_iter().map(|t| t.name).collect()
    }

    #[test]
    fn test_keyless_records_follow_array_order() {
        let mut index = index();
        let all = names(index.get_results(None, Some("tags"), true));
        assert_eq!(all, vec!["alpha", "bravo", "charlie", "delta", "echo"]);

        let top = names(index.get_results(None, Some("tags"), false));
        assert_eq!(top, vec!["delta", "bravo", "charlie", "alpha", "echo"]);

        index.filter_dimension("tags", Some(FilterValue::exact("sea")));
        let sea = names(index.get_results(None, Some("tags"), true));
        assert_eq!(sea, vec!["bravo", "delta"]);
    }

    #[test]
    fn test_results_ordering_and_limit() {
        let index = index();

        let top = index.get_results(Some(2), Some("speed"), false);
        assert_eq!(names(top), vec!["delta", "bravo"]);

        let bottom = index.get_results(None, Some("speed"), true);
        assert_eq!(names(bottom), vec!["alpha", "charlie", "echo", "bravo", "delta"]);

        // default anchor is the first dimension by id ("name")
        let default = index.get_results(Some(1), None, true);
        assert_eq!(names(default), vec!["alpha"]);
    }

    #[test]
    fn test_filters_intersect() {
        let mut index = index();
        index.filter_dimension("speed", Some(FilterValue::range(15i64, 35i64)));
        index.filter_dimension("tags", Some(FilterValue::exact("air")));

        let results = index.get_results(None, Some("speed"), true);
        assert_eq!(names(results), vec!["bravo"]);

        index.filter_dimension("tags", None);
        let results = index.get_results(None, Some("speed"), true);
        assert_eq!(names(results), vec!["charlie", "echo", "bravo"]);
    }

    #[test]
    fn test_filter_reapplied_after_clear_and_rebuild() {
        let mut index = index();
        index.filter_dimension("speed", Some(FilterValue::at_least(20i64)));
        index.filter_dimension("tags", Some(FilterValue::exact("sea")));

        let before = names(index.get_results(None, Some("name"), true));

        index.clear();
        assert!(index.is_empty());
        index.add(tracks());

        let after = names(index.get_results(None, Some("name"), true));
        assert_eq!(before, after);
        assert_eq!(after, vec!["bravo", "delta"]);
    }

    #[test]
    fn test_dimension_replacement() {
        let mut index = index();
        index.filter_dimension("speed", Some(FilterValue::exact(10i64)));

        index.add_dimension("speed", |t: &Track| Key::Int(-t.speed));

        assert_eq!(index.dimension_ids().iter().filter(|d| **d == "speed").count(), 1);
        // the old filter went with the old dimension
        assert!(index.filter_value("speed").unwrap().is_all());

        let top = index.get_results(Some(1), Some("speed"), false);
        assert_eq!(names(top), vec!["alpha"]);
    }

    #[test]
    fn test_group_data_ignores_own_filter() {
        let mut index = index();
        index.filter_dimension("speed", Some(FilterValue::exact(20i64)));
        index.filter_dimension("tags", Some(FilterValue::exact("sea")));

        // speed groups see the tag filter only
        let groups = index.group_data("speed", |k| k.clone(), &Count);
        let summary: Vec<(Key, usize)> = groups.into_iter().map(|g| (g.key, g.value)).collect();
        assert_eq!(summary, vec![(Key::Int(30), 1), (Key::Int(40), 1)]);
    }

    #[test]
    fn test_group_data_array_dimension_and_key_fn() {
        let index = index();

        let groups = index.group_data("tags", |k| k.clone(), &Count);
        let summary: Vec<(String, usize)> = groups
            .into_iter()
            .map(|g| (g.key.to_string(), g.value))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("air".to_string(), 2),
                ("land".to_string(), 1),
                ("sea".to_string(), 2)
            ]
        );

        // mapping every tag to one group counts each record once
        let groups = index.group_data("tags", |_| Key::from("any"), &Count);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].value, 4);
    }

    #[test]
    fn test_group_data_custom_reducer() {
        let index = index();
        let total_speed = ReduceFns::new(
            |bin: &mut i64, t: &Track| *bin += t.speed,
            |bin: &mut i64, t: &Track| *bin -= t.speed,
            || 0,
        );

        let groups = index.group_data(
            "speed",
            |k| Key::from(k.as_int().unwrap_or(0) >= 25),
            &total_speed,
        );
        let summary: Vec<(Key, i64)> = groups.into_iter().map(|g| (g.key, g.value)).collect();
        assert_eq!(summary, vec![(Key::Bool(false), 50), (Key::Bool(true), 70)]);
    }

    #[test]
    fn test_missing_dimension_yields_empty() {
        let mut index: DimensionalIndex<Track> = DimensionalIndex::new();
        index.add(tracks());

        assert!(index.get_results(None, None, false).is_empty());
        assert!(index.get_results(None, Some("nope"), false).is_empty());
        assert!(index.group_data("nope", |k| k.clone(), &Count).is_empty());

        // filtering an unknown dimension is ignored
        index.filter_dimension("nope", Some(FilterValue::exact(1i64)));
        assert_eq!(index.stats().active_filters, 0);
    }

    #[test]
    fn test_post_filter() {
        let mut index = index();
        index.set_filter_function(|t: &Track| t.name.contains('a'));

        let results = index.get_results(None, Some("speed"), true);
        assert_eq!(names(results), vec!["alpha", "charlie", "bravo", "delta"]);

        index.clear_filter_function();
        assert_eq!(index.get_results(None, Some("speed"), true).len(), 5);
    }

    #[test]
    fn test_remove_where() {
        let mut index = index();
        index.filter_dimension("tags", Some(FilterValue::exact("sea")));

        assert_eq!(index.remove_where(|t| t.speed > 35), 1);
        assert_eq!(index.len(), 4);
        assert_eq!(names(index.get_results(None, Some("name"), true)), vec!["bravo"]);
    }

    #[test]
    fn test_remove_dimension() {
        let mut index = index();
        index.filter_dimension("tags", Some(FilterValue::exact("land")));
        assert_eq!(index.get_results(None, None, true).len(), 1);

        assert!(index.remove_dimension("tags"));
        assert!(!index.has_dimension("tags"));
        assert_eq!(index.get_results(None, None, true).len(), 5);
        assert!(!index.remove_dimension("tags"));
    }

    #[test]
    fn test_disposed_index_is_inert() {
        let mut index = index();
        index.dispose();

        index.add(tracks());
        index.add_dimension("speed", |t: &Track| Key::Int(t.speed));
        index.filter_dimension("speed", Some(FilterValue::exact(10i64)));
        index.clear();

        assert!(index.is_disposed());
        assert_eq!(index.len(), 0);
        assert!(index.get_results(None, Some("speed"), false).is_empty());
        assert_eq!(index.stats(), IndexStats::default());
    }

    #[test]
    fn test_change_notifications() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut index: DimensionalIndex<Track> = DimensionalIndex::new();

        let sink = Rc::clone(&events);
        index.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        index.add_dimension("speed", |t: &Track| Key::Int(t.speed));
        index.add(tracks());
        index.filter_dimension("speed", Some(FilterValue::exact(10i64)));
        index.clear();

        assert_eq!(
            *events.borrow(),
            vec![
                IndexEvent::DimensionAdded("speed".to_string()),
                IndexEvent::Added(5),
                IndexEvent::Filtered("speed".to_string()),
                IndexEvent::Cleared,
            ]
        );
    }
}
