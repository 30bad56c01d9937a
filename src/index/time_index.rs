//! Time Index - dimensional index partitioned by time availability
//!
//! Records are classified on insertion by the caller's time accessor:
//!
//! - **main**: records with an interval, indexed under the implicit
//!   interval-start and interval-end dimensions
//! - **timeless**: records without one
//! - **holds**: timeless records that stay visible whatever the time window
//!   (only while holds are active and a hold accessor is configured)
//!
//! A custom dimension is defined once and carries a cursor in every
//! partition, so one filter call narrows all of them.
//!
//! # Intersection
//! ```text
//! range [s, e]:  end-dimension   ∈ [s, +∞)
//!                start-dimension ∈ (-∞, e)      (e + 1 when s == e)
//!
//!   main ─────────────► overlapping records, by start
//!   timeless (opt) ───► union
//!   holds (opt) ──────► union, filtered by hold start/end
//! ```

use crate::index::arena::RecordArena;
use crate::index::dimension::{Accessor, FilterValue};
use crate::index::events::{IndexEvent, ListenerId, Listeners};
use crate::index::partition::Partition;
use crate::index::reduce::{into_results, reduce_partition, GroupResult, Reducer};
use crate::index::{Filterable, IndexConfig, IndexStats, Key, RecordId};
use crate::time::Interval;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::rc::Rc;

/// Implicit dimension over interval starts
pub const START_DIMENSION: &str = "__start__";

/// Implicit dimension over interval ends
pub const END_DIMENSION: &str = "__end__";

/// Accept-everything dimension anchoring the timeless partition while no
/// custom dimension exists
pub const DEFAULT_DIMENSION: &str = "__default__";

type TimeFn<T> = Rc<dyn Fn(&T) -> Option<Interval>>;

/// Time-partitioned dimensional index
pub struct TimeIndex<T> {
    records: RecordArena<T>,
    main: Partition,
    timeless: Partition,
    holds: Partition,
    get_time_fn: TimeFn<T>,
    get_hold_time_fn: Option<TimeFn<T>>,
    holds_active: bool,
    /// Custom dimensions by id, mirrored onto every partition
    accessors: BTreeMap<String, Accessor<T>>,
    /// Remembered non-`All` custom filters
    filters: BTreeMap<String, FilterValue>,
    filter_fn: Option<Rc<dyn Fn(&T) -> bool>>,
    range: Option<Interval>,
    last_range: Option<Interval>,
    listeners: Listeners,
    disposed: bool,
    span: tracing::Span,
}

impl<T> TimeIndex<T> {
    /// Create an index classifying records with `get_time_fn`
    pub fn new(get_time_fn: impl Fn(&T) -> Option<Interval> + 'static) -> Self {
        let mut main = Partition::new("main");
        main.add_dimension(START_DIMENSION, false, |_| Vec::new());
        main.add_dimension(END_DIMENSION, false, |_| Vec::new());

        let mut timeless = Partition::new("timeless");
        timeless.add_dimension(DEFAULT_DIMENSION, false, |_| Vec::new());

        let mut holds = Partition::new("holds");
        holds.add_dimension(START_DIMENSION, false, |_| Vec::new());
        holds.add_dimension(END_DIMENSION, false, |_| Vec::new());

        Self {
            records: RecordArena::new(),
            main,
            timeless,
            holds,
            get_time_fn: Rc::new(get_time_fn),
            get_hold_time_fn: None,
            holds_active: false,
            accessors: BTreeMap::new(),
            filters: BTreeMap::new(),
            filter_fn: None,
            range: None,
            last_range: None,
            listeners: Listeners::default(),
            disposed: false,
            span: tracing::debug_span!("time_index", name = "default"),
        }
    }

    /// Builder: name used in log lines
    pub fn with_name(mut self, name: &str) -> Self {
        self.span = tracing::debug_span!("time_index", name = %name);
        self
    }

    /// Builder: accessor giving hold records their time
    ///
    /// Hold records without a hold time span all of time.
    pub fn with_hold_time_fn(mut self, f: impl Fn(&T) -> Option<Interval> + 'static) -> Self {
        self.get_hold_time_fn = Some(Rc::new(f));
        self
    }

    /// Builder: apply index settings
    pub fn with_config(mut self, config: &IndexConfig) -> Self {
        self.holds_active = config.holds_active;
        self
    }

    // ==================== Record Methods ====================

    /// Add records, classifying each into `main` or `timeless` (and `holds`)
    pub fn add(&mut self, items: impl IntoIterator<Item = T>) {
        if self.disposed {
            return;
        }
        let span = self.span.clone();
        let _enter = span.enter();

        let items = items.into_iter();
        self.records.reserve(items.size_hint().0);

        let (mut timed, mut timeless, mut held) = (0usize, 0usize, 0usize);
        for item in items {
            let id = self.records.insert(item);
            match self.insert_record(id) {
                Placement::Main => timed += 1,
                Placement::Timeless { held: h } => {
                    timeless += 1;
                    if h {
                        held += 1;
                    }
                }
                Placement::Missing => {}
            }
        }

        tracing::debug!(timed, timeless, held, "Added records");
        let added = timed + timeless;
        if added > 0 {
            self.listeners.emit(IndexEvent::Added(added));
        }
        self.update_range();
    }

    /// Add a single record
    pub fn add_one(&mut self, item: T) {
        self.add(std::iter::once(item));
    }

    fn insert_record(&mut self, id: RecordId) -> Placement {
        let Some(record) = self.records.get(id) else {
            return Placement::Missing;
        };
        let accessors = &self.accessors;
        let custom_keys = |dim: &str| {
            accessors
                .get(dim)
                .map(|a| a.keys(record))
                .unwrap_or_default()
        };

        if let Some(interval) = (self.get_time_fn)(record) {
            self.main.insert(id, |dim| match dim {
                START_DIMENSION => vec![Key::Int(interval.start)],
                END_DIMENSION => vec![Key::Int(interval.end)],
                _ => custom_keys(dim),
            });
            return Placement::Main;
        }

        self.timeless.insert(id, |dim| match dim {
            DEFAULT_DIMENSION => vec![Key::Null],
            _ => custom_keys(dim),
        });

        let held = match (&self.get_hold_time_fn, self.holds_active) {
            (Some(hold_fn), true) => {
                let interval = hold_fn(record).unwrap_or_else(Interval::unbounded);
                self.holds.insert(id, |dim| match dim {
                    START_DIMENSION => vec![Key::Int(interval.start)],
                    END_DIMENSION => vec![Key::Int(interval.end)],
                    _ => custom_keys(dim),
                });
                true
            }
            _ => false,
        };
        Placement::Timeless { held }
    }

    /// Remove every record, then reapply the remembered filters
    ///
    /// The time filters are released before the partitions are emptied and
    /// the last range is reapplied afterwards.
    pub fn clear(&mut self) {
        if self.disposed {
            return;
        }
        let span = self.span.clone();
        let _enter = span.enter();

        for dim in [START_DIMENSION, END_DIMENSION] {
            self.main.set_filter(dim, FilterValue::All);
            self.holds.set_filter(dim, FilterValue::All);
        }

        self.main.clear();
        self.timeless.clear();
        self.holds.clear();
        self.records.clear();

        for (id, value) in &self.filters {
            for partition in [&mut self.main, &mut self.timeless, &mut self.holds] {
                partition.set_filter(id, value.clone());
            }
        }

        tracing::debug!(filters = self.filters.len(), "Cleared index");
        self.listeners.emit(IndexEvent::Cleared);
        self.update_range();
    }

    /// Remove every record matching the predicate, returning how many went
    pub fn remove_where(&mut self, predicate: impl Fn(&T) -> bool) -> usize {
        if self.disposed {
            return 0;
        }
        let span = self.span.clone();
        let _enter = span.enter();

        let doomed: Vec<RecordId> = self
            .records
            .iter()
            .filter(|(_, record)| predicate(record))
            .map(|(id, _)| id)
            .collect();

        for id in &doomed {
            self.main.remove(*id);
            self.timeless.remove(*id);
            self.holds.remove(*id);
            self.records.remove(*id);
        }

        tracing::debug!(removed = doomed.len(), "Removed records");
        if !doomed.is_empty() {
            self.listeners.emit(IndexEvent::Removed(doomed.len()));
            self.update_range();
        }
        doomed.len()
    }

    /// Records across `main` and `timeless`
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.len() == 0
    }

    pub fn timeless_len(&self) -> usize {
        self.timeless.len()
    }

    pub fn holds_len(&self) -> usize {
        self.holds.len()
    }

    // ==================== Hold Methods ====================

    /// Turn hold membership on or off
    ///
    /// Activating copies the current timeless records into `holds`;
    /// deactivating empties it.
    pub fn set_holds_active(&mut self, active: bool) {
        if self.disposed || self.holds_active == active {
            return;
        }
        let span = self.span.clone();
        let _enter = span.enter();

        self.holds_active = active;
        if !active {
            self.holds.clear();
            tracing::debug!("Holds deactivated");
            return;
        }

        let Some(hold_fn) = self.get_hold_time_fn.clone() else {
            tracing::debug!("Holds activated without a hold time accessor");
            return;
        };

        let ids: Vec<RecordId> = self.timeless.ids().collect();
        for id in ids {
            let Some(record) = self.records.get(id) else {
                continue;
            };
            let interval = hold_fn(record).unwrap_or_else(Interval::unbounded);
            let accessors = &self.accessors;
            self.holds.insert(id, |dim| match dim {
                START_DIMENSION => vec![Key::Int(interval.start)],
                END_DIMENSION => vec![Key::Int(interval.end)],
                _ => accessors
                    .get(dim)
                    .map(|a| a.keys(record))
                    .unwrap_or_default(),
            });
        }
        tracing::debug!(holds = self.holds.len(), "Holds activated");
    }

    pub fn holds_active(&self) -> bool {
        self.holds_active
    }

    // ==================== Range Methods ====================

    /// Recompute the cached data range from the start/end dimensions and
    /// reapply the last intersection range, if any
    pub fn update_range(&mut self) {
        if self.disposed {
            return;
        }

        let start = self.main.first_key(START_DIMENSION).and_then(Key::as_int);
        let end = self.main.last_key(END_DIMENSION).and_then(Key::as_int);
        let range = match (start, end) {
            (Some(start), Some(end)) => Interval::try_new(start, end),
            _ => None,
        };

        if range != self.range {
            tracing::debug!(?range, "Data range changed");
            self.range = range;
            self.listeners.emit(IndexEvent::RangeChanged(range));
        }

        if let Some(last) = self.last_range {
            self.apply_time_filters(last, false);
        }
    }

    /// Cached extent of the time-bearing records
    pub fn get_range(&self) -> Option<Interval> {
        self.range
    }

    /// Range of the most recent intersection
    pub fn get_last_range(&self) -> Option<Interval> {
        self.last_range
    }

    /// Narrow the start/end dimensions to intervals overlapping `range`
    fn apply_time_filters(&mut self, range: Interval, include_holds: bool) {
        // the start filter is half-open, so a point range needs one extra
        // millisecond to keep intervals starting exactly at that instant
        let end = if range.start == range.end {
            range.end.saturating_add(1)
        } else {
            range.end
        };
        let end_filter = FilterValue::Bounded(Bound::Included(Key::Int(range.start)), Bound::Unbounded);
        let start_filter = FilterValue::Bounded(Bound::Unbounded, Bound::Excluded(Key::Int(end)));

        self.main.set_filter(END_DIMENSION, end_filter.clone());
        self.main.set_filter(START_DIMENSION, start_filter.clone());

        if include_holds {
            self.holds.set_filter(END_DIMENSION, end_filter);
            self.holds.set_filter(START_DIMENSION, start_filter);
        }
    }

    /// Records overlapping `range`, optionally with timeless or held records
    ///
    /// Timeless records take precedence: when both flags are set only the
    /// timeless partition is added (holds are a subset of it). The range is
    /// remembered and reapplied when later insertions update the data range.
    pub fn intersection(
        &mut self,
        range: Interval,
        include_timeless: bool,
        include_holds: bool,
    ) -> Vec<&T> {
        if self.disposed {
            return Vec::new();
        }
        let span = self.span.clone();
        let _enter = span.enter();

        let include_holds = include_holds && !include_timeless;
        self.apply_time_filters(range, include_holds);
        self.last_range = Some(range);

        let mut ids: Vec<RecordId> = self
            .main
            .ordered(START_DIMENSION, false)
            .map(|it| it.collect())
            .unwrap_or_default();
        let timed = ids.len();

        if include_timeless {
            let anchor = self.timeless_anchor(None);
            if let Some(it) = self.timeless.ordered(anchor, false) {
                ids.extend(it);
            }
        } else if include_holds {
            if let Some(it) = self.holds.ordered(START_DIMENSION, false) {
                ids.extend(it);
            }
        }

        let results: Vec<&T> = ids
            .into_iter()
            .filter_map(|id| self.records.get(id))
            .filter(|record| self.post_filter(record))
            .collect();

        tracing::debug!(
            %range,
            timed,
            total = results.len(),
            include_timeless,
            include_holds,
            "Intersection"
        );
        results
    }

    fn post_filter(&self, record: &T) -> bool {
        self.filter_fn.as_ref().map(|f| f(record)).unwrap_or(true)
    }

    /// Timeless-side dimension matching a requested one
    fn timeless_anchor<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(id) if self.accessors.contains_key(id) => id,
            _ => self
                .accessors
                .keys()
                .next()
                .map(String::as_str)
                .unwrap_or(DEFAULT_DIMENSION),
        }
    }

    // ==================== Dimension Methods ====================

    /// Add a custom dimension across all partitions, replacing any dimension
    /// with the same id
    pub fn add_dimension(&mut self, id: &str, accessor: impl Fn(&T) -> Key + 'static) {
        self.add_dimension_with(id, Accessor::single(accessor));
    }

    /// Add a custom dimension where each record may carry several keys
    pub fn add_array_dimension(&mut self, id: &str, accessor: impl Fn(&T) -> Vec<Key> + 'static) {
        self.add_dimension_with(id, Accessor::array(accessor));
    }

    pub fn add_dimension_with(&mut self, id: &str, accessor: Accessor<T>) {
        if self.disposed {
            return;
        }
        let span = self.span.clone();
        let _enter = span.enter();

        if is_reserved(id) {
            tracing::warn!(dimension = id, "Dimension id is reserved");
            return;
        }
        if !self.main.has_capacity_for(id) || !self.holds.has_capacity_for(id) {
            tracing::warn!(dimension = id, "Dimension limit reached");
            return;
        }

        let records = &self.records;
        let keys_for = |rid: RecordId| {
            records
                .get(rid)
                .map(|r| accessor.keys(r))
                .unwrap_or_default()
        };
        let is_array = accessor.is_array();
        self.main.add_dimension(id, is_array, keys_for);
        self.timeless.add_dimension(id, is_array, keys_for);
        self.holds.add_dimension(id, is_array, keys_for);
        self.timeless.remove_dimension(DEFAULT_DIMENSION);

        self.filters.remove(id);
        self.accessors.insert(id.to_string(), accessor);

        tracing::debug!(dimension = id, "Added dimension");
        self.listeners.emit(IndexEvent::DimensionAdded(id.to_string()));
    }

    /// Drop a custom dimension from all partitions
    ///
    /// Removing the last one reinstalls the timeless default dimension.
    pub fn remove_dimension(&mut self, id: &str) -> bool {
        if self.disposed || self.accessors.remove(id).is_none() {
            return false;
        }
        let span = self.span.clone();
        let _enter = span.enter();

        self.main.remove_dimension(id);
        self.timeless.remove_dimension(id);
        self.holds.remove_dimension(id);
        self.filters.remove(id);

        if self.accessors.is_empty() {
            self.timeless
                .add_dimension(DEFAULT_DIMENSION, false, |_| vec![Key::Null]);
        }

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

    /// Set or clear (`None`) the filter of a custom dimension
    ///
    /// Time filtering goes through `intersection`; the implicit start/end
    /// dimensions cannot be filtered directly.
    pub fn filter_dimension(&mut self, id: &str, value: Option<FilterValue>) {
        if self.disposed {
            return;
        }
        let span = self.span.clone();
        let _enter = span.enter();

        if !self.accessors.contains_key(id) {
            tracing::warn!(dimension = id, "Cannot filter unknown dimension");
            return;
        }

        let value = value.unwrap_or_default();
        for partition in [&mut self.main, &mut self.timeless, &mut self.holds] {
            partition.set_filter(id, value.clone());
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
        self.main.filter(id)
    }

    /// Set the global post-filter applied to query results
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

    /// Group records passing every filter except the dimension's own
    ///
    /// Custom dimensions group `main` and `timeless` records into one set of
    /// bins; the start/end dimensions group `main` only.
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
        if !reduce_partition(&self.main, &self.records, id, &key_fn, reducer, &mut bins) {
            tracing::warn!(dimension = id, "Cannot group unknown dimension");
            return Vec::new();
        }
        if self.accessors.contains_key(id) {
            reduce_partition(&self.timeless, &self.records, id, &key_fn, reducer, &mut bins);
        }
        into_results(bins)
    }

    /// Records passing every filter ordered by a dimension: `main` records
    /// first, then `timeless` ones
    ///
    /// Top (descending) order unless `from_bottom`; the start dimension
    /// anchors the query by default.
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

        let anchor = dimension_id.unwrap_or(START_DIMENSION);
        let Some(main) = self.main.ordered(anchor, !from_bottom) else {
            tracing::warn!(dimension = anchor, "Cannot order results by unknown dimension");
            return Vec::new();
        };

        let timeless_anchor = self.timeless_anchor(Some(anchor));
        let timeless = self
            .timeless
            .ordered(timeless_anchor, !from_bottom)
            .into_iter()
            .flatten();

        main.chain(timeless)
            .filter_map(|id| self.records.get(id))
            .filter(|record| self.post_filter(record))
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
        let span = self.span.clone();
        let _enter = span.enter();

        self.disposed = true;
        self.records.clear();
        self.main = Partition::new("main");
        self.timeless = Partition::new("timeless");
        self.holds = Partition::new("holds");
        self.accessors.clear();
        self.filters.clear();
        self.filter_fn = None;
        self.range = None;
        self.last_range = None;

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
            main: self.main.len(),
            timeless: self.timeless.len(),
            holds: self.holds.len(),
            dimensions: self.accessors.len(),
            active_filters: self.filters.len(),
        }
    }
}

impl<T> Filterable for TimeIndex<T> {
    fn filter_dimension(&mut self, id: &str, value: Option<FilterValue>) {
        TimeIndex::filter_dimension(self, id, value);
    }
}

enum Placement {
    Main,
    Timeless { held: bool },
    Missing,
}

fn is_reserved(id: &str) -> bool {
    matches!(id, START_DIMENSION | END_DIMENSION | DEFAULT_DIMENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Count;
    use crate::time::MAX_TIME;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq)]
    struct Event {
        id: u32,
        start: Option<i64>,
        end: Option<i64>,
        kind: &'static str,
    }

    fn event(id: u32, start: i64, end: i64, kind: &'static str) -> Event {
        Event {
            id,
            start: Some(start),
            end: Some(end),
            kind,
        }
    }

    fn timeless(id: u32, kind: &'static str) -> Event {
        Event {
            id,
            start: None,
            end: None,
            kind,
        }
    }

    fn interval_of(e: &Event) -> Option<Interval> {
        Interval::from_bounds(e.start, e.end)
    }

    fn ids(results: &[&Event]) -> Vec<u32> {
        results.iter().map(|e| e.id).collect()
    }

    fn hundred() -> Vec<Event> {
        (0..100)
            .map(|i| event(i as u32, i * 1000, i * 1000 + 500, if i % 2 == 0 { "even" } else { "odd" }))
            .collect()
    }

    #[test]
    fn test_point_intersection_scenario() {
        let mut index = TimeIndex::new(interval_of);
        index.add(hundred());

        let results = index.intersection(Interval::instant(50_000), false, false);
        assert_eq!(ids(&results), vec![50]);

        index.add_one(timeless(1000, "even"));
        let range = Interval::new(10_000, 12_000);

        // record 12 starts exactly at the range end and is left out
        let with = ids(&index.intersection(range, true, false));
        assert_eq!(with, vec![10, 11, 1000]);

        let without = ids(&index.intersection(range, false, false));
        assert_eq!(without, vec![10, 11]);
    }

    #[test]
    fn test_point_interval_records_match_point_range() {
        let mut index = TimeIndex::new(interval_of);
        index.add(vec![
            event(1, 5000, 5000, "a"),
            event(2, 4000, 5000, "a"),
            event(3, 5001, 6000, "a"),
            event(4, 5000, 5000, "a"),
        ]);

        let results = index.intersection(Interval::instant(5000), false, false);
        assert_eq!(ids(&results), vec![2, 1, 4]);
    }

    #[test]
    fn test_range_end_is_exclusive_for_starts() {
        let mut index = TimeIndex::new(interval_of);
        index.add(vec![event(1, 1000, 1500, "a"), event(2, 2000, 2500, "a")]);

        // a record starting exactly at the range end is outside [1000, 2000)
        let results = index.intersection(Interval::new(1000, 2000), false, false);
        assert_eq!(ids(&results), vec![1]);

        // a record ending exactly at the range start still overlaps
        let results = index.intersection(Interval::new(1500, 1800), false, false);
        assert_eq!(ids(&results), vec![1]);
    }

    #[test]
    fn test_partition_exclusivity() {
        let mut index = TimeIndex::new(interval_of)
            .with_hold_time_fn(|_: &Event| None)
            .with_config(&IndexConfig {
                holds_active: true,
                ..IndexConfig::default()
            });
        index.add(vec![
            event(1, 0, 10, "a"),
            timeless(2, "a"),
            event(3, 5, 5, "b"),
            timeless(4, "b"),
        ]);

        let stats = index.stats();
        assert_eq!(stats.records, 4);
        assert_eq!(stats.main + stats.timeless, stats.records);
        assert_eq!(stats.main, 2);
        assert_eq!(stats.timeless, 2);
        assert_eq!(stats.holds, 2);
    }

    #[test]
    fn test_holds_follow_hold_time() {
        let mut index = TimeIndex::new(interval_of)
            .with_hold_time_fn(|e: &Event| (e.id == 11).then(|| Interval::new(90_000, 95_000)));
        index.add(hundred());

        // holds inactive: nothing is held
        index.add_one(timeless(10, "held"));
        assert_eq!(index.holds_len(), 0);

        index.set_holds_active(true);
        assert_eq!(index.holds_len(), 1);
        index.add_one(timeless(11, "held"));
        assert_eq!(index.holds_len(), 2);

        let range = Interval::new(20_000, 21_000);
        let results = index.intersection(range, false, true);
        // record 10 has no hold time and spans everything, 11 is out of range
        assert_eq!(ids(&results), vec![20, 10]);

        let results = index.intersection(Interval::new(92_000, 92_100), false, true);
        assert_eq!(ids(&results), vec![92, 10, 11]);

        index.set_holds_active(false);
        assert_eq!(index.holds_len(), 0);
        let results = index.intersection(range, false, true);
        assert_eq!(ids(&results), vec![20]);
    }

    #[test]
    fn test_range_tracks_insertions() {
        let mut index = TimeIndex::new(interval_of);
        assert_eq!(index.get_range(), None);

        index.add(vec![event(1, 3000, 4000, "a"), event(2, 1000, 2000, "a")]);
        assert_eq!(index.get_range(), Some(Interval::new(1000, 4000)));

        index.add_one(timeless(3, "a"));
        assert_eq!(index.get_range(), Some(Interval::new(1000, 4000)));

        index.add_one(event(4, 500, 9000, "a"));
        assert_eq!(index.get_range(), Some(Interval::new(500, 9000)));
    }

    #[test]
    fn test_last_range_reapplied_on_insert() {
        let mut index = TimeIndex::new(interval_of);
        index.add(hundred());

        let range = Interval::new(5_000, 6_200);
        assert_eq!(ids(&index.intersection(range, false, false)), vec![5, 6]);
        assert_eq!(index.get_last_range(), Some(range));

        index.add(vec![event(500, 5_500, 5_600, "new"), event(501, 70_000, 70_001, "new")]);

        let visible = ids(&index.get_results(None, None, true));
        assert_eq!(visible, vec![5, 500, 6]);
    }

    #[test]
    fn test_custom_dimension_spans_partitions() {
        let mut index = TimeIndex::new(interval_of);
        index.add(hundred());
        index.add(vec![timeless(200, "even"), timeless(201, "odd")]);
        index.add_dimension("kind", |e: &Event| Key::from(e.kind));

        index.filter_dimension("kind", Some(FilterValue::exact("odd")));
        let results = index.intersection(Interval::new(0, 4_000), true, false);
        assert_eq!(ids(&results), vec![1, 3, 201]);

        let groups = index.group_data("kind", |k| k.clone(), &Count);
        let summary: Vec<(Key, usize)> = groups.into_iter().map(|g| (g.key, g.value)).collect();
        // grouping ignores the kind filter; timeless records join the bins
        assert_eq!(summary, vec![(Key::from("even"), 3), (Key::from("odd"), 3)]);
    }

    #[test]
    fn test_timeless_records_without_array_keys_stay_visible() {
        let mut index = TimeIndex::new(interval_of);
        index.add(vec![event(1, 0, 500, "a"), timeless(2, ""), timeless(3, "a")]);
        let before = ids(&index.intersection(Interval::new(0, 1_000), true, false));
        assert_eq!(before, vec![1, 2, 3]);

        index.add_array_dimension("tags", |e: &Event| {
            if e.kind.is_empty() {
                Vec::new()
            } else {
                vec![Key::from(e.kind)]
            }
        });
        let after = ids(&index.intersection(Interval::new(0, 1_000), true, false));
        assert_eq!(after, vec![1, 3, 2]);
        assert_eq!(ids(&index.get_results(None, None, true)), vec![1, 3, 2]);

        index.filter_dimension("tags", Some(FilterValue::exact("a")));
        let tagged = ids(&index.intersection(Interval::new(0, 1_000), true, false));
        assert_eq!(tagged, vec![1, 3]);
    }

    #[test]
    fn test_default_dimension_reinstalled() {
        let mut index = TimeIndex::new(interval_of);
        index.add(vec![timeless(1, "a"), timeless(2, "b")]);

        index.add_dimension("kind", |e: &Event| Key::from(e.kind));
        index.filter_dimension("kind", Some(FilterValue::exact("b")));
        let results = index.intersection(Interval::new(0, 1), true, false);
        assert_eq!(ids(&results), vec![2]);

        assert!(index.remove_dimension("kind"));
        let results = index.intersection(Interval::new(0, 1), true, false);
        assert_eq!(ids(&results), vec![1, 2]);
    }

    #[test]
    fn test_clear_and_rebuild_restores_view() {
        let mut index = TimeIndex::new(interval_of);
        index.add(hundred());
        index.add_dimension("kind", |e: &Event| Key::from(e.kind));
        index.filter_dimension("kind", Some(FilterValue::exact("even")));
        index.intersection(Interval::new(10_000, 20_000), false, false);

        let before = ids(&index.get_results(None, None, true));

        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.get_range(), None);

        index.add(hundred());
        let after = ids(&index.get_results(None, None, true));

        assert_eq!(before, after);
        assert_eq!(after, vec![10, 12, 14, 16, 18]);
    }

    #[test]
    fn test_remove_where_updates_range() {
        let mut index = TimeIndex::new(interval_of);
        index.add(hundred());

        assert_eq!(index.remove_where(|e| e.id >= 90), 10);
        assert_eq!(index.get_range(), Some(Interval::new(0, 89_500)));
        assert_eq!(index.len(), 90);
    }

    #[test]
    fn test_results_order_main_then_timeless() {
        let mut index = TimeIndex::new(interval_of);
        index.add(vec![event(1, 100, 200, "a"), timeless(2, "a"), event(3, 50, 60, "a")]);

        assert_eq!(ids(&index.get_results(None, None, false)), vec![1, 3, 2]);
        assert_eq!(ids(&index.get_results(None, None, true)), vec![3, 1, 2]);
        assert_eq!(ids(&index.get_results(Some(1), None, true)), vec![3]);
        assert!(index.get_results(None, Some("missing"), true).is_empty());
    }

    #[test]
    fn test_reserved_dimensions() {
        let mut index = TimeIndex::new(interval_of);
        index.add(hundred());

        index.add_dimension(START_DIMENSION, |_: &Event| Key::Null);
        assert!(!index.has_dimension(START_DIMENSION));

        index.filter_dimension(START_DIMENSION, Some(FilterValue::exact(0i64)));
        assert_eq!(index.get_results(None, None, true).len(), 100);
    }

    #[test]
    fn test_post_filter_applies_to_intersection() {
        let mut index = TimeIndex::new(interval_of);
        index.add(hundred());
        index.set_filter_function(|e: &Event| e.kind == "odd");

        let results = index.intersection(Interval::new(0, 5_000), false, false);
        assert_eq!(ids(&results), vec![1, 3]);
    }

    #[test]
    fn test_disposed_time_index() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut index = TimeIndex::new(interval_of);
        let sink = Rc::clone(&events);
        index.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        index.add(hundred());
        index.dispose();
        index.add(hundred());

        assert!(index.intersection(Interval::new(0, 100_000), true, true).is_empty());
        assert_eq!(index.get_range(), None);
        assert_eq!(events.borrow().last(), Some(&IndexEvent::Disposed));
    }

    #[test]
    fn test_open_intervals_use_sentinels() {
        let mut index = TimeIndex::new(interval_of);
        let open = Event {
            id: 1,
            start: Some(5_000),
            end: None,
            kind: "open",
        };
        assert!(interval_of(&open).unwrap().has_open_end());
        index.add(vec![open, event(2, 0, 100, "closed")]);

        assert_eq!(index.get_range(), Some(Interval::new(0, MAX_TIME)));
        let results = index.intersection(Interval::instant(1_000_000), false, false);
        assert_eq!(ids(&results), vec![1]);
    }
}
