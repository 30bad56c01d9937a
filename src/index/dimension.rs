//! Dimensions: accessors, filter values and sorted cursors
//!
//! A logical dimension is an `Accessor` (record → key(s)) plus the filter the
//! caller last applied. Each partition that carries the dimension keeps its
//! own `DimensionCursor`: the records of that partition sorted by key.

use crate::index::{Key, RecordId};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::ops::Bound;
use std::rc::Rc;

/// Maps a record to the key(s) it is indexed under
pub enum Accessor<T> {
    /// Exactly one key per record
    Single(Rc<dyn Fn(&T) -> Key>),
    /// Any number of keys per record; the record passes a filter when any of
    /// its keys does
    Array(Rc<dyn Fn(&T) -> Vec<Key>>),
}

impl<T> Accessor<T> {
    pub fn single(f: impl Fn(&T) -> Key + 'static) -> Self {
        Accessor::Single(Rc::new(f))
    }

    pub fn array(f: impl Fn(&T) -> Vec<Key> + 'static) -> Self {
        Accessor::Array(Rc::new(f))
    }

    /// Keys for a record
    pub fn keys(&self, record: &T) -> Vec<Key> {
        match self {
            Accessor::Single(f) => vec![f(record)],
            Accessor::Array(f) => f(record),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Accessor::Array(_))
    }
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        match self {
            Accessor::Single(f) => Accessor::Single(Rc::clone(f)),
            Accessor::Array(f) => Accessor::Array(Rc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for Accessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessor::Single(_) => write!(f, "Accessor::Single"),
            Accessor::Array(_) => write!(f, "Accessor::Array"),
        }
    }
}

/// Active filter of a dimension
#[derive(Clone, Default)]
pub enum FilterValue {
    /// No filter
    #[default]
    All,
    /// Keys equal to the value
    Exact(Key),
    /// Half-open range `[lo, hi)`
    Range(Key, Key),
    /// Arbitrary bounds
    Bounded(Bound<Key>, Bound<Key>),
    /// Keys accepted by the predicate
    Predicate(Rc<dyn Fn(&Key) -> bool>),
}

impl FilterValue {
    pub fn exact(key: impl Into<Key>) -> Self {
        FilterValue::Exact(key.into())
    }

    pub fn range(lo: impl Into<Key>, hi: impl Into<Key>) -> Self {
        FilterValue::Range(lo.into(), hi.into())
    }

    pub fn predicate(f: impl Fn(&Key) -> bool + 'static) -> Self {
        FilterValue::Predicate(Rc::new(f))
    }

    /// Keys `>= lo`
    pub fn at_least(lo: impl Into<Key>) -> Self {
        FilterValue::Bounded(Bound::Included(lo.into()), Bound::Unbounded)
    }

    /// Keys `< hi`
    pub fn below(hi: impl Into<Key>) -> Self {
        FilterValue::Bounded(Bound::Unbounded, Bound::Excluded(hi.into()))
    }

    pub fn is_all(&self) -> bool {
        matches!(self, FilterValue::All)
    }

    /// Check a single key
    pub fn matches(&self, key: &Key) -> bool {
        match self {
            FilterValue::All => true,
            FilterValue::Exact(v) => key == v,
            FilterValue::Range(lo, hi) => key >= lo && key < hi,
            FilterValue::Bounded(lo, hi) => {
                let above = match lo {
                    Bound::Included(v) => key >= v,
                    Bound::Excluded(v) => key > v,
                    Bound::Unbounded => true,
                };
                let below = match hi {
                    Bound::Included(v) => key <= v,
                    Bound::Excluded(v) => key < v,
                    Bound::Unbounded => true,
                };
                above && below
            }
            FilterValue::Predicate(f) => f(key),
        }
    }

    /// Check a record's keys: an unfiltered dimension accepts everything,
    /// including records with no keys at all
    pub fn matches_any(&self, keys: &[Key]) -> bool {
        self.is_all() || keys.iter().any(|k| self.matches(k))
    }

    /// Key bounds usable for an ordered range scan, or None when the filter
    /// can only be evaluated by visiting every key. An empty range yields
    /// `Some(None)`.
    fn scan_bounds(&self) -> Option<Option<(Bound<&Key>, Bound<&Key>)>> {
        let bounds = match self {
            FilterValue::Exact(v) => (Bound::Included(v), Bound::Included(v)),
            FilterValue::Range(lo, hi) => (Bound::Included(lo), Bound::Excluded(hi)),
            FilterValue::Bounded(lo, hi) => (lo.as_ref(), hi.as_ref()),
            FilterValue::All | FilterValue::Predicate(_) => return None,
        };
        Some(if bounds_are_empty(&bounds) {
            None
        } else {
            Some(bounds)
        })
    }
}

impl fmt::Debug for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::All => write!(f, "All"),
            FilterValue::Exact(v) => write!(f, "Exact({:?})", v),
            FilterValue::Range(lo, hi) => write!(f, "Range({:?}, {:?})", lo, hi),
            FilterValue::Bounded(lo, hi) => write!(f, "Bounded({:?}, {:?})", lo, hi),
            FilterValue::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

/// BTreeSet::range panics on reversed or doubly-excluded equal bounds
fn bounds_are_empty(bounds: &(Bound<&Key>, Bound<&Key>)) -> bool {
    match bounds {
        (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
        (Bound::Included(lo), Bound::Excluded(hi))
        | (Bound::Excluded(lo), Bound::Included(hi))
        | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
        _ => false,
    }
}

/// Lower bound over `(key, id)` entries equivalent to a bound over keys
fn entry_lower(bound: Bound<&Key>) -> Bound<(Key, RecordId)> {
    match bound {
        Bound::Included(k) => Bound::Included((k.clone(), RecordId(usize::MIN))),
        Bound::Excluded(k) => Bound::Excluded((k.clone(), RecordId(usize::MAX))),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Upper bound over `(key, id)` entries equivalent to a bound over keys
fn entry_upper(bound: Bound<&Key>) -> Bound<(Key, RecordId)> {
    match bound {
        Bound::Included(k) => Bound::Included((k.clone(), RecordId(usize::MAX))),
        Bound::Excluded(k) => Bound::Excluded((k.clone(), RecordId(usize::MIN))),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// One partition's view of a dimension: its records sorted by key
#[derive(Debug)]
pub(crate) struct DimensionCursor {
    /// Bit owned in the partition's per-record filter mask
    pub slot: u32,
    pub filter: FilterValue,
    pub is_array: bool,
    sorted: BTreeSet<(Key, RecordId)>,
    keys: HashMap<RecordId, Vec<Key>>,
}

impl DimensionCursor {
    pub fn new(slot: u32, is_array: bool) -> Self {
        Self {
            slot,
            filter: FilterValue::All,
            is_array,
            sorted: BTreeSet::new(),
            keys: HashMap::new(),
        }
    }

    pub fn bit(&self) -> u64 {
        1u64 << self.slot
    }

    /// Index a record, returning whether it passes the current filter
    pub fn insert(&mut self, id: RecordId, keys: Vec<Key>) -> bool {
        let passes = self.filter.matches_any(&keys);
        for key in &keys {
            self.sorted.insert((key.clone(), id));
        }
        self.keys.insert(id, keys);
        passes
    }

    pub fn remove(&mut self, id: RecordId) {
        if let Some(keys) = self.keys.remove(&id) {
            for key in keys {
                self.sorted.remove(&(key, id));
            }
        }
    }

    pub fn clear(&mut self) {
        self.sorted.clear();
        self.keys.clear();
    }

    #[cfg(test)]
    pub fn passes(&self, id: RecordId) -> bool {
        self.keys
            .get(&id)
            .map(|keys| self.filter.matches_any(keys))
            .unwrap_or(false)
    }

    /// Records accepted by the current filter, or None when every record is
    pub fn matching(&self) -> Option<HashSet<RecordId>> {
        if self.filter.is_all() {
            return None;
        }
        match self.filter.scan_bounds() {
            Some(Some((lo, hi))) => Some(
                self.sorted
                    .range((entry_lower(lo), entry_upper(hi)))
                    .map(|(_, id)| *id)
                    .collect(),
            ),
            Some(None) => Some(HashSet::new()),
            None => Some(
                self.sorted
                    .iter()
                    .filter(|(key, _)| self.filter.matches(key))
                    .map(|(_, id)| *id)
                    .collect(),
            ),
        }
    }

    /// Entries in key order
    pub fn entries(&self, descending: bool) -> Box<dyn Iterator<Item = &(Key, RecordId)> + '_> {
        if descending {
            Box::new(self.sorted.iter().rev())
        } else {
            Box::new(self.sorted.iter())
        }
    }

    /// Records indexed with no keys, in insertion order
    pub fn keyless(&self) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self
            .keys
            .iter()
            .filter(|(_, keys)| keys.is_empty())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn first_key(&self) -> Option<&Key> {
        self.sorted.first().map(|(k, _)| k)
    }

    pub fn last_key(&self) -> Option<&Key> {
        self.sorted.last().map(|(k, _)| k)
    }
}
