//! Group/reduce primitives
//!
//! A `Reducer` is the `(add, remove, init)` triple used by `group_data`:
//! `init` creates an empty bin, `add` folds a record into it and `remove`
//! takes one back out.

use crate::index::arena::RecordArena;
use crate::index::partition::Partition;
use crate::index::{Key, RecordId};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::marker::PhantomData;

/// Builds one bin per group key
pub trait Reducer<T> {
    type Bin;

    fn init(&self) -> Self::Bin;

    fn add(&self, bin: &mut Self::Bin, record: &T);

    /// Groups are rebuilt on every query, so the indexes never call this.
    fn remove(&self, bin: &mut Self::Bin, record: &T);
}

/// A reducer made of three closures
pub struct ReduceFns<B, A, R, I> {
    add: A,
    remove: R,
    init: I,
    _bin: PhantomData<fn() -> B>,
}

impl<B, A, R, I> ReduceFns<B, A, R, I> {
    pub fn new(add: A, remove: R, init: I) -> Self {
        Self {
            add,
            remove,
            init,
            _bin: PhantomData,
        }
    }
}

impl<T, B, A, R, I> Reducer<T> for ReduceFns<B, A, R, I>
where
    A: Fn(&mut B, &T),
    R: Fn(&mut B, &T),
    I: Fn() -> B,
{
    type Bin = B;

    fn init(&self) -> B {
        (self.init)()
    }

    fn add(&self, bin: &mut B, record: &T) {
        (self.add)(bin, record)
    }

    fn remove(&self, bin: &mut B, record: &T) {
        (self.remove)(bin, record)
    }
}

/// Counts the records in each group
#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

impl<T> Reducer<T> for Count {
    type Bin = usize;

    fn init(&self) -> usize {
        0
    }

    fn add(&self, bin: &mut usize, _record: &T) {
        *bin += 1;
    }

    fn remove(&self, bin: &mut usize, _record: &T) {
        *bin = bin.saturating_sub(1);
    }
}

/// One materialized group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupResult<B> {
    pub key: Key,
    pub value: B,
}

/// Fold one partition's view of a dimension into `bins`
///
/// Records are taken from the partition when they pass every filter except
/// the grouped dimension's own. A record of an array dimension lands in each
/// distinct group its keys map to. Returns false when the partition lacks
/// the dimension.
pub(crate) fn reduce_partition<T, R: Reducer<T>>(
    partition: &Partition,
    records: &RecordArena<T>,
    dimension: &str,
    key_fn: &dyn Fn(&Key) -> Key,
    reducer: &R,
    bins: &mut BTreeMap<Key, R::Bin>,
) -> bool {
    let dedupe = partition.is_array(dimension);
    let mut seen: HashSet<(Key, RecordId)> = HashSet::new();

    partition.for_each_grouped(dimension, |key, id| {
        let Some(record) = records.get(id) else {
            return;
        };
        let group = key_fn(key);
        if dedupe && !seen.insert((group.clone(), id)) {
            return;
        }
        let bin = bins.entry(group).or_insert_with(|| reducer.init());
        reducer.add(bin, record);
    })
}

/// Materialize bins in key order
pub(crate) fn into_results<B>(bins: BTreeMap<Key, B>) -> Vec<GroupResult<B>> {
    bins.into_iter()
        .map(|(key, value)| GroupResult { key, value })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_fns() {
        let sum = ReduceFns::new(
            |bin: &mut f64, r: &f64| *bin += *r,
            |bin: &mut f64, r: &f64| *bin -= *r,
            || 0.0,
        );

        let mut bin = Reducer::<f64>::init(&sum);
        sum.add(&mut bin, &2.5);
        sum.add(&mut bin, &4.0);
        sum.remove(&mut bin, &2.5);
        assert_eq!(bin, 4.0);
    }

    #[test]
    fn test_count_never_underflows() {
        let mut bin = Reducer::<()>::init(&Count);
        Reducer::<()>::add(&Count, &mut bin, &());
        Reducer::<()>::remove(&Count, &mut bin, &());
        Reducer::<()>::remove(&Count, &mut bin, &());
        assert_eq!(bin, 0);
    }
}
