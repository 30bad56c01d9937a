//! Partition - one physical sub-index
//!
//! Holds the ids of its member records, a filter bitmask per record and one
//! sorted cursor per dimension. A record passes the partition's filters when
//! its mask is zero; it passes "all filters but dimension d" when the mask is
//! zero after clearing d's bit.
//!
//! Partitions never see records, only ids and the keys the owning index
//! computed for them.

use crate::index::dimension::{DimensionCursor, FilterValue};
use crate::index::{Key, RecordId, MAX_DIMENSIONS};
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
pub(crate) struct Partition {
    name: &'static str,
    /// Member records → filter mask (bit set = rejected by that dimension)
    masks: HashMap<RecordId, u64>,
    dimensions: HashMap<String, DimensionCursor>,
    /// Mask slots in use
    used_slots: u64,
}

impl Partition {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            masks: HashMap::new(),
            dimensions: HashMap::new(),
            used_slots: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.masks.keys().copied()
    }

    // ==================== Dimension Methods ====================

    pub fn has_dimension(&self, id: &str) -> bool {
        self.dimensions.contains_key(id)
    }

    pub fn is_array(&self, id: &str) -> bool {
        self.dimensions.get(id).map(|c| c.is_array).unwrap_or(false)
    }

    /// Whether a new dimension named `id` would fit
    pub fn has_capacity_for(&self, id: &str) -> bool {
        self.has_dimension(id) || self.dimensions.len() < MAX_DIMENSIONS
    }

    /// Add (or replace) a dimension and index every member record under it
    ///
    /// Returns false, leaving the partition untouched, when every mask slot
    /// is taken.
    pub fn add_dimension(
        &mut self,
        id: &str,
        is_array: bool,
        mut keys_for: impl FnMut(RecordId) -> Vec<Key>,
    ) -> bool {
        if !self.has_capacity_for(id) {
            tracing::warn!(
                partition = self.name,
                dimension = id,
                "Dimension limit of {} reached",
                MAX_DIMENSIONS
            );
            return false;
        }

        self.remove_dimension(id);

        let slot = (!self.used_slots).trailing_zeros();
        self.used_slots |= 1u64 << slot;

        let mut cursor = DimensionCursor::new(slot, is_array);
        for record in self.masks.keys() {
            cursor.insert(*record, keys_for(*record));
        }
        self.dimensions.insert(id.to_string(), cursor);
        true
    }

    /// Drop a dimension, releasing its filter on every record
    pub fn remove_dimension(&mut self, id: &str) -> bool {
        match self.dimensions.remove(id) {
            Some(cursor) => {
                let bit = cursor.bit();
                for mask in self.masks.values_mut() {
                    *mask &= !bit;
                }
                self.used_slots &= !bit;
                true
            }
            None => false,
        }
    }

    /// Set a dimension's filter and recompute its mask bit for every record
    pub fn set_filter(&mut self, id: &str, filter: FilterValue) -> bool {
        let Some(cursor) = self.dimensions.get_mut(id) else {
            return false;
        };
        cursor.filter = filter;

        let bit = cursor.bit();
        match cursor.matching() {
            None => {
                for mask in self.masks.values_mut() {
                    *mask &= !bit;
                }
            }
            Some(matching) => {
                for (record, mask) in self.masks.iter_mut() {
                    if matching.contains(record) {
                        *mask &= !bit;
                    } else {
                        *mask |= bit;
                    }
                }
            }
        }
        true
    }

    pub fn filter(&self, id: &str) -> Option<&FilterValue> {
        self.dimensions.get(id).map(|c| &c.filter)
    }

    pub fn first_key(&self, id: &str) -> Option<&Key> {
        self.dimensions.get(id).and_then(|c| c.first_key())
    }

    pub fn last_key(&self, id: &str) -> Option<&Key> {
        self.dimensions.get(id).and_then(|c| c.last_key())
    }

    // ==================== Record Methods ====================

    /// Add a record, computing its keys for each dimension with `keys_for`
    pub fn insert(&mut self, record: RecordId, mut keys_for: impl FnMut(&str) -> Vec<Key>) {
        let mut mask = 0u64;
        for (id, cursor) in self.dimensions.iter_mut() {
            if !cursor.insert(record, keys_for(id)) {
                mask |= cursor.bit();
            }
        }
        self.masks.insert(record, mask);
    }

    pub fn remove(&mut self, record: RecordId) -> bool {
        if self.masks.remove(&record).is_none() {
            return false;
        }
        for cursor in self.dimensions.values_mut() {
            cursor.remove(record);
        }
        true
    }

    /// Remove every record; dimensions and their filters stay in place
    pub fn clear(&mut self) {
        self.masks.clear();
        for cursor in self.dimensions.values_mut() {
            cursor.clear();
        }
    }

    // ==================== Query Methods ====================

    /// Whether a record passes every filter of this partition
    pub fn passes(&self, record: RecordId) -> bool {
        self.masks.get(&record).map(|m| *m == 0).unwrap_or(false)
    }

    /// Whether a record passes every filter except the named dimension's
    #[cfg(test)]
    pub fn passes_except(&self, record: RecordId, id: &str) -> bool {
        let bit = self.dimensions.get(id).map(|c| c.bit()).unwrap_or(0);
        self.masks
            .get(&record)
            .map(|m| m & !bit == 0)
            .unwrap_or(false)
    }

    /// Records passing every filter, in the dimension's key order
    ///
    /// Records of array dimensions are reported once, at the first key reached
    /// in walk order. Records with no keys follow the keyed ones.
    /// Returns None when the dimension does not exist.
    pub fn ordered(
        &self,
        id: &str,
        descending: bool,
    ) -> Option<impl Iterator<Item = RecordId> + '_> {
        let cursor = self.dimensions.get(id)?;
        let mut seen = HashSet::new();
        let is_array = cursor.is_array;

        Some(
            cursor
                .entries(descending)
                .map(|(_, record)| *record)
                .filter(move |record| !is_array || seen.insert(*record))
                .chain(cursor.keyless())
                .filter(move |record| self.passes(*record)),
        )
    }

    /// Visit `(key, record)` for records passing every filter but the
    /// dimension's own, in key order. Array records are visited once per key.
    pub fn for_each_grouped(&self, id: &str, mut visit: impl FnMut(&Key, RecordId)) -> bool {
        let Some(cursor) = self.dimensions.get(id) else {
            return false;
        };
        let others = !cursor.bit();
        for (key, record) in cursor.entries(false) {
            if self.masks.get(record).map(|m| m & others == 0).unwrap_or(false) {
                visit(key, *record);
            }
        }
        true
    }

    /// Records passing every filter, in no particular order
    #[cfg(test)]
    pub fn passing(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.masks
            .iter()
            .filter(|(_, mask)| **mask == 0)
            .map(|(record, _)| *record)
    }

    pub fn active_filters(&self) -> usize {
        self.dimensions
            .values()
            .filter(|c| !c.filter.is_all())
            .count()
    }
}
