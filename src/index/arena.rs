//! Record arena
//!
//! Owns the records of an index. Removal leaves a tombstone so outstanding
//! `RecordId`s never alias a different record; `clear` resets the arena.

use crate::index::RecordId;

#[derive(Debug)]
pub(crate) struct RecordArena<T> {
    slots: Vec<Option<T>>,
    live: usize,
}

impl<T> RecordArena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
        }
    }

    pub fn insert(&mut self, record: T) -> RecordId {
        let id = RecordId(self.slots.len());
        self.slots.push(Some(record));
        self.live += 1;
        id
    }

    pub fn get(&self, id: RecordId) -> Option<&T> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn remove(&mut self, id: RecordId) -> Option<T> {
        let removed = self.slots.get_mut(id.0).and_then(Option::take);
        if removed.is_some() {
            self.live -= 1;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.live = 0;
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|r| (RecordId(i), r)))
    }

    pub fn reserve(&mut self, additional: usize) {
        self.slots.reserve(additional);
    }
}
