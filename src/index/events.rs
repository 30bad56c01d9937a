//! Change notifications
//!
//! Indexes notify subscribers synchronously, after the mutation completed.

use crate::time::Interval;
use std::fmt;

/// Something changed in an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    /// Records were inserted
    Added(usize),
    /// Records were removed
    Removed(usize),
    /// All records were removed
    Cleared,
    DimensionAdded(String),
    DimensionRemoved(String),
    /// A dimension's filter changed
    Filtered(String),
    /// The cached data range of a time index changed
    RangeChanged(Option<Interval>),
    Disposed,
}

/// Handle returned by `subscribe`
pub type ListenerId = usize;

type Listener = Box<dyn Fn(&IndexEvent)>;

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: ListenerId,
    listeners: Vec<(ListenerId, Listener)>,
}

impl Listeners {
    pub fn subscribe(&mut self, listener: impl Fn(&IndexEvent) + 'static) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn emit(&self, event: IndexEvent) {
        for (_, listener) in &self.listeners {
            listener(&event);
        }
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::default();

        let sink = Rc::clone(&seen);
        let id = listeners.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        listeners.emit(IndexEvent::Added(3));
        assert!(listeners.unsubscribe(id));
        assert!(!listeners.unsubscribe(id));
        listeners.emit(IndexEvent::Cleared);

        assert_eq!(*seen.borrow(), vec![IndexEvent::Added(3)]);
    }
}
