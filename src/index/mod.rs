//! Timecube Index Structures
//!
//! In-memory dimensional indexes over record sets:
//!
//! - **DimensionalIndex**: one record set, any number of named, independently
//!   filterable dimensions, transient group/reduce queries
//! - **TimeIndex**: a dimensional index partitioned by time availability
//!   (`main`, `timeless`, `holds`) with interval-start/end dimensions and
//!   time-range intersection
//! - **IndexManager**: reference-counted ownership of shared time indexes
//!
//! # Architecture
//!
//! ```text
//! add(records) ──► arena (owns records, hands out RecordIds)
//!                    │
//!                    ▼
//!              Partition(s): per-record filter bitmask
//!                    │        + one sorted DimensionCursor per dimension
//!                    ▼
//! filter_dimension ─► cursor range scan ─► flip one mask bit per record
//! get_results      ─► walk a cursor in key order, keep mask == 0
//! group_data       ─► walk a cursor, keep records passing all *other* filters
//! ```

mod arena;
mod dimension;
mod dimensional;
mod events;
mod key;
mod manager;
mod partition;
mod reduce;
mod time_index;

pub use dimension::{Accessor, FilterValue};
pub use dimensional::DimensionalIndex;
pub use events::{IndexEvent, ListenerId};
pub use key::Key;
pub use manager::{IndexConfig, IndexManager, SharedTimeIndex};
pub use reduce::{Count, GroupResult, ReduceFns, Reducer};
pub use time_index::{TimeIndex, DEFAULT_DIMENSION, END_DIMENSION, START_DIMENSION};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of dimensions a single partition can carry
///
/// Each dimension owns one bit of the per-record filter mask.
pub const MAX_DIMENSIONS: usize = 64;

/// Handle to a record stored in an index arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub(crate) usize);

impl RecordId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything whose named dimensions can be filtered
///
/// Implemented by both index types so the bucketing strategy can apply
/// per-record bucket filters without knowing which index it talks to.
pub trait Filterable {
    /// Set the active filter on a dimension; `None` clears it
    fn filter_dimension(&mut self, id: &str, value: Option<FilterValue>);
}

/// Statistics about index contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Live records across all partitions (holds are not counted twice)
    pub records: usize,
    /// Records in the time-bearing partition
    pub main: usize,
    /// Records without a usable time value
    pub timeless: usize,
    /// Records held visible regardless of the time window
    pub holds: usize,
    /// Custom dimensions defined on the index
    pub dimensions: usize,
    /// Dimensions with an active (non-`All`) filter
    pub active_filters: usize,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "records={} main={} timeless={} holds={} dimensions={} filters={}",
            self.records, self.main, self.timeless, self.holds, self.dimensions, self.active_filters
        )
    }
}
