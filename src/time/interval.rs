//! Time intervals for indexed records
//!
//! An `Interval` is closed on both ends and may be an instant (`start == end`).
//! Missing bounds are represented by the `MIN_TIME` / `MAX_TIME` sentinels so
//! that comparisons between intervals stay total.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Earliest representable time, used for a missing start bound
pub const MIN_TIME: i64 = -8_640_000_000_000_000;

/// Latest representable time, used for a missing end bound
pub const MAX_TIME: i64 = 8_640_000_000_000_000;

/// A time interval in epoch milliseconds: `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    /// Start timestamp (inclusive), in milliseconds
    pub start: i64,
    /// End timestamp (inclusive), in milliseconds
    pub end: i64,
}

impl Interval {
    /// Create a new interval
    ///
    /// # Panics
    /// Panics if start > end
    pub fn new(start: i64, end: i64) -> Self {
        assert!(start <= end, "Interval: start must not be after end");
        Self { start, end }
    }

    /// Create an interval, returning None if start > end
    pub fn try_new(start: i64, end: i64) -> Option<Self> {
        if start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Create an interval from optional bounds, substituting the sentinels
    /// for missing ones. Returns None if both bounds are missing or the
    /// bounds are reversed.
    pub fn from_bounds(start: Option<i64>, end: Option<i64>) -> Option<Self> {
        match (start, end) {
            (None, None) => None,
            (Some(s), None) => Some(Self::from_start(s)),
            (None, Some(e)) => Some(Self::until(e)),
            (Some(s), Some(e)) => Self::try_new(s, e),
        }
    }

    /// A single instant
    pub fn instant(timestamp: i64) -> Self {
        Self {
            start: timestamp,
            end: timestamp,
        }
    }

    /// An interval with no end bound
    pub fn from_start(start: i64) -> Self {
        Self {
            start,
            end: MAX_TIME,
        }
    }

    /// An interval with no start bound
    pub fn until(end: i64) -> Self {
        Self {
            start: MIN_TIME,
            end,
        }
    }

    /// The interval covering all representable time
    pub fn unbounded() -> Self {
        Self {
            start: MIN_TIME,
            end: MAX_TIME,
        }
    }

    pub fn is_instant(&self) -> bool {
        self.start == self.end
    }

    pub fn has_open_start(&self) -> bool {
        self.start <= MIN_TIME
    }

    pub fn has_open_end(&self) -> bool {
        self.end >= MAX_TIME
    }

    /// Get the duration in milliseconds
    pub fn duration_millis(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }

    /// Check if a timestamp falls within this interval
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Check if this interval shares at least one instant with another
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    /// Get the intersection with another interval, if any
    pub fn intersection(&self, other: &Interval) -> Option<Self> {
        Self::try_new(self.start.max(other.start), self.end.min(other.end))
    }

    /// Smallest interval covering both
    pub fn union(&self, other: &Interval) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl From<i64> for Interval {
    fn from(timestamp: i64) -> Self {
        Self::instant(timestamp)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
