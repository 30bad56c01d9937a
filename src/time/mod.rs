//! Time primitives shared by the indexes and the bucketing strategy
//!
//! - **interval**: `Interval` plus the `MIN_TIME`/`MAX_TIME` sentinels
//! - **calendar**: UTC truncation and stepping over calendar units
//!
//! All timestamps are Unix epoch milliseconds, interpreted in UTC.

pub mod calendar;
pub mod interval;

pub use calendar::{CalendarUnit, MS_PER_DAY, MS_PER_HOUR, MS_PER_MINUTE, MS_PER_WEEK};
pub use interval::{Interval, MAX_TIME, MIN_TIME};
