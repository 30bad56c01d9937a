//! Calendar arithmetic in UTC
//!
//! Truncation to the start of a calendar unit and stepping by whole units.
//! Weeks start on Sunday so that week buckets line up with day-of-week keys.
//! Every helper returns `None` for timestamps chrono cannot represent.

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

pub const MS_PER_MINUTE: i64 = 60 * 1000;
pub const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;
pub const MS_PER_WEEK: i64 = 7 * MS_PER_DAY;

/// Calendar units used for truncation and stepping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl CalendarUnit {
    /// Fixed length in milliseconds, or None for month and year
    pub fn fixed_millis(&self) -> Option<i64> {
        match self {
            Self::Minute => Some(MS_PER_MINUTE),
            Self::Hour => Some(MS_PER_HOUR),
            Self::Day => Some(MS_PER_DAY),
            Self::Week => Some(MS_PER_WEEK),
            Self::Month | Self::Year => None,
        }
    }
}

/// Convert epoch milliseconds to a UTC datetime
pub fn to_datetime(timestamp: i64) -> Option<DateTime<Utc>> {
    match Utc.timestamp_millis_opt(timestamp) {
        chrono::LocalResult::Single(dt) => Some(dt),
        _ => None,
    }
}

/// Truncate a timestamp to the start of its calendar unit
pub fn truncate(timestamp: i64, unit: CalendarUnit) -> Option<i64> {
    let dt = to_datetime(timestamp)?;

    let truncated = match unit {
        CalendarUnit::Minute => dt.with_second(0)?.with_nanosecond(0)?,
        CalendarUnit::Hour => dt.with_minute(0)?.with_second(0)?.with_nanosecond(0)?,
        CalendarUnit::Day => start_of_day(dt)?,
        CalendarUnit::Week => {
            let days_since_sunday = dt.weekday().num_days_from_sunday() as i64;
            start_of_day(dt.checked_sub_signed(Duration::days(days_since_sunday))?)?
        }
        CalendarUnit::Month => start_of_day(dt.with_day(1)?)?,
        CalendarUnit::Year => start_of_day(dt.with_day(1)?.with_month(1)?)?,
    };

    Some(truncated.timestamp_millis())
}

/// Step a timestamp forward by `count` whole units
///
/// Month and year steps are calendar-aware (a month step from Jan 31 lands on
/// the last day of February).
pub fn add_units(timestamp: i64, unit: CalendarUnit, count: u32) -> Option<i64> {
    if let Some(millis) = unit.fixed_millis() {
        return timestamp.checked_add(millis.checked_mul(count as i64)?);
    }

    let dt = to_datetime(timestamp)?;
    let months = match unit {
        CalendarUnit::Year => count.checked_mul(12)?,
        _ => count,
    };
    dt.checked_add_months(Months::new(months))
        .map(|d| d.timestamp_millis())
}

/// Width in milliseconds of the unit starting at `timestamp`
pub fn unit_width(timestamp: i64, unit: CalendarUnit) -> Option<i64> {
    let next = add_units(timestamp, unit, 1)?;
    Some(next - timestamp)
}

fn start_of_day(dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    dt.with_hour(0)?
        .with_minute(0)?
        .with_second(0)?
        .with_nanosecond(0)
}
