//! Temporal bin granularities

use crate::histo::HistoError;
use crate::time::CalendarUnit;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Granularity of a date histogram
///
/// The `*Of*` kinds are cyclic: their keys are positions inside a larger
/// period (hour 0-23 of a day, day 0-6 of a week) and wrap around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateBinType {
    /// One bin per distinct timestamp
    Unique,
    Minute,
    MinuteOfHour,
    Hour,
    HourOfDay,
    HourOfWeek,
    HourOfMonth,
    HourOfYear,
    Day,
    /// Sunday = 0
    DayOfWeek,
    DayOfMonth,
    DayOfYear,
    /// Weeks start on Sunday
    Week,
    Month,
    MonthOfYear,
    Year,
}

impl DateBinType {
    pub const ALL: [DateBinType; 16] = [
        Self::Unique,
        Self::Minute,
        Self::MinuteOfHour,
        Self::Hour,
        Self::HourOfDay,
        Self::HourOfWeek,
        Self::HourOfMonth,
        Self::HourOfYear,
        Self::Day,
        Self::DayOfWeek,
        Self::DayOfMonth,
        Self::DayOfYear,
        Self::Week,
        Self::Month,
        Self::MonthOfYear,
        Self::Year,
    ];

    /// Whether keys wrap around within a larger period
    pub fn is_cyclic(&self) -> bool {
        self.cycle_len().is_some()
    }

    /// Number of distinct keys of a cyclic kind
    pub fn cycle_len(&self) -> Option<i64> {
        match self {
            Self::MinuteOfHour => Some(60),
            Self::HourOfDay => Some(24),
            Self::HourOfWeek => Some(7 * 24),
            Self::HourOfMonth => Some(31 * 24),
            Self::HourOfYear => Some(366 * 24),
            Self::DayOfWeek => Some(7),
            Self::DayOfMonth => Some(31),
            Self::DayOfYear => Some(366),
            Self::MonthOfYear => Some(12),
            _ => None,
        }
    }

    /// Calendar unit one bucket spans; None for `Unique`
    pub fn step_unit(&self) -> Option<CalendarUnit> {
        match self {
            Self::Unique => None,
            Self::Minute | Self::MinuteOfHour => Some(CalendarUnit::Minute),
            Self::Hour
            | Self::HourOfDay
            | Self::HourOfWeek
            | Self::HourOfMonth
            | Self::HourOfYear => Some(CalendarUnit::Hour),
            Self::Day | Self::DayOfWeek | Self::DayOfMonth | Self::DayOfYear => {
                Some(CalendarUnit::Day)
            }
            Self::Week => Some(CalendarUnit::Week),
            Self::Month | Self::MonthOfYear => Some(CalendarUnit::Month),
            Self::Year => Some(CalendarUnit::Year),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unique => "unique",
            Self::Minute => "minute",
            Self::MinuteOfHour => "minute-of-hour",
            Self::Hour => "hour",
            Self::HourOfDay => "hour-of-day",
            Self::HourOfWeek => "hour-of-week",
            Self::HourOfMonth => "hour-of-month",
            Self::HourOfYear => "hour-of-year",
            Self::Day => "day",
            Self::DayOfWeek => "day-of-week",
            Self::DayOfMonth => "day-of-month",
            Self::DayOfYear => "day-of-year",
            Self::Week => "week",
            Self::Month => "month",
            Self::MonthOfYear => "month-of-year",
            Self::Year => "year",
        }
    }
}

impl FromStr for DateBinType {
    type Err = HistoError;

    /// Parse a name such as `hour-of-day`; case, `_` and spaces are ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name() == normalized)
            .ok_or_else(|| HistoError::UnknownBinType(s.to_string()))
    }
}

impl fmt::Display for DateBinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        for bin_type in DateBinType::ALL {
            assert_eq!(bin_type.to_string().parse::<DateBinType>().unwrap(), bin_type);
        }
        assert_eq!("Hour_Of_Day".parse::<DateBinType>().unwrap(), DateBinType::HourOfDay);
        assert!(matches!(
            "fortnight".parse::<DateBinType>(),
            Err(HistoError::UnknownBinType(name)) if name == "fortnight"
        ));
    }

    #[test]
    fn test_cyclic_kinds() {
        let cyclic: Vec<DateBinType> = DateBinType::ALL
            .into_iter()
            .filter(DateBinType::is_cyclic)
            .collect();

        assert_eq!(cyclic.len(), 9);
        assert!(cyclic.iter().all(|t| t.name().contains("-of-")));
        assert_eq!(DateBinType::HourOfDay.cycle_len(), Some(24));
        assert_eq!(DateBinType::Unique.step_unit(), None);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&DateBinType::DayOfWeek).unwrap();
        assert_eq!(json, "\"day-of-week\"");
        let parsed: DateBinType = serde_json::from_str("\"month-of-year\"").unwrap();
        assert_eq!(parsed, DateBinType::MonthOfYear);
    }
}
