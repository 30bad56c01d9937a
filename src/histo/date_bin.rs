//! DateBinMethod - derives bucket keys and labels from records
//!
//! Keys are plain integers:
//!
//! | bin type            | key                                     |
//! |---------------------|-----------------------------------------|
//! | unique              | the timestamp                           |
//! | minute .. year      | timestamp truncated to the unit (UTC)   |
//! | minute-of-hour      | 0..60                                   |
//! | hour-of-day         | 0..24                                   |
//! | hour-of-week        | weekday * 24 + hour (Sunday = 0)        |
//! | hour-of-month       | (day - 1) * 24 + hour                   |
//! | hour-of-year        | (ordinal - 1) * 24 + hour               |
//! | day-of-week         | 0..7 (Sunday = 0)                       |
//! | day-of-month        | day - 1                                 |
//! | day-of-year         | ordinal - 1                             |
//! | month-of-year       | month - 1                               |
//!
//! Records without a usable time map to [`MAGIC`].

use crate::histo::DateBinType;
use crate::index::{Accessor, FilterValue, Filterable, Key};
use crate::time::calendar::{self, CalendarUnit};
use crate::time::Interval;
use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Key of records without a usable time value
pub const MAGIC: i64 = -9_999_999_999_999;

/// Separates the halves of a composite key built from two dimensions
pub const KEY_SEPARATOR: &str = "@#@";

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

fn default_invalid_label() -> String {
    "Invalid Date".to_string()
}

/// Serializable settings of a `DateBinMethod`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBinConfig {
    pub bin_type: DateBinType,

    /// Label of the `MAGIC` key
    #[serde(default = "default_invalid_label")]
    pub invalid_label: String,
}

impl Default for DateBinConfig {
    fn default() -> Self {
        Self {
            bin_type: DateBinType::Day,
            invalid_label: default_invalid_label(),
        }
    }
}

/// Bucket key(s) of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BinValue {
    Key(i64),
    /// Every bucket a cyclic span touches, in walk order
    Keys(Vec<i64>),
}

impl BinValue {
    /// First key of the value
    pub fn first(&self) -> i64 {
        match self {
            BinValue::Key(k) => *k,
            BinValue::Keys(keys) => keys.first().copied().unwrap_or(MAGIC),
        }
    }

    pub fn to_vec(&self) -> Vec<i64> {
        match self {
            BinValue::Key(k) => vec![*k],
            BinValue::Keys(keys) => keys.clone(),
        }
    }
}

type ValueFn<T> = Rc<dyn Fn(&T) -> Option<Interval>>;

/// Temporal bucketing for records of type `T`
pub struct DateBinMethod<T> {
    config: DateBinConfig,
    value_fn: ValueFn<T>,
}

impl<T> Clone for DateBinMethod<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            value_fn: Rc::clone(&self.value_fn),
        }
    }
}

impl<T> fmt::Debug for DateBinMethod<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DateBinMethod")
            .field("config", &self.config)
            .finish()
    }
}

impl<T: 'static> DateBinMethod<T> {
    /// Create a method reading each record's time (an instant or a span)
    /// with `value_fn`
    pub fn new(bin_type: DateBinType, value_fn: impl Fn(&T) -> Option<Interval> + 'static) -> Self {
        Self::from_config(
            DateBinConfig {
                bin_type,
                ..DateBinConfig::default()
            },
            value_fn,
        )
    }

    pub fn from_config(
        config: DateBinConfig,
        value_fn: impl Fn(&T) -> Option<Interval> + 'static,
    ) -> Self {
        Self {
            config,
            value_fn: Rc::new(value_fn),
        }
    }

    pub fn config(&self) -> &DateBinConfig {
        &self.config
    }

    pub fn bin_type(&self) -> DateBinType {
        self.config.bin_type
    }

    /// Whether records may carry several keys
    pub fn is_array_key(&self) -> bool {
        self.config.bin_type.is_cyclic()
    }

    // ==================== Key Methods ====================

    /// Bucket key(s) of a record
    ///
    /// Cyclic kinds with a distinct end yield every bucket touched between
    /// start and end, wrapping around the period. A start outside the
    /// calendar (open starts included) is keyed from the end; only records
    /// where neither bound converts get `MAGIC`.
    pub fn get_value(&self, record: &T) -> BinValue {
        let Some(interval) = (self.value_fn)(record) else {
            return BinValue::Key(MAGIC);
        };

        let start = self.get_bin_key(interval.start);
        let key = if start == MAGIC {
            self.get_bin_key(interval.end)
        } else {
            start
        };
        if !self.is_array_key() || interval.is_instant() || key == MAGIC {
            return BinValue::Key(key);
        }
        if start == MAGIC {
            // unbounded towards the past: every bucket of the cycle is touched
            return match self.config.bin_type.cycle_len() {
                Some(len) => BinValue::Keys((0..len).collect()),
                None => BinValue::Key(key),
            };
        }
        BinValue::Keys(self.walk_keys(interval))
    }

    /// Key of a single instant
    pub fn get_bin_key(&self, timestamp: i64) -> i64 {
        bin_key(self.config.bin_type, timestamp).unwrap_or(MAGIC)
    }

    fn walk_keys(&self, interval: Interval) -> Vec<i64> {
        let bin_type = self.config.bin_type;
        let (Some(unit), Some(cycle_len)) = (bin_type.step_unit(), bin_type.cycle_len()) else {
            return vec![self.get_bin_key(interval.start)];
        };

        // two full periods are enough to see every reachable key
        let max_steps = cycle_len * 2;
        let mut seen = HashSet::new();
        let mut keys = Vec::new();

        let mut t = calendar::truncate(interval.start, unit).unwrap_or(interval.start);
        let mut steps = 0;
        while t <= interval.end {
            let key = self.get_bin_key(t);
            if key != MAGIC && seen.insert(key) {
                keys.push(key);
            }
            steps += 1;
            if seen.len() as i64 >= cycle_len {
                break;
            }
            if steps >= max_steps {
                tracing::debug!(%interval, bin_type = %bin_type, "Span covers every bucket");
                return (0..cycle_len).collect();
            }
            match calendar::add_units(t, unit, 1) {
                Some(next) => t = next,
                None => break,
            }
        }

        if keys.is_empty() {
            keys.push(self.get_bin_key(interval.start));
        }
        keys
    }

    /// Width of the bucket starting at `key`
    ///
    /// Month and year widths follow the calendar; cyclic keys are one
    /// position wide.
    pub fn bin_width(&self, key: i64) -> i64 {
        if key == MAGIC || self.is_array_key() {
            return 1;
        }
        match self.config.bin_type.step_unit() {
            Some(unit) => calendar::unit_width(key, unit).unwrap_or(1),
            None => 1,
        }
    }

    // ==================== Label Methods ====================

    /// Display label of a key
    ///
    /// Composite text keys are split on [`KEY_SEPARATOR`] and the primary
    /// (or, with `is_secondary`, the secondary) half is decoded.
    pub fn get_label_for_key(&self, key: &Key, is_secondary: bool) -> String {
        match key {
            Key::Int(k) => self.label_for(*k),
            Key::Text(text) => {
                let mut halves = text.splitn(2, KEY_SEPARATOR);
                let primary = halves.next().unwrap_or_default();
                let part = if is_secondary {
                    halves.next().unwrap_or_default()
                } else {
                    primary
                };
                match part.trim().parse::<i64>() {
                    Ok(k) => self.label_for(k),
                    Err(_) => part.to_string(),
                }
            }
            Key::Float(f) => self.label_for(f.into_inner() as i64),
            _ => self.config.invalid_label.clone(),
        }
    }

    /// Label of a record's first key
    pub fn get_bin_label(&self, record: &T) -> String {
        self.label_for(self.get_value(record).first())
    }

    fn label_for(&self, key: i64) -> String {
        if key == MAGIC {
            return self.config.invalid_label.clone();
        }
        format_key(self.config.bin_type, key).unwrap_or_else(|| self.config.invalid_label.clone())
    }

    // ==================== Index Methods ====================

    /// Dimension accessor producing this method's keys
    pub fn accessor(&self) -> Accessor<T> {
        let method = self.clone();
        if self.is_array_key() {
            Accessor::array(move |record| {
                method
                    .get_value(record)
                    .to_vec()
                    .into_iter()
                    .map(Key::Int)
                    .collect()
            })
        } else {
            Accessor::single(move |record| Key::Int(method.get_value(record).first()))
        }
    }

    /// Narrow `target`'s dimension to the bucket(s) of `record`
    pub fn filter_dimension(&self, target: &mut impl Filterable, dimension_id: &str, record: &T) {
        let value = match self.get_value(record) {
            BinValue::Key(MAGIC) => FilterValue::exact(MAGIC),
            BinValue::Key(key) => {
                FilterValue::range(key, key.saturating_add(self.bin_width(key)))
            }
            BinValue::Keys(keys) => {
                let keys: HashSet<Key> = keys.into_iter().map(Key::Int).collect();
                FilterValue::predicate(move |k| keys.contains(k))
            }
        };
        target.filter_dimension(dimension_id, Some(value));
    }
}

fn bin_key(bin_type: DateBinType, timestamp: i64) -> Option<i64> {
    let dt = calendar::to_datetime(timestamp)?;
    let hour = dt.hour() as i64;
    let weekday = dt.weekday().num_days_from_sunday() as i64;
    let day0 = dt.day0() as i64;
    let ordinal0 = dt.ordinal0() as i64;

    let key = match bin_type {
        DateBinType::Unique => timestamp,
        DateBinType::Minute => calendar::truncate(timestamp, CalendarUnit::Minute)?,
        DateBinType::Hour => calendar::truncate(timestamp, CalendarUnit::Hour)?,
        DateBinType::Day => calendar::truncate(timestamp, CalendarUnit::Day)?,
        DateBinType::Week => calendar::truncate(timestamp, CalendarUnit::Week)?,
        DateBinType::Month => calendar::truncate(timestamp, CalendarUnit::Month)?,
        DateBinType::Year => calendar::truncate(timestamp, CalendarUnit::Year)?,
        DateBinType::MinuteOfHour => dt.minute() as i64,
        DateBinType::HourOfDay => hour,
        DateBinType::HourOfWeek => weekday * 24 + hour,
        DateBinType::HourOfMonth => day0 * 24 + hour,
        DateBinType::HourOfYear => ordinal0 * 24 + hour,
        DateBinType::DayOfWeek => weekday,
        DateBinType::DayOfMonth => day0,
        DateBinType::DayOfYear => ordinal0,
        DateBinType::MonthOfYear => dt.month0() as i64,
    };
    Some(key)
}

fn format_key(bin_type: DateBinType, key: i64) -> Option<String> {
    if let Some(cycle_len) = bin_type.cycle_len() {
        if !(0..cycle_len).contains(&key) {
            return None;
        }
    }

    let label = match bin_type {
        DateBinType::MinuteOfHour => format!(":{:02}", key),
        DateBinType::HourOfDay => format!("{:02}00", key),
        DateBinType::HourOfWeek => {
            let day = DAY_NAMES[(key / 24) as usize];
            format!("{} {:02}00", &day[..3], key % 24)
        }
        DateBinType::HourOfMonth => format!("{:02} {:02}00", key / 24 + 1, key % 24),
        DateBinType::HourOfYear => format!("{:03} {:02}00", key / 24 + 1, key % 24),
        DateBinType::DayOfWeek => DAY_NAMES[key as usize].to_string(),
        DateBinType::DayOfMonth => format!("{:02}", key + 1),
        DateBinType::DayOfYear => format!("{:03}", key + 1),
        DateBinType::MonthOfYear => MONTH_NAMES[key as usize].to_string(),
        DateBinType::Unique => date_format(key, "%Y-%m-%d %H:%M:%S%.3f")?,
        DateBinType::Minute => date_format(key, "%Y-%m-%d %H:%M")?,
        DateBinType::Hour => date_format(key, "%Y-%m-%d %H:00")?,
        DateBinType::Day | DateBinType::Week => date_format(key, "%Y-%m-%d")?,
        DateBinType::Month => date_format(key, "%Y-%m")?,
        DateBinType::Year => date_format(key, "%Y")?,
    };
    Some(label)
}

fn date_format(timestamp: i64, format: &str) -> Option<String> {
    calendar::to_datetime(timestamp).map(|dt| dt.format(format).to_string())
}
