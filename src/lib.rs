//! # Timecube
//!
//! In-memory multi-dimensional analysis over time-interval records: a
//! crossfilter-style dimensional index, a time-partitioned variant with
//! range intersection, and temporal bucketing for date histograms.
//!
//! ## Modules
//!
//! - [`index`]: dimensional and time-partitioned indexes, reducers, manager
//! - [`histo`]: `DateBinType` granularities and the `DateBinMethod` strategy
//! - [`time`]: intervals and UTC calendar arithmetic
//! - [`import`]: CSV / JSON-lines record loading
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust
//! use timecube::histo::{DateBinMethod, DateBinType};
//! use timecube::index::{Count, TimeIndex};
//! use timecube::time::Interval;
//!
//! let mut index = TimeIndex::new(|r: &Option<Interval>| *r);
//! index.add(vec![
//!     Some(Interval::new(0, 3_600_000)),
//!     Some(Interval::instant(7_200_000)),
//!     None,
//! ]);
//!
//! let bins = DateBinMethod::new(DateBinType::HourOfDay, |r: &Option<Interval>| *r);
//! index.add_dimension_with("hour", bins.accessor());
//!
//! let visible = index.intersection(Interval::new(0, 3_600_000), false, false);
//! assert_eq!(visible.len(), 1);
//!
//! for group in index.group_data("hour", |k| k.clone(), &Count) {
//!     println!("{} {}", bins.get_label_for_key(&group.key, false), group.value);
//! }
//! ```

pub mod config;
pub mod histo;
pub mod import;
pub mod index;
pub mod time;

// Re-export top-level types for convenience
pub use config::{Config, ConfigError, HistogramConfig, LoggingConfig};

pub use histo::{BinValue, DateBinConfig, DateBinMethod, DateBinType, HistoError};

pub use import::{ImportError, ImportResult, IntervalRecord, RecordFormat};

pub use index::{
    DimensionalIndex, FilterValue, IndexConfig, IndexEvent, IndexManager, IndexStats, Key,
    TimeIndex,
};

pub use time::Interval;
