//! Temporal bucketing for date histograms
//!
//! - **bin_type**: the sixteen `DateBinType` granularities
//! - **date_bin**: `DateBinMethod`, which turns a record's time into bucket
//!   keys, labels and per-record filters
//!
//! ```text
//! record ──value_fn──► Interval ──► key(s) ──► index dimension
//!                                      │
//!                                      └──► label ("0500", "2024-03", ...)
//! ```

mod bin_type;
mod date_bin;

pub use bin_type::DateBinType;
pub use date_bin::{BinValue, DateBinConfig, DateBinMethod, KEY_SEPARATOR, MAGIC};

use thiserror::Error;

/// Errors raised while configuring bucketing
#[derive(Error, Debug)]
pub enum HistoError {
    /// Bin type name not recognised
    #[error("Unknown bin type: {0}")]
    UnknownBinType(String),
}
