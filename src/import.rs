//! Record Import
//!
//! Loads interval records from CSV or JSON-lines files for the CLI and the
//! benchmarks. Each record has an id, an optional start and an optional end;
//! a record with neither bound is timeless.
//!
//! Timestamps may be epoch milliseconds or dates in a handful of common
//! formats. Rows that fail to parse are counted and reported, not fatal.

use crate::time::Interval;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while loading records
#[derive(Error, Debug)]
pub enum ImportError {
    /// File could not be opened or read
    #[error("Failed to read {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    /// CSV reader error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Unsupported input format
    #[error("Unknown record format: {0}")]
    UnknownFormat(String),
}

/// One record read from a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRecord {
    pub id: String,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
}

impl IntervalRecord {
    /// The record's time, if it has at least one bound
    pub fn interval(&self) -> Option<Interval> {
        Interval::from_bounds(self.start, self.end)
    }
}

/// Input file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Csv,
    /// One JSON object per line
    JsonLines,
}

impl RecordFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" | "jsonl" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

impl FromStr for RecordFormat {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" | "jsonl" | "ndjson" => Ok(Self::JsonLines),
            other => Err(ImportError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::JsonLines => write!(f, "json"),
        }
    }
}

/// Result of an import
#[derive(Debug, Default)]
pub struct ImportResult {
    pub records: Vec<IntervalRecord>,
    pub rows_failed: usize,
    pub errors: Vec<String>,
}

impl ImportResult {
    fn fail(&mut self, line: usize, error: impl fmt::Display) {
        self.rows_failed += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(format!("Line {}: {}", line, error));
        }
    }
}

const MAX_REPORTED_ERRORS: usize = 100;

/// Load records from a file, detecting the format from its extension when
/// none is given
pub fn load_records(path: &Path, format: Option<RecordFormat>) -> Result<ImportResult, ImportError> {
    let format = match format.or_else(|| RecordFormat::from_path(path)) {
        Some(format) => format,
        None => {
            return Err(ImportError::UnknownFormat(
                path.extension()
                    .map(|e| e.to_string_lossy().to_string())
                    .unwrap_or_default(),
            ))
        }
    };

    let file = std::fs::File::open(path).map_err(|e| ImportError::Io {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let result = match format {
        RecordFormat::Csv => read_csv(file)?,
        RecordFormat::JsonLines => read_json_lines(file, path)?,
    };

    tracing::info!(
        path = %path.display(),
        %format,
        records = result.records.len(),
        failed = result.rows_failed,
        "Loaded records"
    );
    Ok(result)
}

/// Read CSV with an `id,start,end[,category]` header; empty cells are
/// missing bounds
pub fn read_csv(reader: impl Read) -> Result<ImportResult, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let (id_col, start_col, end_col, category_col) =
        (column("id"), column("start"), column("end"), column("category"));

    let mut result = ImportResult::default();
    for (line_num, row) in reader.records().enumerate() {
        let line = line_num + 2;
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                result.fail(line, e);
                continue;
            }
        };

        let cell = |col: Option<usize>| {
            col.and_then(|c| row.get(c))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let start = match cell(start_col).map(|s| parse_timestamp(&s)).transpose() {
            Ok(start) => start,
            Err(e) => {
                result.fail(line, e);
                continue;
            }
        };
        let end = match cell(end_col).map(|s| parse_timestamp(&s)).transpose() {
            Ok(end) => end,
            Err(e) => {
                result.fail(line, e);
                continue;
            }
        };

        result.records.push(IntervalRecord {
            id: cell(id_col).unwrap_or_else(|| line.to_string()),
            start,
            end,
            category: cell(category_col),
        });
    }
    Ok(result)
}

/// Read one JSON object per line; blank lines are skipped
pub fn read_json_lines(reader: impl Read, path: &Path) -> Result<ImportResult, ImportError> {
    let mut result = ImportResult::default();

    for (line_num, line) in BufReader::new(reader).lines().enumerate() {
        let line_no = line_num + 1;
        let line = line.map_err(|e| ImportError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<IntervalRecord>(&line) {
            Ok(record) => result.records.push(record),
            Err(e) => result.fail(line_no, e),
        }
    }
    Ok(result)
}

/// Parse epoch milliseconds, RFC 3339 or a common date/time format (UTC)
pub fn parse_timestamp(s: &str) -> Result<i64, String> {
    if let Ok(ms) = s.parse::<i64>() {
        return Ok(ms);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc).timestamp_millis());
    }

    let formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
    for fmt in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(dt.and_utc().timestamp_millis());
            }
        }
    }

    Err(format!("Could not parse timestamp: {}", s))
}
