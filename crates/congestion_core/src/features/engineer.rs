//! Calendar features derived from the record timestamp
//!
//! Timestamps are interpreted as wall-clock time in a single canonical zone;
//! no timezone conversion is ever applied.

use crate::errors::{CongestionError, Result};
use crate::record::Record;
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

const TIMESTAMP_LAYOUT: &str = "YYYY-MM-DDThh:mm:ss";

/// A record plus its calendar-derived features.
///
/// Derived fields are computed once in `engineer` and only exposed through
/// accessors, so they can never drift from the timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineeredRecord {
    record: Record,
    hour_of_day: u32,
    day_of_week: u32,
    month: u32,
}

impl EngineeredRecord {
    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn hour_of_day(&self) -> u32 {
        self.hour_of_day
    }

    /// 0 = Monday .. 6 = Sunday
    pub fn day_of_week(&self) -> u32 {
        self.day_of_week
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn is_weekday(&self) -> u32 {
        u32::from(self.day_of_week < 5)
    }
}

/// Parse a timestamp without guessing.
///
/// Accepts ISO-8601 date-times with `T` or space separator and optional
/// fractional seconds, or RFC 3339 with an explicit offset (the written
/// wall-clock time is kept). Every date and time field must be zero-padded.
/// Anything else is rejected as ambiguous.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    let rejected = || {
        CongestionError::invalid_input(
            "timestamp",
            format!("unrecognized or ambiguous timestamp `{raw}` (expected {TIMESTAMP_LAYOUT})"),
        )
    };

    // chrono accepts unpadded fields, so the fixed-width prefix is checked first
    if !has_padded_prefix(raw) {
        return Err(rejected());
    }

    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(parsed);
        }
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_local())
        .map_err(|_| rejected())
}

/// Fixed-width `YYYY-MM-DDThh:mm:ss` prefix, every field zero-padded; the
/// `T` may also be a space
fn has_padded_prefix(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= TIMESTAMP_LAYOUT.len()
        && TIMESTAMP_LAYOUT
            .bytes()
            .zip(bytes)
            .all(|(expected, &actual)| match expected {
                b'Y' | b'M' | b'D' | b'h' | b'm' | b's' => actual.is_ascii_digit(),
                b'T' => actual == b'T' || actual == b' ',
                separator => actual == separator,
            })
}

/// Derive calendar features from a record's timestamp
pub fn engineer(record: &Record) -> Result<EngineeredRecord> {
    let raw = record
        .timestamp
        .as_deref()
        .ok_or_else(|| CongestionError::invalid_input("timestamp", "field is missing"))?;
    let ts = parse_timestamp(raw)?;

    Ok(EngineeredRecord {
        record: record.clone(),
        hour_of_day: ts.hour(),
        day_of_week: ts.weekday().num_days_from_monday(),
        month: ts.month(),
    })
}
