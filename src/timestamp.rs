//! Strict parsers for the timestamp formats providers publish.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Instant carried by provider documents.
pub type Timestamp = DateTime<FixedOffset>;

/// `YYYY-MM-DDThh:mm:ss±hh:mm`, used by the abuse feed.
pub const OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// `YYYY-MM-DDThh:mm:ss.ffffff`, used by most JSON feeds. Interpreted as UTC.
pub const MICROS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// `YYYY-MM-DD-hh-mm-ss`, used by the AWS feed. Interpreted as UTC.
pub const DASHED_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

static OFFSET_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}[+-]\d{2}:\d{2}$").expect("valid regex")
});

static MICROS_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{6}$").expect("valid regex")
});

/// Parse `2022-07-06T21:18:45+00:00`.
pub fn parse_offset(s: &str) -> Result<Timestamp> {
    if !OFFSET_SHAPE.is_match(s) {
        return Err(Error::parse("timestamp", format!("{:?} does not match {}", s, OFFSET_FORMAT)));
    }
    DateTime::parse_from_str(s, OFFSET_FORMAT).map_err(|e| Error::parse("timestamp", format!("{:?}: {}", s, e)))
}

/// Parse `2022-07-06T21:18:45.123456`.
pub fn parse_micros(s: &str) -> Result<Timestamp> {
    if !MICROS_SHAPE.is_match(s) {
        return Err(Error::parse(
            "timestamp",
            format!("{:?} does not match YYYY-MM-DDThh:mm:ss.ffffff", s),
        ));
    }
    parse_naive_utc(s, MICROS_FORMAT)
}

/// Parse `2022-07-06-21-18-45`.
pub fn parse_dashed(s: &str) -> Result<Timestamp> {
    parse_naive_utc(s, DASHED_FORMAT)
}

fn parse_naive_utc(s: &str, format: &str) -> Result<Timestamp> {
    let naive = NaiveDateTime::parse_from_str(s, format)
        .map_err(|e| Error::parse("timestamp", format!("{:?}: {}", s, e)))?;
    Ok(Utc.from_utc_datetime(&naive).into())
}
