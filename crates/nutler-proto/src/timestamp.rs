//! Canonical message instants.
//!
//! The backend is not consistent about how it stamps messages: live push
//! events carry unix seconds, some bridges forward JavaScript milliseconds,
//! and history rows come back as SQLite `YYYY-MM-DD HH:MM:SS` strings in UTC.
//! [`Timestamp`] folds all of these into one instant with whole-second
//! precision so that equality (and therefore deduplication) does not depend
//! on which path a message took.
//!
//! # Unit detection
//!
//! A bare integer whose magnitude is at least [`MILLIS_THRESHOLD`] is read as
//! milliseconds, anything smaller as seconds. The threshold is 1973-03-03 in
//! milliseconds and year 5138 in seconds, so no realistic chat timestamp is
//! ambiguous.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{ProtocolError, Result};

/// Integer magnitude at and above which a unix timestamp is milliseconds.
pub const MILLIS_THRESHOLD: u64 = 100_000_000_000;

/// Naive formats accepted in addition to RFC 3339. Interpreted as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A message instant normalized to whole seconds in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Build from a unix value in either seconds or milliseconds.
    pub fn from_unix(value: i64) -> Result<Self> {
        if value.unsigned_abs() >= MILLIS_THRESHOLD {
            Self::from_unix_seconds(value.div_euclid(1000))
        } else {
            Self::from_unix_seconds(value)
        }
    }

    /// Build from unix seconds.
    pub fn from_unix_seconds(secs: i64) -> Result<Self> {
        DateTime::from_timestamp(secs, 0).map(Self).ok_or(ProtocolError::TimestampOutOfRange(secs))
    }

    /// Truncate an arbitrary instant to the canonical precision.
    pub fn from_datetime(instant: DateTime<Utc>) -> Result<Self> {
        Self::from_unix_seconds(instant.timestamp())
    }

    /// Seconds since the unix epoch.
    pub fn unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    /// The underlying instant.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl FromStr for Timestamp {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();

        if let Ok(value) = trimmed.parse::<i64>() {
            return Self::from_unix(value);
        }

        if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
            return Self::from_datetime(parsed.with_timezone(&Utc));
        }

        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
            .ok_or_else(|| ProtocolError::InvalidTimestamp(s.to_owned()))
            .and_then(|naive| Self::from_datetime(naive.and_utc()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Shapes a timestamp may take on the wire.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Unix(i64),
    Fractional(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let parsed = match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Unix(value) => Self::from_unix(value),
            RawTimestamp::Fractional(value) if value.is_finite() => Self::from_unix(value as i64),
            RawTimestamp::Fractional(value) => {
                Err(ProtocolError::InvalidTimestamp(value.to_string()))
            },
            RawTimestamp::Text(text) => text.parse(),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}
