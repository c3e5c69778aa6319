//! UTC timestamps normalized to millisecond precision.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const WIRE_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

/// Point in time as carried on the wire: `YYYY-MM-DDTHH:MM:SS.mmmZ`.
///
/// Every constructor truncates to whole milliseconds, so two timestamps that
/// print the same always compare equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimestampParseError(String);

impl fmt::Display for TimestampParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not an ISO 8601 datetime", self.0)
    }
}

impl std::error::Error for TimestampParseError {}

impl Timestamp {
    /// Current UTC time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        let millis = datetime.timestamp_millis();
        // Out-of-range millisecond counts cannot come from a valid DateTime.
        Self(DateTime::from_timestamp_millis(millis).unwrap_or(datetime))
    }

    pub fn from_unix_seconds(seconds: i64) -> Option<Self> {
        DateTime::from_timestamp(seconds, 0).map(Self)
    }

    /// Parses RFC 3339 input with any offset, or a naive datetime taken as UTC.
    pub fn parse(value: &str) -> Result<Self, TimestampParseError> {
        let trimmed = value.trim();
        if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::from_datetime(datetime.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Self::from_datetime(naive.and_utc()))
            .map_err(|_| TimestampParseError(value.to_owned()))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Shifts the timestamp by whole seconds.
    ///
    /// `None` when the result leaves the four-digit years the wire format
    /// can carry.
    pub fn plus_seconds(&self, seconds: i64) -> Option<Self> {
        let shifted = self.0.checked_add_signed(TimeDelta::try_seconds(seconds)?)?;
        WIRE_YEARS.contains(&shifted.year()).then_some(Self(shifted))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl FromStr for Timestamp {
    type Err = TimestampParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::from_datetime(datetime)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_milliseconds_and_zulu_suffix() {
        let ts = Timestamp::parse("2020-06-03T12:00:00.123456+03:00").unwrap();
        assert_eq!(ts.to_string(), "2020-06-03T09:00:00.123Z");
    }

    #[test]
    fn naive_input_is_taken_as_utc() {
        let ts = Timestamp::parse("2020-01-01T00:00:00").unwrap();
        assert_eq!(ts.to_string(), "2020-01-01T00:00:00.000Z");
    }

    #[test]
    fn rejects_garbage() {
        assert!(Timestamp::parse("yesterday").is_err());
        assert!(Timestamp::parse("").is_err());
    }

    #[test]
    fn now_is_truncated_to_milliseconds() {
        let ts = Timestamp::now();
        assert_eq!(ts.as_datetime().timestamp_subsec_nanos() % 1_000_000, 0);
        assert_eq!(Timestamp::parse(&ts.to_string()).unwrap(), ts);
    }

    #[test]
    fn unix_seconds() {
        let ts = Timestamp::from_unix_seconds(1_577_836_800).unwrap();
        assert_eq!(ts.to_string(), "2020-01-01T00:00:00.000Z");
    }

    #[test]
    fn shifting_by_seconds() {
        let ts = Timestamp::parse("2020-01-01T00:00:00Z").unwrap();
        assert_eq!(
            ts.plus_seconds(3600).unwrap().to_string(),
            "2020-01-01T01:00:00.000Z"
        );
        assert_eq!(ts.plus_seconds(-60).unwrap().to_string(), "2019-12-31T23:59:00.000Z");
    }

    #[test]
    fn shifting_past_four_digit_years_is_refused() {
        let ts = Timestamp::parse("2020-01-01T00:00:00Z").unwrap();
        // Lands in year 11526, which would print as `+11526-...` and never parse back.
        assert_eq!(ts.plus_seconds(300_000_000_000), None);
        // Beyond chrono's own range.
        assert_eq!(ts.plus_seconds(10_000_000_000_000), None);
        assert_eq!(ts.plus_seconds(i64::MAX), None);

        let last = Timestamp::parse("9999-12-31T23:59:00Z").unwrap();
        let edge = last.plus_seconds(59).unwrap();
        assert_eq!(Timestamp::parse(&edge.to_string()).unwrap(), edge);
        assert_eq!(last.plus_seconds(60), None);
    }
}
