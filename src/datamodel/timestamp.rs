use hifitime::{UNIX_REF_EPOCH, Unit};
use std::fmt;

pub type PromDateTime = hifitime::Epoch;

fn datetime_from_unix_microseconds(timestamp: i64) -> PromDateTime {
    PromDateTime::from_utc_duration(
        UNIX_REF_EPOCH.to_utc_duration() + timestamp * Unit::Microsecond,
    )
}

/// An absolute instant with microsecond resolution, counted from the Unix epoch.
///
/// Prometheus reports sample times as fractional Unix seconds. They are rounded
/// to the nearest microsecond so that equal instants from different series land
/// on the same row of a [`crate::datamodel::ResultTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn from_unix_microseconds(microseconds: i64) -> Self {
        Self(microseconds)
    }

    /// Returns `None` for NaN, infinities and instants outside the `i64`
    /// microsecond range.
    pub fn from_unix_seconds_f64(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() {
            return None;
        }
        let microseconds = (seconds * 1_000_000.0).round();
        if microseconds < i64::MIN as f64 || microseconds >= i64::MAX as f64 {
            return None;
        }
        Some(Self(microseconds as i64))
    }

    pub fn unix_microseconds(&self) -> i64 {
        self.0
    }

    pub fn unix_seconds(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    pub fn to_datetime(&self) -> PromDateTime {
        datetime_from_unix_microseconds(self.0)
    }

    pub fn to_rfc3339(&self) -> String {
        self.to_datetime().to_rfc3339()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}
