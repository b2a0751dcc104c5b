//! Time utilities for Weft components

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Wall-clock timestamp used in status fields and conditions.
///
/// Wraps a UTC instant and renders as RFC3339. Condition transition times
/// within one reconcile tick may compare equal; consumers must tolerate that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Time elapsed since this timestamp, zero if it lies in the future.
    pub fn elapsed(&self) -> Duration {
        (Utc::now() - self.0).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether more than `age` has passed since this timestamp.
    pub fn older_than(&self, age: Duration) -> bool {
        self.elapsed() > age
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn elapsed_is_monotone_for_past_instants() {
        let past = Timestamp::from_datetime(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        assert!(past.elapsed() > Duration::from_secs(1));
        assert!(past.older_than(Duration::from_secs(60)));
    }

    #[test]
    fn future_instants_report_zero_elapsed() {
        let future = Timestamp::from_datetime(Utc::now() + chrono::Duration::hours(1));
        assert_eq!(future.elapsed(), Duration::ZERO);
        assert!(!future.older_than(Duration::ZERO));
    }

    #[test]
    fn serializes_as_rfc3339() {
        let ts = Timestamp::from_datetime(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        let json = serde_json::to_string(&ts).unwrap();
        assert!(json.contains("2024-06-01T12:00:00"));
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}
