//! Microsecond-precision timestamp type
//!
//! Timestamps are stored as microseconds since Unix epoch (1970-01-01 00:00:00 UTC).
//! They order versions within a collection and are one of the sortable value
//! types carried in pagination cursors, where they travel as RFC 3339 strings.
//!
//! ```
//! use exemplar_core::Timestamp;
//!
//! let ts = Timestamp::from_secs(1_716_854_404);
//! assert_eq!(ts.to_rfc3339(), "2024-05-28T00:00:04.000000Z");
//! assert_eq!(Timestamp::parse_rfc3339(&ts.to_rfc3339()), Some(ts));
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Microsecond-precision timestamp
///
/// ## Invariants
///
/// - Timestamps are always non-negative (u64)
/// - Timestamps are always in microseconds
/// - The zero timestamp represents Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Unix epoch (1970-01-01 00:00:00 UTC)
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Maximum representable timestamp
    pub const MAX: Timestamp = Timestamp(u64::MAX);

    /// Create a timestamp for the current moment
    ///
    /// Returns epoch if the system clock is before Unix epoch.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as u64)
    }

    /// Create a timestamp from microseconds since epoch
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Timestamp(micros)
    }

    /// Create a timestamp from seconds since epoch
    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Timestamp(secs.saturating_mul(1_000_000))
    }

    /// Get microseconds since Unix epoch
    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Get seconds since Unix epoch (truncates)
    #[inline]
    pub const fn as_secs(&self) -> u64 {
        self.0 / 1_000_000
    }

    /// Add a duration, saturating at `Timestamp::MAX`
    pub fn saturating_add(&self, duration: Duration) -> Self {
        Timestamp(self.0.saturating_add(duration.as_micros() as u64))
    }

    /// Render as RFC 3339 in UTC with microsecond precision
    ///
    /// Timestamps beyond chrono's range (year 262143) render as the raw
    /// microsecond count, which `parse_rfc3339` rejects.
    pub fn to_rfc3339(&self) -> String {
        match i64::try_from(self.0)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_micros)
        {
            Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Micros, true),
            None => self.0.to_string(),
        }
    }

    /// Parse an RFC 3339 string with any offset
    ///
    /// Returns `None` for malformed input or instants before Unix epoch.
    pub fn parse_rfc3339(s: &str) -> Option<Self> {
        let dt = DateTime::parse_from_rfc3339(s).ok()?;
        u64::try_from(dt.timestamp_micros()).ok().map(Timestamp)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::EPOCH
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl From<u64> for Timestamp {
    fn from(micros: u64) -> Self {
        Timestamp::from_micros(micros)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_from_secs() {
        let ts = Timestamp::from_secs(1000);
        assert_eq!(ts.as_secs(), 1000);
        assert_eq!(ts.as_micros(), 1_000_000_000);
    }

    #[test]
    fn test_timestamp_now_advances() {
        let before = Timestamp::now();
        std::thread::sleep(Duration::from_millis(1));
        let after = Timestamp::now();
        assert!(after > before, "Time should advance");
    }

    #[test]
    fn test_rfc3339_round_trip_keeps_micros() {
        let ts = Timestamp::from_micros(1_716_854_404_123_456);
        let rendered = ts.to_rfc3339();
        assert_eq!(rendered, "2024-05-28T00:00:04.123456Z");
        assert_eq!(Timestamp::parse_rfc3339(&rendered), Some(ts));
    }

    #[test]
    fn test_rfc3339_accepts_offsets() {
        let utc = Timestamp::parse_rfc3339("2024-05-28T00:00:04+00:00").unwrap();
        let shifted = Timestamp::parse_rfc3339("2024-05-28T02:00:04+02:00").unwrap();
        assert_eq!(utc, shifted);
    }

    #[test]
    fn test_rfc3339_rejects_garbage_and_pre_epoch() {
        assert!(Timestamp::parse_rfc3339("yesterday").is_none());
        assert!(Timestamp::parse_rfc3339("1969-12-31T23:59:59Z").is_none());
    }

    #[test]
    fn test_saturating_add() {
        assert_eq!(
            Timestamp::MAX.saturating_add(Duration::from_secs(1)),
            Timestamp::MAX
        );
        assert_eq!(
            Timestamp::EPOCH.saturating_add(Duration::from_millis(2)),
            Timestamp::from_micros(2_000)
        );
    }
}
