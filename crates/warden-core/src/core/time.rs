// crates/warden-core/src/core/time.rs
// ============================================================================
// Module: Warden Time Model
// Description: Canonical timestamp representation for decisions and logs.
// Purpose: Provide deterministic time values with calendar helpers.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Warden records time as unix epoch milliseconds. Decision evaluation never
//! reads the wall clock directly; the gateway stamps each request at
//! admission and every downstream component derives calendar facets from
//! that single value. This keeps cache keys and audit records replayable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::Weekday;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Milliseconds in one minute, used for minute-bucket truncation.
const MILLIS_PER_MINUTE: i64 = 60_000;

/// Canonical timestamp used in Warden decisions, cache keys, and audit logs.
///
/// # Invariants
/// - Values are unix epoch milliseconds (UTC).
/// - Monotonicity across records is a caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Captures the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the timestamp truncated to the start of its minute.
    #[must_use]
    pub const fn minute_bucket(self) -> i64 {
        self.0.div_euclid(MILLIS_PER_MINUTE)
    }

    /// Returns the UTC time of day as a normalized `HH:MM:SS` string.
    ///
    /// Normalized strings compare lexicographically in chronological order,
    /// which is what constraint evaluation relies on.
    #[must_use]
    pub fn time_of_day(self) -> String {
        let datetime = self.to_datetime();
        format!("{:02}:{:02}:{:02}", datetime.hour(), datetime.minute(), datetime.second())
    }

    /// Returns the UTC day of week as a lowercase English name.
    #[must_use]
    pub fn day_of_week(self) -> &'static str {
        match self.to_datetime().weekday() {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
            Weekday::Sunday => "sunday",
        }
    }

    /// Returns the UTC calendar date as a `YYYY-MM-DD` string.
    #[must_use]
    pub fn date_string(self) -> String {
        let datetime = self.to_datetime();
        format!("{:04}-{:02}-{:02}", datetime.year(), u8::from(datetime.month()), datetime.day())
    }

    /// Converts the timestamp into an [`OffsetDateTime`], clamping on overflow.
    fn to_datetime(self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.0.div_euclid(1_000))
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}
