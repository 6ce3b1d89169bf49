//! Calendar-day keys and the policy that derives them from timestamps.
//!
//! Every completion event is bucketed into a [`DayKey`]. Streaks, merge
//! dedup, and consistency counts all operate on these keys, never on raw
//! timestamps, so the timezone rule lives in exactly one place:
//! [`DayPolicy::day_key`].
//!
//! The default policy is [`DayPolicy::Utc`]: the day of the UTC instant.
//! Completions logged shortly after local midnight in a timezone west of UTC
//! land on the previous day under that rule; [`DayPolicy::Fixed`] shifts
//! the boundary by a constant offset.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

use crate::error::ErrorCode;

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// A calendar day, rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

/// Returned when a string is not a valid `YYYY-MM-DD` day.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid day key '{0}': expected YYYY-MM-DD")]
pub struct DayKeyError(pub String);

impl DayKeyError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidDayKey
    }
}

impl DayKey {
    #[must_use]
    pub const fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Build a key from year/month/day parts, `None` if the date is invalid.
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    #[must_use]
    pub const fn date(self) -> NaiveDate {
        self.0
    }

    /// The previous calendar day. Saturates at the minimum representable date.
    #[must_use]
    pub fn pred(self) -> Self {
        self.0.pred_opt().map_or(self, Self)
    }

    /// The following calendar day. Saturates at the maximum representable date.
    #[must_use]
    pub fn succ(self) -> Self {
        self.0.succ_opt().map_or(self, Self)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_KEY_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = DayKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), DAY_KEY_FORMAT)
            .map(Self)
            .map_err(|_| DayKeyError(s.to_string()))
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// How a timestamp is mapped onto a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum DayPolicy {
    /// Day of the UTC instant.
    #[default]
    Utc,
    /// Day in a fixed offset from UTC, in minutes east (negative for west).
    Fixed { offset_minutes: i32 },
}

impl DayPolicy {
    /// Derive the day key for `at` under this policy.
    ///
    /// An out-of-range fixed offset (beyond ±24h) falls back to UTC.
    #[must_use]
    pub fn day_key(self, at: &DateTime<Utc>) -> DayKey {
        match self {
            Self::Utc => DayKey(at.date_naive()),
            Self::Fixed { offset_minutes } => offset_minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .map_or_else(
                    || DayKey(at.date_naive()),
                    |tz| DayKey(at.with_timezone(&tz).date_naive()),
                ),
        }
    }

    /// The key for "today" as seen at `now`.
    #[must_use]
    pub fn today(self, now: &DateTime<Utc>) -> DayKey {
        self.day_key(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().expect("valid timestamp")
    }

    #[test]
    fn display_and_parse_agree() {
        let key: DayKey = "2024-01-09".parse().expect("parse");
        assert_eq!(key.to_string(), "2024-01-09");
        assert_eq!(key, DayKey::from_ymd(2024, 1, 9).expect("valid"));
    }

    #[test]
    fn rejects_garbage() {
        let err = "01/09/2024".parse::<DayKey>().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDayKey);
        assert!("2024-02-30".parse::<DayKey>().is_err());
    }

    #[test]
    fn pred_crosses_month_and_year() {
        let key = DayKey::from_ymd(2024, 1, 1).expect("valid");
        assert_eq!(key.pred().to_string(), "2023-12-31");
        let leap = DayKey::from_ymd(2024, 3, 1).expect("valid");
        assert_eq!(leap.pred().to_string(), "2024-02-29");
        assert_eq!(leap.pred().succ(), leap);
    }

    #[test]
    fn utc_policy_uses_utc_date() {
        let late = at(2024, 1, 10, 23, 30);
        assert_eq!(DayPolicy::Utc.day_key(&late).to_string(), "2024-01-10");
    }

    #[test]
    fn fixed_policy_shifts_boundary() {
        // 02:00 UTC is still the previous evening five hours west.
        let early = at(2024, 1, 10, 2, 0);
        let west = DayPolicy::Fixed {
            offset_minutes: -300,
        };
        assert_eq!(west.day_key(&early).to_string(), "2024-01-09");

        let east = DayPolicy::Fixed {
            offset_minutes: 600,
        };
        assert_eq!(east.day_key(&at(2024, 1, 10, 20, 0)).to_string(), "2024-01-11");
    }

    #[test]
    fn absurd_offset_falls_back_to_utc() {
        let policy = DayPolicy::Fixed {
            offset_minutes: 100_000,
        };
        assert_eq!(policy.day_key(&at(2024, 1, 10, 2, 0)).to_string(), "2024-01-10");
    }

    #[test]
    fn serde_round_trip_as_string() {
        let key = DayKey::from_ymd(2024, 5, 17).expect("valid");
        let json = serde_json::to_string(&key).expect("serialize");
        assert_eq!(json, "\"2024-05-17\"");
        let back: DayKey = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, key);
    }

    #[test]
    fn policy_parses_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            day: DayPolicy,
        }
        let w: Wrapper = toml::from_str("[day]\npolicy = \"fixed\"\noffset_minutes = -480\n")
            .expect("parse");
        assert_eq!(
            w.day,
            DayPolicy::Fixed {
                offset_minutes: -480
            }
        );
        let w: Wrapper = toml::from_str("[day]\npolicy = \"utc\"\n").expect("parse");
        assert_eq!(w.day, DayPolicy::Utc);
    }
}
