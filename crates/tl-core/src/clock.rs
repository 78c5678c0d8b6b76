//! Wall-clock times and calendar arithmetic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MINUTES_PER_HOUR: u16 = 60;
const MINUTES_PER_DAY: u16 = 24 * MINUTES_PER_HOUR;

/// Error for strings that are not a valid 24h clock time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid clock time: {0:?}")]
pub struct InvalidClockTime(String);

/// A time of day with minute precision, in the range 00:00..=23:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    /// Midnight, rendered as `00:00`.
    pub const MIDNIGHT: Self = Self(0);

    /// Creates a clock time from hour and minute components.
    pub const fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self(hour * MINUTES_PER_HOUR + minute))
    }

    /// Parses the compact source-log form `HHMM`.
    pub fn parse_compact(s: &str) -> Result<Self, InvalidClockTime> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(u8::is_ascii_digit) {
            return Err(InvalidClockTime(s.to_string()));
        }
        Self::from_digits(&bytes[0..2], &bytes[2..4]).ok_or_else(|| InvalidClockTime(s.to_string()))
    }

    /// Returns the hour component.
    pub const fn hour(self) -> u16 {
        self.0 / MINUTES_PER_HOUR
    }

    /// Returns the minute component.
    pub const fn minute(self) -> u16 {
        self.0 % MINUTES_PER_HOUR
    }

    /// Minutes elapsed from `self` until `end`.
    ///
    /// An `end` earlier than `self` is taken to be on the following day.
    pub const fn minutes_until(self, end: Self) -> u16 {
        if end.0 < self.0 {
            end.0 + MINUTES_PER_DAY - self.0
        } else {
            end.0 - self.0
        }
    }

    fn from_digits(hh: &[u8], mm: &[u8]) -> Option<Self> {
        let hour = u16::from(hh[0] - b'0') * 10 + u16::from(hh[1] - b'0');
        let minute = u16::from(mm[0] - b'0') * 10 + u16::from(mm[1] - b'0');
        Self::from_hm(hour, minute)
    }
}

impl FromStr for ClockTime {
    type Err = InvalidClockTime;

    /// Parses the normalized form `HH:MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 5
            && bytes[2] == b':'
            && bytes[..2].iter().all(u8::is_ascii_digit)
            && bytes[3..].iter().all(u8::is_ascii_digit);
        if !well_formed {
            return Err(InvalidClockTime(s.to_string()));
        }
        Self::from_digits(&bytes[0..2], &bytes[3..5]).ok_or_else(|| InvalidClockTime(s.to_string()))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for ClockTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Gregorian leap year rule.
pub const fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in `month` of `year`, or 0 for a month outside 1..=12.
pub const fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        _ => 0,
    }
}
