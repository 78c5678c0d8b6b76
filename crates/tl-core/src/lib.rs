//! Core ingestion logic for the time log.
//!
//! This crate contains the fundamental types and logic for:
//! - Source validation: checking raw `MMDD` / remark / `HHMM` event logs
//! - Conversion: turning raw events into back-to-back day intervals,
//!   bridging nights with `sleep_night`
//! - Output validation: checking converted day blocks for header order,
//!   time continuity, category membership, and calendar coverage

mod clock;
pub mod config;
mod convert;
pub mod error;
mod output;
mod source;

pub use clock::{ClockTime, InvalidClockTime, days_in_month, is_leap_year};
pub use config::{CategoryMembership, ConverterConfig, DurationRule, DurationRules};
pub use convert::{ConvertState, Converter, DayRecord, DayRecords, Interval};
pub use error::{ErrorKind, UnknownErrorKind, ValidationError, ValidationReport};
pub use output::OutputValidator;
pub use source::{SourceLine, SourceValidator};
