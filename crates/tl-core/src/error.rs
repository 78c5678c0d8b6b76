//! Typed validation errors shared by the source and output validators.

use std::collections::BTreeSet;
use std::fmt::{self, Write as _};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The category of a validation problem.
///
/// Variant order is significant: it is part of the total order of
/// [`ValidationError`] and decides the order of groups in a rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    FileAccess,
    Structural,
    LineFormat,
    TimeDiscontinuity,
    DateContinuity,
    IncorrectDayCountForMonth,
    MissingSleepNight,
    Logical,
    SourceNoDateAtStart,
    SourceRemarkAfterEvent,
    SourceInvalidLineFormat,
}

impl ErrorKind {
    /// All kinds, in order.
    pub const ALL: [Self; 11] = [
        Self::FileAccess,
        Self::Structural,
        Self::LineFormat,
        Self::TimeDiscontinuity,
        Self::DateContinuity,
        Self::IncorrectDayCountForMonth,
        Self::MissingSleepNight,
        Self::Logical,
        Self::SourceNoDateAtStart,
        Self::SourceRemarkAfterEvent,
        Self::SourceInvalidLineFormat,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FileAccess => "file_access",
            Self::Structural => "structural",
            Self::LineFormat => "line_format",
            Self::TimeDiscontinuity => "time_discontinuity",
            Self::DateContinuity => "date_continuity",
            Self::IncorrectDayCountForMonth => "incorrect_day_count_for_month",
            Self::MissingSleepNight => "missing_sleep_night",
            Self::Logical => "logical",
            Self::SourceNoDateAtStart => "source_no_date_at_start",
            Self::SourceRemarkAfterEvent => "source_remark_after_event",
            Self::SourceInvalidLineFormat => "source_invalid_line_format",
        }
    }

    /// Heading used when errors are printed grouped by kind.
    pub const fn group_title(self) -> &'static str {
        match self {
            Self::FileAccess => "File access errors:",
            Self::Structural => "Structural errors:",
            Self::LineFormat => "Line format errors:",
            Self::TimeDiscontinuity | Self::DateContinuity => "Time discontinuity errors:",
            Self::IncorrectDayCountForMonth => "Date errors:",
            Self::MissingSleepNight => "Missing sleep_night errors:",
            Self::Logical => "Logical consistency errors:",
            Self::SourceNoDateAtStart
            | Self::SourceRemarkAfterEvent
            | Self::SourceInvalidLineFormat => "Source file format errors:",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for unknown error kind strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown error kind: {0}")]
pub struct UnknownErrorKind(String);

impl FromStr for ErrorKind {
    type Err = UnknownErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownErrorKind(s.to_string()))
    }
}

impl Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A single problem found in a log file.
///
/// Ordered by line, then kind, then message; `line` is 0 for file-level
/// problems.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValidationError {
    pub line: usize,
    pub kind: ErrorKind,
    pub message: String,
}

impl ValidationError {
    pub fn new(line: usize, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            line,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            f.write_str(&self.message)
        } else {
            write!(f, "Line {}: {}", self.line, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// The complete, de-duplicated set of problems found in one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    errors: BTreeSet<ValidationError>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A report holding a single file-level access error.
    pub fn file_access(message: impl Into<String>) -> Self {
        let mut report = Self::new();
        report.push(ValidationError::new(0, ErrorKind::FileAccess, message));
        report
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.insert(error);
    }

    pub(crate) fn add(&mut self, line: usize, kind: ErrorKind, message: impl Into<String>) {
        self.push(ValidationError::new(line, kind, message));
    }

    /// True when no problems were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Number of errors of the given kind.
    pub fn count_of(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    /// Renders the errors grouped under per-kind headings.
    pub fn render_grouped(&self, file_name: &str) -> String {
        let mut sorted: Vec<&ValidationError> = self.errors.iter().collect();
        sorted.sort_by_key(|e| (e.kind, e.line));

        let mut out = format!("Validation errors in {file_name}\n");
        let mut current_title = None;
        for error in sorted {
            let title = error.kind.group_title();
            if current_title != Some(title) {
                writeln!(out, "{title}").unwrap();
                current_title = Some(title);
            }
            writeln!(out, "  {error}").unwrap();
        }
        out
    }
}

impl<'a> IntoIterator for &'a ValidationReport {
    type Item = &'a ValidationError;
    type IntoIter = std::collections::btree_set::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
