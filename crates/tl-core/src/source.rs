//! Structural validation of raw source logs.
//!
//! A source log is a sequence of trimmed, non-blank lines, each one of:
//! - a date line: exactly four digits (`MMDD`)
//! - a remark line: the configured prefix followed by non-empty text
//! - an event line: `HHMM` followed by a non-empty description
//!
//! The first non-blank line must be a date, and within a day every remark
//! must come before the first event.

use std::path::Path;

use crate::clock::ClockTime;
use crate::config::ConverterConfig;
use crate::error::{ErrorKind, ValidationReport};

/// One classified source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLine<'a> {
    /// A `MMDD` day marker.
    Date(&'a str),
    /// Remark text with the prefix removed.
    Remark(&'a str),
    /// A logged instant and what ended there.
    Event {
        time: ClockTime,
        description: &'a str,
    },
    Invalid,
}

impl<'a> SourceLine<'a> {
    /// Classifies an already trimmed, non-blank line.
    ///
    /// Date lines take priority over remarks, and remarks over events.
    pub fn classify(line: &'a str, config: &ConverterConfig) -> Self {
        if is_date_line(line) {
            return Self::Date(line);
        }
        if let Some(text) = config.remark_text(line) {
            return Self::Remark(text);
        }
        parse_event_line(line).map_or(Self::Invalid, |(time, description)| Self::Event {
            time,
            description,
        })
    }
}

fn is_date_line(line: &str) -> bool {
    line.len() == 4 && line.bytes().all(|b| b.is_ascii_digit())
}

fn parse_event_line(line: &str) -> Option<(ClockTime, &str)> {
    let time = ClockTime::parse_compact(line.get(..4)?).ok()?;
    let description = line[4..].trim();
    (!description.is_empty()).then_some((time, description))
}

/// Removes a leading UTF-8 byte order mark.
pub(crate) fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// Checks raw source logs against the line grammar and ordering rules.
#[derive(Debug, Clone, Copy)]
pub struct SourceValidator<'a> {
    config: &'a ConverterConfig,
}

impl<'a> SourceValidator<'a> {
    pub const fn new(config: &'a ConverterConfig) -> Self {
        Self { config }
    }

    /// Validates a whole source log, collecting every problem found.
    pub fn validate(&self, text: &str) -> ValidationReport {
        let mut report = ValidationReport::new();
        let mut date_seen = false;
        let mut event_seen_today = false;

        for (idx, raw) in strip_bom(text).lines().enumerate() {
            let line_number = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            match SourceLine::classify(line, self.config) {
                SourceLine::Date(_) => {
                    date_seen = true;
                    event_seen_today = false;
                }
                _ if !date_seen => report.add(
                    line_number,
                    ErrorKind::SourceNoDateAtStart,
                    format!("The first non-empty line must be a 4-digit date. Found: '{line}'"),
                ),
                SourceLine::Remark(_) => {
                    if event_seen_today {
                        report.add(
                            line_number,
                            ErrorKind::SourceRemarkAfterEvent,
                            format!(
                                "Remark lines cannot appear after an event line for the same day. Found: '{line}'"
                            ),
                        );
                    }
                }
                SourceLine::Event { .. } => event_seen_today = true,
                SourceLine::Invalid => report.add(
                    line_number,
                    ErrorKind::SourceInvalidLineFormat,
                    format!(
                        "Invalid format. Must be a date (MMDD), remark ('{}text'), or event (HHMMdescription). Found: '{line}'",
                        self.config.remark_prefix
                    ),
                ),
            }
        }

        tracing::debug!(errors = report.len(), "validated source log");
        report
    }

    /// Validates the source log at `path`.
    ///
    /// An unreadable file yields a single file-access error.
    pub fn validate_file(&self, path: &Path) -> ValidationReport {
        match std::fs::read_to_string(path) {
            Ok(text) => self.validate(&text),
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "failed to read source log");
                ValidationReport::file_access(format!("Could not open file: {}", path.display()))
            }
        }
    }
}
