//! Validation of converted (normalized) day files.
//!
//! A converted file is a sequence of blocks, each opened by a `Date:` line
//! and made of the configured header lines followed by activity lines of
//! the form `HH:MM~HH:MMname`. Problems in one block never stop the scan;
//! a block with a broken header is skipped until the next `Date:` line.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::clock::{ClockTime, days_in_month};
use crate::config::{CategoryMembership, ConverterConfig, DATE_HEADER, SLEEP_HEADER, SLEEP_NIGHT};
use crate::error::{ErrorKind, ValidationReport};
use crate::source::strip_bom;

/// Pre-compiled pattern for activity lines.
static ACTIVITY_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2}:\d{2})~(\d{2}:\d{2})(.+)$").unwrap());

/// Parse state for one `Date:` block.
#[derive(Debug)]
struct DateBlock {
    date_line: usize,
    header_valid: bool,
    next_header: usize,
    in_activities: bool,
    /// Line of a `Sleep:True` header.
    sleep_declared: Option<usize>,
    /// Activity names with their line numbers.
    activities: Vec<(String, usize)>,
    last_end: Option<ClockTime>,
}

impl DateBlock {
    const fn new(date_line: usize) -> Self {
        Self {
            date_line,
            header_valid: true,
            next_header: 0,
            in_activities: false,
            sleep_declared: None,
            activities: Vec::new(),
            last_end: None,
        }
    }
}

/// Day numbers seen per (year, month), each with the line it was first seen on.
type Calendar = BTreeMap<(i32, u32), BTreeMap<u32, usize>>;

/// Checks converted files for structural and temporal consistency.
#[derive(Debug, Clone, Copy)]
pub struct OutputValidator<'a> {
    config: &'a ConverterConfig,
    categories: &'a CategoryMembership,
}

impl<'a> OutputValidator<'a> {
    pub const fn new(config: &'a ConverterConfig, categories: &'a CategoryMembership) -> Self {
        Self { config, categories }
    }

    /// Validates a converted file, collecting every problem found.
    ///
    /// With `enable_day_count_check`, every month that appears in the file
    /// must be covered day by day.
    pub fn validate(&self, text: &str, enable_day_count_check: bool) -> ValidationReport {
        let mut report = ValidationReport::new();
        let mut calendar = Calendar::new();
        let mut block: Option<DateBlock> = None;

        for (idx, raw) in strip_bom(text).lines().enumerate() {
            let line_number = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with(DATE_HEADER) {
                if let Some(done) = block.take() {
                    self.finalize_block(&done, &mut report);
                }
                block = Some(DateBlock::new(line_number));
            }

            let Some(current) = block.as_mut() else {
                report.add(
                    line_number,
                    ErrorKind::Structural,
                    "File must begin with a valid Date: line.",
                );
                continue;
            };

            if !current.header_valid {
                continue;
            }

            if current.in_activities {
                self.check_activity(line, line_number, current, &mut report);
            } else {
                self.check_header(line, line_number, current, &mut calendar, &mut report);
            }
        }

        if let Some(done) = block.take() {
            self.finalize_block(&done, &mut report);
        }

        if enable_day_count_check {
            check_calendar(&calendar, &mut report);
        }

        tracing::debug!(errors = report.len(), "validated converted file");
        report
    }

    /// Validates the converted file at `path`.
    ///
    /// An unreadable file yields a single file-access error.
    pub fn validate_file(&self, path: &Path, enable_day_count_check: bool) -> ValidationReport {
        match std::fs::read_to_string(path) {
            Ok(text) => self.validate(&text, enable_day_count_check),
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "failed to read converted file");
                ValidationReport::file_access(format!("Could not open file: {}", path.display()))
            }
        }
    }

    fn check_header(
        &self,
        line: &str,
        line_number: usize,
        block: &mut DateBlock,
        calendar: &mut Calendar,
        report: &mut ValidationReport,
    ) {
        let headers = &self.config.header_order;
        let Some(expected) = headers.get(block.next_header) else {
            report.add(line_number, ErrorKind::Structural, "Unexpected line after header section.");
            block.header_valid = false;
            return;
        };

        let Some(value) = line.strip_prefix(expected.as_str()) else {
            report.add(
                line_number,
                ErrorKind::Structural,
                format!("Line out of order. Expected '{expected}'."),
            );
            block.header_valid = false;
            return;
        };

        match expected.as_str() {
            DATE_HEADER => match parse_block_date(value) {
                Ok(date) => {
                    calendar
                        .entry((date.year(), date.month()))
                        .or_default()
                        .entry(date.day())
                        .or_insert(line_number);
                }
                Err((kind, message)) => report.add(line_number, kind, message),
            },
            SLEEP_HEADER => match value {
                "True" => block.sleep_declared = Some(line_number),
                "False" => {}
                _ => report.add(
                    line_number,
                    ErrorKind::LineFormat,
                    format!("Invalid sleep value '{value}'. Expected 'Sleep:True' or 'Sleep:False'."),
                ),
            },
            _ => {}
        }

        block.next_header += 1;
        if block.next_header == headers.len() {
            block.in_activities = true;
        }
    }

    fn check_activity(
        &self,
        line: &str,
        line_number: usize,
        block: &mut DateBlock,
        report: &mut ValidationReport,
    ) {
        let Some(caps) = ACTIVITY_LINE_RE.captures(line) else {
            report.add(
                line_number,
                ErrorKind::LineFormat,
                "Invalid activity format. Expected 'HH:MM~HH:MMactivity'.",
            );
            return;
        };

        let (Ok(start), Ok(end)) = (caps[1].parse::<ClockTime>(), caps[2].parse::<ClockTime>()) else {
            report.add(line_number, ErrorKind::LineFormat, "Invalid time format in activity line.");
            return;
        };

        if let Some(expected) = block.last_end {
            if expected != start {
                report.add(
                    line_number,
                    ErrorKind::TimeDiscontinuity,
                    format!("Time discontinuity. Expected start time {expected}, but got {start}."),
                );
            }
        }

        let name = &caps[3];
        if !self.categories.is_known(name) {
            report.add(line_number, ErrorKind::Logical, format!("Unknown activity '{name}'."));
        }

        block.activities.push((name.to_string(), line_number));
        block.last_end = Some(end);
    }

    fn finalize_block(&self, block: &DateBlock, report: &mut ValidationReport) {
        if !block.header_valid {
            return;
        }

        if !block.in_activities {
            if let Some(expected) = self.config.header_order.get(block.next_header) {
                report.add(
                    block.date_line,
                    ErrorKind::Structural,
                    format!("Incomplete header section. Expected '{expected}'."),
                );
            }
        }

        let Some(sleep_line) = block.sleep_declared else {
            return;
        };
        match block.activities.last() {
            Some((name, line)) if name != SLEEP_NIGHT => report.add(
                *line,
                ErrorKind::MissingSleepNight,
                format!("The last activity must be '{SLEEP_NIGHT}' when Sleep is True."),
            ),
            Some(_) => {}
            None => report.add(
                sleep_line,
                ErrorKind::MissingSleepNight,
                format!("Sleep is True but the day has no activities; expected a final '{SLEEP_NIGHT}'."),
            ),
        }
    }
}

/// Parses the value of a `Date:` line (`YYYYMMDD`).
fn parse_block_date(value: &str) -> Result<NaiveDate, (ErrorKind, String)> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err((
            ErrorKind::LineFormat,
            format!("Invalid date '{value}'. Expected 'Date:YYYYMMDD'."),
        ));
    }
    let field = |range: std::ops::Range<usize>| value[range].parse::<u32>().unwrap_or(0);
    let year = i32::try_from(field(0..4)).unwrap_or(0);
    let month = field(4..6);
    let day = field(6..8);

    let month_length = days_in_month(year, month);
    if month_length == 0 {
        return Err((
            ErrorKind::LineFormat,
            format!("Invalid month {month:02} in date '{value}'."),
        ));
    }
    if day == 0 || day > month_length {
        return Err((
            ErrorKind::IncorrectDayCountForMonth,
            format!("Day {day:02} does not exist in {year:04}-{month:02} ({month_length} days)."),
        ));
    }

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        (
            ErrorKind::LineFormat,
            format!("Invalid date '{value}'. Expected 'Date:YYYYMMDD'."),
        )
    })
}

/// Reports every day missing from each month seen in the file, attributed
/// to the line of the earliest recorded day of that month.
fn check_calendar(calendar: &Calendar, report: &mut ValidationReport) {
    for (&(year, month), days) in calendar {
        let Some((_, &first_line)) = days.iter().next() else {
            continue;
        };
        for day in 1..=days_in_month(year, month) {
            if days.contains_key(&day) {
                continue;
            }
            if let Some(missing) = NaiveDate::from_ymd_opt(year, month, day) {
                report.add(
                    first_line,
                    ErrorKind::DateContinuity,
                    format!("Missing date: {}", missing.format("%Y-%m-%d")),
                );
            }
        }
    }
}
