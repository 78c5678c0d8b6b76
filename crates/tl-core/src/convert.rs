//! Raw event log → normalized day records.
//!
//! # Algorithm
//!
//! Source lines are folded one at a time into a [`ConvertState`] holding two
//! day buffers: the day before the current one, and the current one. When a
//! new date line arrives, the older buffer is finalized using the (now
//! complete) current buffer as lookahead:
//!
//! 1. Events are chained into back-to-back intervals starting at the wake
//!    time. Each event's description is renamed through the configured
//!    text, duration-text, and duration-bucket mappings.
//! 2. If the next day is a continuation (its first event precedes any wake
//!    event), the last known time of this day is handed forward as the next
//!    day's start and no overnight interval is added.
//! 3. Otherwise, if the next day has a wake time, a `sleep_night` interval
//!    bridges this day's last time to it.
//!
//! At the end of input both remaining buffers are finalized; the last day
//! has no lookahead and therefore never ends with `sleep_night`.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::mem;

use serde::Serialize;

use crate::clock::ClockTime;
use crate::config::{
    ConverterConfig, DATE_HEADER, GETUP_HEADER, REMARK_HEADER, SLEEP_HEADER, SLEEP_NIGHT,
    STATUS_HEADER, STUDY_MARKER,
};
use crate::source::{SourceLine, strip_bom};

/// A logged instant: the end of whatever was being done before it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawEvent {
    end: ClockTime,
    description: String,
}

/// Accumulates one calendar day of source lines.
#[derive(Debug, Clone, Default)]
struct DayBuffer {
    /// `YYYYMMDD`; `None` until a date line has been seen.
    date: Option<String>,
    getup: Option<ClockTime>,
    is_continuation: bool,
    /// Last known time of the previous day, handed over when this day is a
    /// continuation.
    inherited_start: Option<ClockTime>,
    remarks: Vec<String>,
    events: Vec<RawEvent>,
}

impl DayBuffer {
    fn dated(date: String) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }
}

/// A named activity between two clock times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub start: ClockTime,
    pub end: ClockTime,
    pub name: String,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}{}", self.start, self.end, self.name)
    }
}

/// One converted day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayRecord {
    /// `YYYYMMDD`.
    pub date: String,

    /// Whether any interval name contains `study`.
    pub status: bool,

    /// Whether this day declares a completed night of sleep. Always false
    /// for continuation days.
    pub sleep: bool,

    /// Wake time. `None` for continuation days and for days without a wake
    /// event.
    pub getup: Option<ClockTime>,

    /// The day's first activity is the tail of the previous night.
    pub is_continuation: bool,

    /// The final interval is a synthesized `sleep_night` bridge.
    pub ends_with_sleep_night: bool,

    pub remarks: Vec<String>,

    pub intervals: Vec<Interval>,
}

impl DayRecord {
    /// The value rendered after `Getup:`.
    pub fn getup_field(&self) -> String {
        if self.is_continuation {
            "Null".to_string()
        } else {
            self.getup.unwrap_or(ClockTime::MIDNIGHT).to_string()
        }
    }

    /// Renders the day block, headers in `header_order`, followed by a
    /// blank line.
    pub fn render(&self, header_order: &[String]) -> String {
        let mut out = String::new();
        let mut remarks = self.remarks.iter();
        for header in header_order {
            let value = match header.as_str() {
                DATE_HEADER => self.date.clone(),
                STATUS_HEADER => bool_field(self.status).to_string(),
                SLEEP_HEADER => bool_field(self.sleep).to_string(),
                GETUP_HEADER => self.getup_field(),
                REMARK_HEADER => remarks.next().cloned().unwrap_or_default(),
                other => {
                    tracing::trace!(header = other, "no value for configured header");
                    continue;
                }
            };
            writeln!(out, "{header}{value}").unwrap();
        }
        for remark in remarks {
            writeln!(out, "{remark}").unwrap();
        }
        for interval in &self.intervals {
            writeln!(out, "{interval}").unwrap();
        }
        out.push('\n');
        out
    }
}

const fn bool_field(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

/// Converts source logs for a given year.
#[derive(Debug, Clone, Copy)]
pub struct Converter<'a> {
    config: &'a ConverterConfig,
    year: i32,
}

impl<'a> Converter<'a> {
    pub const fn new(config: &'a ConverterConfig, year: i32) -> Self {
        Self { config, year }
    }

    /// Lazily converts `text`, yielding one record per date line.
    pub fn records<'t>(&self, text: &'t str) -> DayRecords<'a, 't> {
        DayRecords {
            state: ConvertState::new(self.config, self.year),
            lines: strip_bom(text).lines(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    pub fn convert(&self, text: &str) -> Vec<DayRecord> {
        self.records(text).collect()
    }

    /// Converts `text` into the normalized block format.
    pub fn render(&self, text: &str) -> String {
        self.records(text)
            .map(|record| record.render(&self.config.header_order))
            .collect()
    }
}

/// Single-pass iterator over the day records of one source log.
#[derive(Debug)]
pub struct DayRecords<'c, 't> {
    state: ConvertState<'c>,
    lines: std::str::Lines<'t>,
    pending: VecDeque<DayRecord>,
    finished: bool,
}

impl Iterator for DayRecords<'_, '_> {
    type Item = DayRecord;

    fn next(&mut self) -> Option<DayRecord> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(record);
            }
            if self.finished {
                return None;
            }
            match self.lines.next() {
                Some(line) => self.pending.extend(self.state.feed(line)),
                None => {
                    self.finished = true;
                    self.pending.extend(self.state.finish());
                }
            }
        }
    }
}

/// Conversion state carried across lines.
#[derive(Debug)]
pub struct ConvertState<'a> {
    config: &'a ConverterConfig,
    year: i32,
    line_number: usize,
    previous: DayBuffer,
    current: DayBuffer,
}

impl<'a> ConvertState<'a> {
    pub fn new(config: &'a ConverterConfig, year: i32) -> Self {
        Self {
            config,
            year,
            line_number: 0,
            previous: DayBuffer::default(),
            current: DayBuffer::default(),
        }
    }

    /// Consumes one physical line. Returns a record when a date line
    /// completes the day before the current one.
    pub fn feed(&mut self, raw: &str) -> Option<DayRecord> {
        self.line_number += 1;
        let line = raw.trim();
        if line.is_empty() {
            return None;
        }

        match SourceLine::classify(line, self.config) {
            SourceLine::Date(mmdd) => {
                let previous = mem::take(&mut self.previous);
                let record = finalize(previous, &mut self.current, self.config);
                let date = format!("{:04}{mmdd}", self.year);
                self.previous = mem::replace(&mut self.current, DayBuffer::dated(date));
                return record;
            }
            SourceLine::Remark(text) => {
                if self.current.date.is_some() {
                    self.current.remarks.push(text.to_string());
                }
            }
            SourceLine::Event { time, description } => {
                if self.current.date.is_none() {
                    tracing::warn!(line = self.line_number, "skipping event before first date");
                    return None;
                }
                self.push_event(time, description);
            }
            SourceLine::Invalid => {
                tracing::warn!(line = self.line_number, content = line, "skipping unrecognized line");
            }
        }
        None
    }

    fn push_event(&mut self, time: ClockTime, description: &str) {
        let day = &mut self.current;
        if self.config.is_wake_keyword(description) {
            if day.getup.is_none() {
                day.getup = Some(time);
            }
        } else if day.getup.is_none() && day.events.is_empty() {
            day.is_continuation = true;
        }
        day.events.push(RawEvent {
            end: time,
            description: description.to_string(),
        });
    }

    /// Finalizes the remaining days at end of input.
    pub fn finish(&mut self) -> Vec<DayRecord> {
        let previous = mem::take(&mut self.previous);
        let mut current = mem::take(&mut self.current);
        let mut records = Vec::with_capacity(2);
        records.extend(finalize(previous, &mut current, self.config));
        records.extend(finalize(current, &mut DayBuffer::default(), self.config));
        records
    }
}

/// Chains a day's events into intervals.
///
/// Returns the intervals and the last known time of the day (the end of the
/// last event, or the wake time if nothing followed it).
fn synthesize(day: &DayBuffer, config: &ConverterConfig) -> (Vec<Interval>, Option<ClockTime>) {
    let mut intervals = Vec::with_capacity(day.events.len() + 1);
    // A continuation day's own wake event comes after its first events, so
    // it can only start the chain once reached.
    let mut start = if day.is_continuation {
        day.inherited_start
    } else {
        day.getup
    };

    for event in &day.events {
        if config.is_wake_keyword(&event.description) {
            if start.is_none() {
                start = Some(event.end);
            }
            continue;
        }

        let minutes = start.map_or(0, |s| u32::from(s.minutes_until(event.end)));
        let name = config.activity_name(&event.description, minutes);
        if let Some(start) = start {
            intervals.push(Interval {
                start,
                end: event.end,
                name,
            });
        }
        start = Some(event.end);
    }

    (intervals, start)
}

fn finalize(day: DayBuffer, next: &mut DayBuffer, config: &ConverterConfig) -> Option<DayRecord> {
    let date = day.date.clone()?;
    let (mut intervals, last_time) = synthesize(&day, config);

    let mut ends_with_sleep_night = false;
    if next.is_continuation {
        next.inherited_start = last_time;
    } else if let (Some(start), Some(end)) = (last_time, next.getup) {
        intervals.push(Interval {
            start,
            end,
            name: SLEEP_NIGHT.to_string(),
        });
        ends_with_sleep_night = true;
    }

    let status = intervals.iter().any(|i| i.name.contains(STUDY_MARKER));
    tracing::debug!(
        date = %date,
        intervals = intervals.len(),
        continuation = day.is_continuation,
        "finalized day"
    );

    Some(DayRecord {
        date,
        status,
        sleep: ends_with_sleep_night && !day.is_continuation,
        getup: if day.is_continuation { None } else { day.getup },
        is_continuation: day.is_continuation,
        ends_with_sleep_night,
        remarks: day.remarks,
        intervals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    use crate::config::DurationRule;

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    fn convert(text: &str) -> Vec<DayRecord> {
        let config = ConverterConfig::default();
        Converter::new(&config, 2024).convert(text)
    }

    fn render(config: &ConverterConfig, text: &str) -> String {
        Converter::new(config, 2024).render(text)
    }

    fn lines(record: &DayRecord) -> Vec<String> {
        record.intervals.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn continuation_day_inherits_previous_end() {
        let config = ConverterConfig {
            wake_keywords: ["起床".to_string()].into_iter().collect(),
            ..ConverterConfig::default()
        };
        let records = Converter::new(&config, 2024).convert("0101\n2300event1\n0102\n0100event2\n");

        assert_eq!(records.len(), 2);
        let (first, second) = (&records[0], &records[1]);

        assert_eq!(first.date, "20240101");
        assert!(first.intervals.iter().all(|i| i.name != SLEEP_NIGHT));
        assert!(!first.sleep);

        assert_eq!(second.date, "20240102");
        assert!(second.is_continuation);
        assert_eq!(second.getup_field(), "Null");
        assert!(!second.sleep);
        assert_eq!(lines(second), vec!["23:00~01:00event2"]);
    }

    #[test]
    fn wake_event_bridges_previous_night() {
        let records = convert("0101\n0700起床\n1200lunch\n2330read\n0102\n0700起床\n0900study\n");

        let first = &records[0];
        assert!(first.sleep);
        assert!(first.ends_with_sleep_night);
        assert_eq!(
            lines(first),
            vec!["07:00~12:00lunch", "12:00~23:30read", "23:30~07:00sleep_night"]
        );

        let second = &records[1];
        assert_eq!(second.getup, Some(t("07:00")));
        assert!(!second.sleep, "last day has no lookahead");
        assert!(second.status);
        assert_eq!(lines(second), vec!["07:00~09:00study"]);
    }

    #[test]
    fn intervals_chain_end_to_start() {
        let records = convert(
            "0301\n0650醒\n0800a\n0930b\n1300c\n0302\n0700wake\n1000d\n2200e\n0303\n0710起床\n",
        );
        for record in &records {
            for pair in record.intervals.windows(2) {
                assert_eq!(pair[1].start, pair[0].end, "broken chain in {}", record.date);
            }
        }
        assert_eq!(records[0].intervals.last().unwrap().end, t("07:00"));
        assert_eq!(records[1].intervals.last().unwrap().end, t("07:10"));
    }

    #[test]
    fn only_first_wake_event_sets_getup() {
        let records = convert("0101\n0700起床\n0800read\n0830醒\n0900study\n");
        let day = &records[0];
        assert_eq!(day.getup, Some(t("07:00")));
        assert_eq!(lines(day), vec!["07:00~08:00read", "08:00~09:00study"]);
    }

    #[test]
    fn continuation_day_is_never_marked_slept() {
        let records = convert("0101\n0700起床\n2300game\n0102\n0130game\n1000起床\n2300read\n0103\n0800起床\n");

        let second = &records[1];
        assert!(second.is_continuation);
        assert!(!second.sleep);
        assert_eq!(second.getup, None);
        assert!(second.ends_with_sleep_night);
        assert_eq!(
            lines(second),
            vec!["23:00~01:30game", "01:30~23:00read", "23:00~08:00sleep_night"]
        );

        let first = &records[0];
        assert!(!first.sleep);
        assert_eq!(lines(first), vec!["07:00~23:00game"]);
    }

    fn assert_no_backwards_wake_interval(record: &DayRecord, wake: ClockTime) {
        for interval in &record.intervals {
            assert!(
                !(interval.start == wake && interval.end < wake),
                "{}: {interval} runs backwards from the wake time",
                record.date
            );
        }
    }

    #[test]
    fn first_day_continuation_starts_at_first_event() {
        let records = convert("0101
0130game
1000起床
2300read
");

        let day = &records[0];
        assert!(day.is_continuation);
        assert_eq!(day.getup_field(), "Null");
        assert_no_backwards_wake_interval(day, t("10:00"));
        assert_eq!(lines(day), vec!["01:30~23:00read"]);
    }

    #[test]
    fn continuation_after_empty_day_starts_at_first_event() {
        let records = convert("0101
r travel
0102
0130game
1000起床
2300read
");

        let first = &records[0];
        assert!(first.intervals.is_empty());
        assert!(!first.sleep);

        let second = &records[1];
        assert!(second.is_continuation);
        assert_no_backwards_wake_interval(second, t("10:00"));
        assert_eq!(lines(second), vec!["01:30~23:00read"]);
    }

    #[test]
    fn text_and_duration_mappings_apply_in_order() {
        let mut config = ConverterConfig::default();
        config.text_mappings.insert("英语".to_string(), "study_english".to_string());
        config.text_duration_mappings.insert("nap".to_string(), "rest".to_string());
        config.duration_mappings.insert(
            "rest".to_string(),
            vec![
                DurationRule {
                    less_than_minutes: 60,
                    value: "rest_short".to_string(),
                },
                DurationRule {
                    less_than_minutes: 180,
                    value: "rest_long".to_string(),
                },
            ]
            .into(),
        );

        let records = Converter::new(&config, 2024).convert("0101\n0700起床\n0900英语\n0920nap\n1300nap\n");
        assert_eq!(
            lines(&records[0]),
            vec![
                "07:00~09:00study_english",
                "09:00~09:20rest_short",
                "09:20~13:00rest",
            ]
        );
        assert!(records[0].status);
    }

    #[test]
    fn duration_bucket_handles_midnight_crossing() {
        let mut config = ConverterConfig::default();
        config.duration_mappings.insert(
            "game".to_string(),
            vec![DurationRule {
                less_than_minutes: 90,
                value: "game_short".to_string(),
            }]
            .into(),
        );
        let records = Converter::new(&config, 2024).convert("0101\n2330起床\n0030game\n");
        assert_eq!(lines(&records[0]), vec!["23:30~00:30game_short"]);
    }

    #[test]
    fn day_without_events_keeps_header_and_remarks() {
        let records = convert("0101\nr travelling\n0102\n0700起床\n");
        let first = &records[0];
        assert!(first.intervals.is_empty());
        assert!(!first.sleep);
        assert_eq!(first.getup_field(), "00:00");
        assert_eq!(first.remarks, vec!["travelling"]);
    }

    #[test]
    fn lines_before_first_date_are_ignored() {
        let records = convert("r stray\n0800orphan\n0101\n0700起床\n");
        assert_eq!(records.len(), 1);
        assert!(records[0].remarks.is_empty());
        assert!(records[0].intervals.is_empty());
    }

    #[test]
    fn records_are_yielded_lazily() {
        let config = ConverterConfig::default();
        let converter = Converter::new(&config, 2023);
        let mut records = converter.records("0101\n0700起床\n0800a\n0102\n0700起床\n0103\n");

        let first = records.next().unwrap();
        assert_eq!(first.date, "20230101");
        assert_eq!(records.next().unwrap().date, "20230102");
        assert_eq!(records.next().unwrap().date, "20230103");
        assert!(records.next().is_none());
        assert!(records.next().is_none());
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(convert("").is_empty());
        assert!(convert("\n\n").is_empty());
    }

    #[test]
    fn renders_block_format() {
        let config = ConverterConfig::default();
        let output = render(
            &config,
            "0101\nr first\nr second\n0700起床\n0830study_math\n2300read\n0102\n0715起床\n",
        );

        assert_snapshot!(output, @r"
        Date:20240101
        Status:True
        Sleep:True
        Getup:07:00
        Remark:first
        second
        07:00~08:30study_math
        08:30~23:00read
        23:00~07:15sleep_night

        Date:20240102
        Status:False
        Sleep:False
        Getup:07:15
        Remark:
        ");
    }

    #[test]
    fn renders_continuation_day() {
        let config = ConverterConfig::default();
        let output = render(&config, "0101\n0700起床\n2300read\n0102\n0100game\n0900study\n");

        assert_snapshot!(output, @r"
        Date:20240101
        Status:False
        Sleep:False
        Getup:07:00
        Remark:
        07:00~23:00read

        Date:20240102
        Status:True
        Sleep:False
        Getup:Null
        Remark:
        23:00~01:00game
        01:00~09:00study
        ");
    }

    #[test]
    fn serializes_records_as_json() {
        let records = convert("0101\n0700起床\n0800study\n");
        let json = serde_json::to_string(&records[0]).unwrap();
        assert_eq!(
            json,
            r#"{"date":"20240101","status":true,"sleep":false,"getup":"07:00","is_continuation":false,"ends_with_sleep_night":false,"remarks":[],"intervals":[{"start":"07:00","end":"08:00","name":"study"}]}"#
        );
    }
}
