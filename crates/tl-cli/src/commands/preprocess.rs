//! Batch pipeline: source validation, conversion, then output validation.
//!
//! Each stage runs over all remaining files in parallel; a file that fails
//! a stage is reported and does not advance to the next one.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use rayon::prelude::*;

use tl_core::{Converter, ConverterConfig, OutputValidator, SourceValidator, ValidationReport};

use crate::Config;
use crate::commands::util::year_from_path;

/// Prefix of the generated output root.
const PROCESSED_PREFIX: &str = "Processed_";

/// One step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ValidateSource,
    Convert,
    ValidateOutput,
}

impl Stage {
    pub const fn title(self) -> &'static str {
        match self {
            Self::ValidateSource => "Source validation",
            Self::Convert => "Conversion",
            Self::ValidateOutput => "Output validation",
        }
    }
}

/// Which stages to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stages {
    pub validate_source: bool,
    pub convert: bool,
    pub validate_output: bool,
}

impl Stages {
    pub const ALL: Self = Self {
        validate_source: true,
        convert: true,
        validate_output: true,
    };

    /// Builds the stage set from command-line flags; no flags means all.
    pub const fn from_flags(validate_source: bool, convert: bool, validate_output: bool) -> Self {
        if validate_source || convert || validate_output {
            Self {
                validate_source,
                convert,
                validate_output,
            }
        } else {
            Self::ALL
        }
    }

    /// Enabled stages in execution order.
    pub fn enabled(self) -> impl Iterator<Item = Stage> {
        [
            (self.validate_source, Stage::ValidateSource),
            (self.convert, Stage::Convert),
            (self.validate_output, Stage::ValidateOutput),
        ]
        .into_iter()
        .filter_map(|(on, stage)| on.then_some(stage))
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub stages: Stages,
    pub enable_day_check: bool,
    pub output_dir: Option<PathBuf>,
}

/// A source log and where its converted form goes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogFile {
    source: PathBuf,
    output: PathBuf,
    /// Path shown in reports, relative to the input.
    label: String,
}

/// A file that failed a stage.
#[derive(Debug, Clone)]
pub struct Failure {
    pub stage: Stage,
    pub label: String,
    pub report: ValidationReport,
}

#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage: Stage,
    pub passed: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
pub struct Summary {
    pub files: usize,
    pub stages: Vec<StageResult>,
    pub failures: Vec<Failure>,
}

impl Summary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs the enabled stages over `input`, a single log or a directory.
///
/// Per-stage counts go to `writer`; grouped error reports go to `errors`
/// and are appended to the configured error log.
pub fn run<W: Write, E: Write>(
    writer: &mut W,
    errors: &mut E,
    config: &Config,
    input: &Path,
    options: &Options,
) -> Result<Summary> {
    let files = collect_logs(input, options.output_dir.as_deref())?;
    if files.is_empty() {
        bail!("no .txt files found under {}", input.display());
    }
    tracing::info!(count = files.len(), input = %input.display(), "collected source logs");

    let source_validator = SourceValidator::new(&config.converter);
    let output_validator = OutputValidator::new(&config.converter, &config.categories);
    let converted = options.stages.convert;

    let mut summary = Summary {
        files: files.len(),
        ..Summary::default()
    };
    let mut pending = files;
    for stage in options.stages.enabled() {
        pending = match stage {
            Stage::ValidateSource => run_stage(stage, pending, &mut summary, |file| {
                source_validator.validate_file(&file.source)
            }),
            Stage::Convert => run_stage(stage, pending, &mut summary, |file| {
                convert_file(&config.converter, file)
            }),
            Stage::ValidateOutput => run_stage(stage, pending, &mut summary, |file| {
                let path = if converted { &file.output } else { &file.source };
                output_validator.validate_file(path, options.enable_day_check)
            }),
        };
    }

    for result in &summary.stages {
        writeln!(
            writer,
            "{}: {} passed, {} failed",
            result.stage.title(),
            result.passed,
            result.failed
        )?;
    }

    if summary.is_success() {
        writeln!(writer, "All {} file(s) passed.", summary.files)?;
        return Ok(summary);
    }

    for failure in &summary.failures {
        write_failure(errors, failure)?;
    }
    append_error_log(&config.error_log_path, input, &summary.failures)?;
    writeln!(
        writer,
        "{} of {} file(s) failed; errors appended to {}",
        summary.failures.len(),
        summary.files,
        config.error_log_path.display()
    )?;

    Ok(summary)
}

/// Applies `check` to every file in parallel, recording failures and
/// returning the files that passed, in input order.
fn run_stage<F>(stage: Stage, files: Vec<LogFile>, summary: &mut Summary, check: F) -> Vec<LogFile>
where
    F: Fn(&LogFile) -> ValidationReport + Sync,
{
    let started = Instant::now();
    let results: Vec<(LogFile, ValidationReport)> = files
        .into_par_iter()
        .map(|file| {
            let report = check(&file);
            (file, report)
        })
        .collect();
    let elapsed = started.elapsed();

    let mut passed = Vec::with_capacity(results.len());
    let mut failed = 0;
    for (file, report) in results {
        if report.is_ok() {
            passed.push(file);
        } else {
            failed += 1;
            summary.failures.push(Failure {
                stage,
                label: file.label,
                report,
            });
        }
    }

    tracing::info!(
        stage = stage.title(),
        passed = passed.len(),
        failed,
        elapsed_ms = elapsed.as_millis(),
        "stage finished"
    );
    summary.stages.push(StageResult {
        stage,
        passed: passed.len(),
        failed,
        elapsed,
    });
    passed
}

/// Converts one log and writes the result to its output path.
fn convert_file(config: &ConverterConfig, file: &LogFile) -> ValidationReport {
    let text = match fs::read_to_string(&file.source) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path = ?file.source, error = %e, "failed to read source log");
            return ValidationReport::file_access(format!(
                "Could not open file: {}",
                file.source.display()
            ));
        }
    };

    let year = year_from_path(&file.source);
    let rendered = Converter::new(config, year).render(&text);

    let written = file
        .output
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| fs::write(&file.output, rendered));
    if let Err(e) = written {
        tracing::warn!(path = ?file.output, error = %e, "failed to write converted file");
        return ValidationReport::file_access(format!(
            "Could not write file: {}",
            file.output.display()
        ));
    }

    tracing::debug!(source = ?file.source, output = ?file.output, year, "converted");
    ValidationReport::new()
}

/// Finds the logs under `input` and lays out their output paths.
///
/// A directory `D` maps to `Processed_D` beside it, keeping relative paths;
/// a single file `F` maps to `Processed_F` beside it. `output_dir` replaces
/// the generated root.
fn collect_logs(input: &Path, output_dir: Option<&Path>) -> Result<Vec<LogFile>> {
    let input = input
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", input.display()))?;
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", input.display()))?;
    let beside = |name: &str| {
        input
            .parent()
            .unwrap_or(&input)
            .join(format!("{PROCESSED_PREFIX}{name}"))
    };

    if input.is_file() {
        let output = output_dir.map_or_else(|| beside(&name), |dir| dir.join(&name));
        return Ok(vec![LogFile {
            source: input.clone(),
            output,
            label: name,
        }]);
    }

    let root = output_dir.map_or_else(|| beside(&name), Path::to_path_buf);
    let mut sources = Vec::new();
    find_logs(&input, &mut sources)?;
    sources.sort();

    sources
        .into_iter()
        .map(|source| -> Result<LogFile> {
            let relative = source.strip_prefix(&input)?.to_path_buf();
            Ok(LogFile {
                output: root.join(&relative),
                label: relative.to_string_lossy().into_owned(),
                source,
            })
        })
        .collect()
}

fn find_logs(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            find_logs(&path, found)?;
        } else if path.extension().is_some_and(|ext| ext == "txt") {
            found.push(path);
        }
    }
    Ok(())
}

fn write_failure<E: Write>(errors: &mut E, failure: &Failure) -> std::io::Result<()> {
    writeln!(errors, "[{}]", failure.stage.title())?;
    write!(errors, "{}", failure.report.render_grouped(&failure.label))
}

fn append_error_log(path: &Path, input: &Path, failures: &[Failure]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open error log {}", path.display()))?;

    writeln!(
        file,
        "== {} preprocess {} ==",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        input.display()
    )?;
    for failure in failures {
        write_failure(&mut file, failure)?;
    }
    writeln!(file)?;
    Ok(())
}
