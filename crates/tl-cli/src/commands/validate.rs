//! Validate command for checking a single file.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use tl_core::{OutputValidator, SourceValidator};

use crate::Config;

/// Prints the validation result for `file`. Returns whether it passed.
pub fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    file: &Path,
    output: bool,
    enable_day_check: bool,
) -> Result<bool> {
    let report = if output {
        OutputValidator::new(&config.converter, &config.categories)
            .validate_file(file, enable_day_check)
    } else {
        SourceValidator::new(&config.converter).validate_file(file)
    };
    tracing::debug!(path = %file.display(), output, errors = report.len(), "validated file");

    if report.is_ok() {
        writeln!(writer, "{}: OK", file.display())?;
    } else {
        write!(writer, "{}", report.render_grouped(&file.display().to_string()))?;
    }

    Ok(report.is_ok())
}
