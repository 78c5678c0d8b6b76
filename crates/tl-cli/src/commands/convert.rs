//! Convert command: one source log to day blocks or JSON lines.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use tl_core::Converter;

use crate::Config;
use crate::commands::util::year_from_path;

pub fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    file: &Path,
    year: Option<i32>,
    json: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let year = year.unwrap_or_else(|| year_from_path(file));
    tracing::debug!(path = %file.display(), year, json, "converting source log");

    let converter = Converter::new(&config.converter, year);
    for record in converter.records(&text) {
        if json {
            serde_json::to_writer(&mut *writer, &record).context("failed to serialize day record")?;
            writeln!(writer)?;
        } else {
            writer.write_all(record.render(&config.converter.header_order).as_bytes())?;
        }
    }

    Ok(())
}
