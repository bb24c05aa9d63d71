//! Shows how a time range is split into query chunks.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use qm_core::{ChunkSize, split_range};

use super::util::parse_datetime;

fn format_chunks(chunks: &[(DateTime<Utc>, DateTime<Utc>)], size: ChunkSize) -> String {
    let mut output = String::new();
    for (start, end) in chunks {
        let marker = if size.is_boundary(*end) { "" } else { "  (partial)" };
        let _ = writeln!(
            output,
            "{}  {}{marker}",
            start.to_rfc3339_opts(SecondsFormat::Secs, true),
            end.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }
    output
}

/// Runs the split command.
pub fn run(start: &str, end: Option<&str>, days: bool, writer: &mut impl Write) -> Result<()> {
    let start = parse_datetime(start)?;
    let end = end.map_or_else(|| Ok(Utc::now()), parse_datetime)?;
    if start >= end {
        bail!("start {start} is not before end {end}");
    }
    let size = if days { ChunkSize::Day } else { ChunkSize::Week };
    write!(writer, "{}", format_chunks(&split_range(start, end, size), size))?;
    Ok(())
}
