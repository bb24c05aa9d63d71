//! Every available daily table joined into one.

use std::io::Write;
use std::path::Path;

use anyhow::{Result, bail};
use chrono::Utc;
use qm_core::{CoverageGap, DailyTable, GapKind, combine};

use super::util::skip_failed;
use super::{doses, habits, heartrate, locate, screentime, sleep};
use crate::cli::ScreentimeArgs;
use crate::config::Config;
use crate::output;

fn push(tables: &mut Vec<(String, DailyTable)>, name: &str, result: Result<DailyTable>) {
    let Some(table) = skip_failed(name, result) else {
        return;
    };
    if table.is_empty() {
        tracing::info!(source = name, "no data, leaving out of the combined table");
        return;
    }
    tables.push((name.to_string(), table));
}

/// Loads each configured source's daily table. Sources that fail or have no
/// data are left out.
pub fn load_tables(config: &Config, options: &screentime::Options) -> Vec<(String, DailyTable)> {
    let data = &config.data;
    let mut tables = Vec::new();
    push(&mut tables, "screentime", screentime::load_table(config, options));
    push(&mut tables, "heartrate", heartrate::load_table(config));
    push(&mut tables, "sleep", Ok(sleep::load_table(config)));
    if data.habitbull.is_some() {
        push(&mut tables, "habits", habits::load_table(config));
    }
    if data.qslang.is_some() {
        push(&mut tables, "doses", doses::load_table(config));
    }
    if data.location.is_some() {
        push(&mut tables, "location", locate::load_table(config, None));
    }
    tables
}

fn describe_gap(gap: &CoverageGap) -> String {
    let kind = match gap.kind {
        GapKind::Start => "starts late",
        GapKind::End => "ends early",
        GapKind::Internal => "missing",
    };
    format!(
        "{}: {kind} {}..{} ({} days)",
        gap.source,
        gap.first,
        gap.last,
        gap.days()
    )
}

/// Runs the all-df command.
pub fn run(
    config: &Config,
    args: &ScreentimeArgs,
    csv: Option<&Path>,
    writer: &mut impl Write,
) -> Result<()> {
    let options = screentime::Options::from_args(args, config, Utc::now())?;
    let tables = load_tables(config, &options);
    if tables.is_empty() {
        bail!("no data found in any source");
    }
    let sources: Vec<&str> = tables.iter().map(|(name, _)| name.as_str()).collect();
    tracing::info!(sources = ?sources, "combining tables");

    let combined = combine(tables);
    output::emit(&combined.table, csv, writer)?;
    if !combined.gaps.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Coverage gaps:")?;
        for gap in &combined.gaps {
            writeln!(writer, "  {}", describe_gap(gap))?;
        }
    }
    Ok(())
}
