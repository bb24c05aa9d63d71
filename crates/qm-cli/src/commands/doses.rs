//! Substance doses from a qslang export.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use qm_core::dose::substance_column;
use qm_core::{DailyTable, DoseTable};

use crate::config::Config;
use crate::output;

/// Doses per day: `tag:<tag>` counts and one column per substance in kg or m³.
pub fn load_table(config: &Config) -> Result<DailyTable> {
    let path = config
        .data
        .qslang
        .as_deref()
        .context("data.qslang is not configured")?;
    let events = qm_load::qslang::load_doses(path)?;
    Ok(DoseTable::from_events(&events, &config.day_boundary()?).daily_table())
}

/// Keeps only the columns of the named substances.
fn select_substances(table: &DailyTable, substances: &[String]) -> DailyTable {
    let mut selected = DailyTable::new();
    for substance in substances {
        let column = substance_column(substance);
        if table.columns().contains(&column) {
            selected.insert_series(&column, &table.column(&column));
        } else {
            tracing::warn!(substance, "no doses of substance");
        }
    }
    selected
}

/// Runs the doses command.
pub fn run(
    config: &Config,
    substances: &[String],
    csv: Option<&Path>,
    writer: &mut impl Write,
) -> Result<()> {
    let mut table = load_table(config)?;
    if !substances.is_empty() {
        table = select_substances(&table, substances);
    }
    output::emit(&table, csv, writer)
}
