//! Time spent near places and people, from location histories.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use qm_core::{DailyTable, Track, location_daily_table};

use super::util::parse_datetime;
use crate::config::Config;
use crate::output;

/// Hours in a day, for `--invert`.
const HOURS_PER_DAY: f64 = 24.0;

fn load_tracks(config: &Config) -> Result<BTreeMap<String, Track>> {
    let dir = config
        .data
        .location
        .as_deref()
        .context("data.location is not configured")?;
    Ok(qm_load::location::load_all_tracks(dir)?)
}

/// One column per configured place and known person, or only `names`.
pub fn load_table(config: &Config, names: Option<&[String]>) -> Result<DailyTable> {
    let tracks = load_tracks(config)?;
    let table = location_daily_table(
        &config.me.name,
        &tracks,
        &config.locations,
        names,
        &config.day_boundary()?,
    )?;
    Ok(table)
}

/// Runs the locate command.
pub fn run(
    config: &Config,
    name: &str,
    start: Option<&str>,
    invert: bool,
    csv: Option<&Path>,
    writer: &mut impl Write,
) -> Result<()> {
    let names = [name.to_string()];
    let mut table = load_table(config, Some(names.as_slice()))?;
    if let Some(start) = start {
        let boundary = config.day_boundary()?;
        table.retain_since(boundary.date_of(parse_datetime(start)?));
    }
    if invert {
        table.map_values(|hours| HOURS_PER_DAY - hours);
    }
    output::emit(&table, csv, writer)
}
