//! Sleep duration and score per day, from Oura and Whoop.

use std::io::Write;
use std::path::Path;

use anyhow::{Result, bail};
use qm_core::{DailyTable, SleepRecord, sleep_daily_table};

use super::util::skip_failed;
use crate::config::Config;
use crate::output;

/// Sleep records from every configured source.
pub fn load_records(config: &Config) -> Vec<SleepRecord> {
    let mut records = Vec::new();
    if let Some(path) = config.data.oura_sleep_path() {
        records.extend(skip_failed("oura", qm_load::oura::load_sleep(path)).unwrap_or_default());
    }
    if let Some(dir) = config.data.whoop.as_deref() {
        records.extend(skip_failed("whoop", qm_load::whoop::load_sleep(dir)).unwrap_or_default());
    }
    records
}

pub fn load_table(config: &Config) -> DailyTable {
    sleep_daily_table(&load_records(config), &[])
}

/// Runs the sleep command.
pub fn run(config: &Config, csv: Option<&Path>, writer: &mut impl Write) -> Result<()> {
    let table = load_table(config);
    if table.is_empty() {
        bail!("no sleep data found, configure data.oura_sleep or data.whoop");
    }
    output::emit(&table, csv, writer)
}
