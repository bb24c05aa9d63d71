//! Mean heart rate and samples per zone per day, from Oura, Whoop and Fitbit.

use std::io::Write;
use std::path::Path;

use anyhow::{Result, bail};
use qm_core::{DailyTable, HeartRateSample, default_zones, heartrate_daily_table};

use super::util::skip_failed;
use crate::config::Config;
use crate::output;

/// Samples from every configured source, pooled and sorted by time.
pub fn load_samples(config: &Config) -> Vec<HeartRateSample> {
    let data = &config.data;
    let mut samples = Vec::new();
    match (data.oura_heartrate.as_deref(), data.oura_sleep_path()) {
        (Some(heartrate), Some(sleep)) => samples.extend(
            skip_failed("oura", qm_load::oura::load_heartrate(heartrate, sleep))
                .unwrap_or_default(),
        ),
        (Some(_), None) => {
            tracing::warn!("data.oura_heartrate needs data.oura_sleep, skipping oura");
        }
        (None, _) => {}
    }
    if let Some(dir) = data.whoop.as_deref() {
        samples.extend(
            skip_failed("whoop", qm_load::whoop::load_heartrate(dir)).unwrap_or_default(),
        );
    }
    if let Some(dir) = data.fitbit.as_deref() {
        samples.extend(
            skip_failed("fitbit", qm_load::fitbit::load_heartrate(dir)).unwrap_or_default(),
        );
    }
    samples.sort_by_key(|s| s.timestamp);
    samples
}

pub fn load_table(config: &Config) -> Result<DailyTable> {
    Ok(heartrate_daily_table(
        &load_samples(config),
        &default_zones(),
        &config.day_boundary()?,
    ))
}

/// Runs the heartrate command.
pub fn run(config: &Config, csv: Option<&Path>, writer: &mut impl Write) -> Result<()> {
    let table = load_table(config)?;
    if table.is_empty() {
        bail!("no heart rate data found, configure data.oura_heartrate, data.whoop or data.fitbit");
    }
    output::emit(&table, csv, writer)
}
