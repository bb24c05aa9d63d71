//! Oura ring JSON exports.

use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use qm_core::event::seconds_to_duration;
use qm_core::{HeartRateSample, SleepRecord};
use serde::Deserialize;

use crate::{LoadError, read_json};

pub const SOURCE: &str = "oura";

#[derive(Debug, Deserialize)]
struct SleepExport {
    #[serde(default)]
    sleep: Vec<SleepPeriod>,
}

#[derive(Debug, Deserialize)]
struct SleepPeriod {
    summary_date: NaiveDate,
    bedtime_start: DateTime<Utc>,
    bedtime_end: DateTime<Utc>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    heart_rate: Option<NightHeartRate>,
}

#[derive(Debug, Deserialize)]
struct NightHeartRate {
    #[serde(default)]
    items: Vec<Option<f64>>,
    interval: f64,
}

#[derive(Debug, Deserialize)]
struct HeartRateExport {
    #[serde(default)]
    heart_rate: Vec<HeartRateEntry>,
}

#[derive(Debug, Deserialize)]
struct HeartRateEntry {
    timestamp: DateTime<Utc>,
    bpm: f64,
}

/// Sleep periods from an Oura export.
///
/// Oura's `summary_date` is the day the night ends, so records are attributed
/// to the day before.
pub fn load_sleep(path: &Path) -> Result<Vec<SleepRecord>, LoadError> {
    let export: SleepExport = read_json(path)?;
    Ok(export
        .sleep
        .into_iter()
        .map(|period| SleepRecord {
            date: period
                .summary_date
                .pred_opt()
                .unwrap_or(period.summary_date),
            start: period.bedtime_start,
            end: period.bedtime_end,
            score: period.score,
            source: SOURCE.to_string(),
        })
        .collect())
}

/// Heart-rate samples from the daytime export and the nightly sleep export.
///
/// Nightly samples are spread `interval` seconds apart from bedtime; missing
/// and non-positive readings are dropped.
pub fn load_heartrate(
    heartrate_path: &Path,
    sleep_path: &Path,
) -> Result<Vec<HeartRateSample>, LoadError> {
    let daytime: HeartRateExport = read_json(heartrate_path)?;
    let nights: SleepExport = read_json(sleep_path)?;

    let mut samples: Vec<HeartRateSample> = daytime
        .heart_rate
        .into_iter()
        .map(|entry| sample(entry.timestamp, entry.bpm))
        .collect();

    for night in nights.sleep {
        let Some(hr) = night.heart_rate else {
            continue;
        };
        let step = seconds_to_duration(hr.interval);
        let mut offset = Duration::zero();
        for bpm in hr.items {
            if let Some(bpm) = bpm {
                samples.push(sample(night.bedtime_start + offset, bpm));
            }
            offset += step;
        }
    }

    samples.retain(|s| s.bpm > 0.0);
    samples.sort_by_key(|s| s.timestamp);
    Ok(samples)
}

fn sample(timestamp: DateTime<Utc>, bpm: f64) -> HeartRateSample {
    HeartRateSample {
        timestamp,
        bpm,
        source: SOURCE.to_string(),
    }
}
