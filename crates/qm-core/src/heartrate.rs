//! Daily heart-rate summaries.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::daily::{DailyTable, DayBoundary};

/// Column holding the daily mean bpm.
pub const MEAN_COLUMN: &str = "hr_mean";

/// One heart-rate measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartRateSample {
    pub timestamp: DateTime<Utc>,
    pub bpm: f64,
    /// Device or service the sample came from (`oura`, `fitbit`, `whoop`).
    pub source: String,
}

/// A named zone starting at `lower_bpm`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartRateZone {
    pub name: String,
    pub lower_bpm: f64,
}

impl HeartRateZone {
    pub fn new(name: &str, lower_bpm: f64) -> Self {
        Self {
            name: name.to_string(),
            lower_bpm,
        }
    }

    /// The zone's column name.
    pub fn column(&self) -> String {
        format!("hr_zone:{}", self.name)
    }
}

/// `low` from 100, `med` from 140, `high` from 160 bpm.
pub fn default_zones() -> Vec<HeartRateZone> {
    vec![
        HeartRateZone::new("low", 100.0),
        HeartRateZone::new("med", 140.0),
        HeartRateZone::new("high", 160.0),
    ]
}

/// Index of the highest zone whose threshold `bpm` reaches.
fn zone_of(zones: &[HeartRateZone], bpm: f64) -> Option<usize> {
    zones
        .iter()
        .enumerate()
        .filter(|(_, z)| bpm >= z.lower_bpm)
        .max_by(|(_, a), (_, b)| a.lower_bpm.total_cmp(&b.lower_bpm))
        .map(|(i, _)| i)
}

#[derive(Default)]
struct DayAccumulator {
    sum: f64,
    count: usize,
    zones: Vec<usize>,
}

/// Per day: mean bpm plus one sample count column per zone.
///
/// Samples from every source are pooled. Non-positive readings are dropped.
/// Dates without samples are absent from the table.
#[allow(clippy::cast_precision_loss)]
pub fn heartrate_daily_table(
    samples: &[HeartRateSample],
    zones: &[HeartRateZone],
    boundary: &DayBoundary,
) -> DailyTable {
    let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();
    for sample in samples.iter().filter(|s| s.bpm > 0.0) {
        let day = days
            .entry(boundary.date_of(sample.timestamp))
            .or_insert_with(|| DayAccumulator {
                zones: vec![0; zones.len()],
                ..DayAccumulator::default()
            });
        day.sum += sample.bpm;
        day.count += 1;
        if let Some(i) = zone_of(zones, sample.bpm) {
            day.zones[i] += 1;
        }
    }

    let mut table = DailyTable::new();
    table.add_column(MEAN_COLUMN);
    for zone in zones {
        table.add_column(&zone.column());
    }
    for (date, day) in days {
        table.set(date, MEAN_COLUMN, day.sum / day.count as f64);
        for (zone, count) in zones.iter().zip(day.zones) {
            table.set(date, &zone.column(), count as f64);
        }
    }
    table
}
