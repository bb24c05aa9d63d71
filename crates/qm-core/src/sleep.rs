//! Sleep summaries averaged across devices.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::daily::DailyTable;
use crate::event::duration_to_hours;

pub const DURATION_COLUMN: &str = "sleep_duration";
pub const SCORE_COLUMN: &str = "sleep_score";

/// One night of sleep as reported by a device.
#[derive(Debug, Clone, PartialEq)]
pub struct SleepRecord {
    /// The date the night is attributed to, as decided by the loader.
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub score: Option<f64>,
    pub source: String,
}

impl SleepRecord {
    pub fn hours(&self) -> f64 {
        duration_to_hours(self.end - self.start).max(0.0)
    }
}

#[derive(Default)]
struct SourceNight {
    hours: f64,
    score_sum: f64,
    scores: usize,
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Per date, the mean across sources of total sleep hours and of the score.
///
/// Records from several sleep periods of the same source and date are summed
/// (hours) or averaged (score) first. Sources named in `ignore` are skipped.
#[allow(clippy::cast_precision_loss)]
pub fn sleep_daily_table(records: &[SleepRecord], ignore: &[&str]) -> DailyTable {
    let mut nights: BTreeMap<NaiveDate, BTreeMap<&str, SourceNight>> = BTreeMap::new();
    for record in records
        .iter()
        .filter(|r| !ignore.contains(&r.source.as_str()))
    {
        let night = nights
            .entry(record.date)
            .or_default()
            .entry(record.source.as_str())
            .or_default();
        night.hours += record.hours();
        if let Some(score) = record.score {
            night.score_sum += score;
            night.scores += 1;
        }
    }

    let mut table = DailyTable::new();
    table.add_column(DURATION_COLUMN);
    table.add_column(SCORE_COLUMN);
    for (date, sources) in nights {
        let hours: Vec<f64> = sources.values().map(|n| n.hours).collect();
        let scores: Vec<f64> = sources
            .values()
            .filter(|n| n.scores > 0)
            .map(|n| n.score_sum / n.scores as f64)
            .collect();
        if let Some(h) = mean(&hours) {
            table.set(date, DURATION_COLUMN, h);
        }
        if let Some(s) = mean(&scores) {
            table.set(date, SCORE_COLUMN, s);
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(source: &str, hours: i64, score: Option<f64>) -> SleepRecord {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 23, 0, 0).unwrap();
        SleepRecord {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            start,
            end: start + Duration::hours(hours),
            score,
            source: source.to_string(),
        }
    }

    #[test]
    fn averages_across_sources() {
        let records = [
            record("oura", 8, Some(80.0)),
            record("whoop", 6, Some(60.0)),
        ];
        let table = sleep_daily_table(&records, &[]);
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(table.get(date, DURATION_COLUMN), Some(7.0));
        assert_eq!(table.get(date, SCORE_COLUMN), Some(70.0));
    }

    #[test]
    fn ignored_sources_are_skipped_and_missing_scores_tolerated() {
        let records = [record("oura", 8, None), record("whoop", 6, Some(60.0))];
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let table = sleep_daily_table(&records, &["whoop"]);
        assert_eq!(table.get(date, DURATION_COLUMN), Some(8.0));
        assert_eq!(table.get(date, SCORE_COLUMN), None);

        let table = sleep_daily_table(&records, &[]);
        assert_eq!(table.get(date, SCORE_COLUMN), Some(60.0));
    }

    #[test]
    fn naps_add_to_the_same_night() {
        let records = [record("oura", 6, Some(70.0)), record("oura", 1, Some(90.0))];
        let table = sleep_daily_table(&records, &[]);
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(table.get(date, DURATION_COLUMN), Some(7.0));
        assert_eq!(table.get(date, SCORE_COLUMN), Some(80.0));
    }
}
