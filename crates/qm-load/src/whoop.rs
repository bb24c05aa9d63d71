//! Whoop data export (the full privacy export with granular heart rate).
//!
//! The export directory has `Health/metrics*.csv` files with `hr` and `ts`
//! columns and a `Health/sleeps.csv` with one row per sleep.

use std::path::Path;

use chrono::Duration;
use qm_core::{HeartRateSample, SleepRecord};
use serde::Deserialize;

use crate::{LoadError, csv_reader, matching_files, parse_timestamp};

pub const SOURCE: &str = "whoop";

/// Sleeps starting before this hour of the day count toward the previous date.
const SLEEP_DATE_OFFSET_HOURS: i64 = 8;

#[derive(Debug, Deserialize)]
struct MetricRow {
    #[serde(default)]
    hr: Option<f64>,
    ts: String,
}

#[derive(Debug, Deserialize)]
struct SleepRow {
    during: String,
    #[serde(default)]
    score: Option<f64>,
}

/// Heart-rate samples from every metrics file, sorted by time.
pub fn load_heartrate(export_dir: &Path) -> Result<Vec<HeartRateSample>, LoadError> {
    let health = export_dir.join("Health");
    let mut samples = Vec::new();
    for path in matching_files(&health, "metrics", ".csv")? {
        let mut reader = csv_reader(&path)?;
        for row in reader.deserialize::<MetricRow>() {
            let row = row.map_err(|e| LoadError::csv(&path, e))?;
            let Some(bpm) = row.hr else {
                continue;
            };
            let timestamp =
                parse_timestamp(&row.ts).ok_or_else(|| LoadError::timestamp(&path, &row.ts))?;
            samples.push(HeartRateSample {
                timestamp,
                bpm,
                source: SOURCE.to_string(),
            });
        }
    }
    samples.sort_by_key(|s| s.timestamp);
    Ok(samples)
}

/// Splits a range literal like `['2021-01-01 23:00:00+00','2021-01-02 07:00:00+00')`.
fn parse_during(during: &str) -> Option<(&str, &str)> {
    let inner = during.trim().trim_matches(|c| matches!(c, '[' | ']' | '(' | ')'));
    let (start, end) = inner.split_once(',')?;
    Some((unquote(start), unquote(end)))
}

fn unquote(s: &str) -> &str {
    s.trim().trim_matches(|c| c == '\'' || c == '"')
}

/// Sleeps, dated by the day they started on when shifted back eight hours.
pub fn load_sleep(export_dir: &Path) -> Result<Vec<SleepRecord>, LoadError> {
    let path = export_dir.join("Health").join("sleeps.csv");
    let mut reader = csv_reader(&path)?;
    let mut records = Vec::new();
    for row in reader.deserialize::<SleepRow>() {
        let row = row.map_err(|e| LoadError::csv(&path, e))?;
        let (start, end) = parse_during(&row.during)
            .ok_or_else(|| LoadError::record(&path, format!("bad sleep range {:?}", row.during)))?;
        let start = parse_timestamp(start).ok_or_else(|| LoadError::timestamp(&path, start))?;
        let end = parse_timestamp(end).ok_or_else(|| LoadError::timestamp(&path, end))?;
        records.push(SleepRecord {
            date: (start - Duration::hours(SLEEP_DATE_OFFSET_HOURS)).date_naive(),
            start,
            end,
            score: row.score,
            source: SOURCE.to_string(),
        });
    }
    records.sort_by_key(|r| r.start);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn export_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Health")).unwrap();
        dir
    }

    #[test]
    fn heartrate_reads_all_metrics_files() {
        let dir = export_dir();
        let health = dir.path().join("Health");
        std::fs::write(
            health.join("metrics2.csv"),
            "hr,accel_x,ts\n61,0.1,2021-06-22 04:18:00+00\n",
        )
        .unwrap();
        std::fs::write(
            health.join("metrics1.csv"),
            "hr,accel_x,ts\n60,0.2,2021-06-22 04:17:00+00\n,0.3,2021-06-22 04:17:30+00\n",
        )
        .unwrap();

        let samples = load_heartrate(dir.path()).unwrap();
        let bpms: Vec<f64> = samples.iter().map(|s| s.bpm).collect();
        assert_eq!(bpms, vec![60.0, 61.0]);
        assert_eq!(
            samples[0].timestamp,
            Utc.with_ymd_and_hms(2021, 6, 22, 4, 17, 0).unwrap()
        );
    }

    #[test]
    fn sleep_parses_during_ranges() {
        let dir = export_dir();
        std::fs::write(
            dir.path().join("Health").join("sleeps.csv"),
            "score,during,is_nap\n\
             85,\"['2021-06-22 01:00:00+00','2021-06-22 08:30:00+00')\",false\n\
             70,\"['2021-06-22 22:00:00+00','2021-06-23 06:00:00+00')\",false\n",
        )
        .unwrap();

        let records = load_sleep(dir.path()).unwrap();
        assert_eq!(records.len(), 2);
        // 01:00 minus eight hours falls on the previous day.
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2021, 6, 21).unwrap());
        assert_eq!(records[0].hours(), 7.5);
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2021, 6, 22).unwrap());
        assert_eq!(records[1].score, Some(70.0));
    }

    #[test]
    fn missing_export_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_heartrate(dir.path()).unwrap_err(),
            LoadError::Io { .. }
        ));
    }
}
