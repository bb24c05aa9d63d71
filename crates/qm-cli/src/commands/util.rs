//! Shared utilities for CLI commands.

use std::fmt::Display;
use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use regex::Regex;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a datetime string as a date, ISO 8601 or relative time.
///
/// Supports:
/// - Date: "2024-01-15" (midnight UTC)
/// - ISO 8601: "2024-01-15T10:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str) -> anyhow::Result<DateTime<Utc>> {
    parse_datetime_at(s, Utc::now())
}

/// Like [`parse_datetime`], with relative times counted back from `now`.
pub fn parse_datetime_at(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use a date (e.g., 2024-01-15), ISO 8601 (e.g., 2024-01-15T10:30:00Z) or relative (e.g., '2 weeks ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Logs a failed source and turns it into `None`, so the caller can continue
/// with the remaining sources.
pub fn skip_failed<T, E: Display>(source: &str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(source, error = %err, "failed to load source, skipping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_datetime_at("2024-01-15T10:30:00+02:00", now()).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_plain_date() {
        let dt = parse_datetime_at("2024-01-15", now()).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_relative() {
        assert_eq!(
            parse_datetime_at("2 weeks ago", now()).unwrap(),
            now() - Duration::weeks(2)
        );
        assert_eq!(
            parse_datetime_at("1 day ago", now()).unwrap(),
            now() - Duration::days(1)
        );
        assert_eq!(
            parse_datetime_at("30 minutes ago", now()).unwrap(),
            now() - Duration::minutes(30)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_datetime_at("yesterday", now()).is_err());
        assert!(parse_datetime_at("99999999999 weeks ago", now()).is_err());
    }

    #[test]
    fn test_skip_failed() {
        assert_eq!(skip_failed::<_, String>("ok", Ok(3)), Some(3));
        assert_eq!(skip_failed::<i32, _>("bad", Err("boom")), None);
    }
}
