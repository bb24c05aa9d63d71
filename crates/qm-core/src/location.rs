//! Time spent near places and people, from location history.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, DurationRound, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::daily::{DailySeries, DailyTable, DayBoundary};
use crate::event::duration_to_hours;

/// Spacing of the resampled grid.
pub const SLOT: Duration = Duration::minutes(10);
/// Longest gap a known position is carried forward over.
pub const MAX_FILL: Duration = Duration::hours(12);
/// Distance in degrees under which two people count as together.
pub const COLOCATION_RADIUS: f64 = 0.01;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocationError {
    /// A name is neither a configured place nor a known location history.
    #[error("unknown location {name}")]
    UnknownLocation { name: String },
    /// There is no location history for the user themselves.
    #[error("no location history for {name}")]
    MissingTrack { name: String },
}

/// One raw position fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationPoint {
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub long: f64,
}

/// A configured place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub lat: f64,
    pub long: f64,
    /// Radius in degrees.
    #[serde(default = "default_accuracy")]
    pub accuracy: f64,
}

const fn default_accuracy() -> f64 {
    0.001
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Positions on a regular 10 minute grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    slots: BTreeMap<DateTime<Utc>, (f64, f64)>,
}

impl Track {
    /// Resamples raw fixes onto the grid.
    ///
    /// Each slot takes the latest fix at or before it, as long as that fix is
    /// at most 12 hours old. Fixes sharing a timestamp keep the first one.
    pub fn resample(points: &[LocationPoint]) -> Self {
        let mut fixes: BTreeMap<DateTime<Utc>, (f64, f64)> = BTreeMap::new();
        for p in points {
            fixes.entry(p.timestamp).or_insert((p.lat, p.long));
        }
        let (Some(first), Some(last)) = (fixes.keys().next(), fixes.keys().next_back()) else {
            return Self::default();
        };
        let Ok(mut tick) = first.duration_trunc(SLOT) else {
            return Self::default();
        };

        let mut slots = BTreeMap::new();
        while tick <= *last {
            if let Some((ts, pos)) = fixes.range(..=tick).next_back() {
                if tick - *ts <= MAX_FILL {
                    slots.insert(tick, *pos);
                }
            }
            tick += SLOT;
        }
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn hours_where(
        slot_times: impl Iterator<Item = DateTime<Utc>>,
        boundary: &DayBoundary,
    ) -> DailySeries {
        let mut hours: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for t in slot_times {
            *hours.entry(boundary.date_of(t)).or_insert(0.0) += duration_to_hours(SLOT);
        }
        DailySeries::zero_filled(hours)
    }
}

/// Hours per day `track` was within `radius` degrees of `place`.
pub fn proximity_to_location(
    track: &Track,
    place: (f64, f64),
    radius: f64,
    boundary: &DayBoundary,
) -> DailySeries {
    Track::hours_where(
        track
            .slots
            .iter()
            .filter(|(_, pos)| distance(**pos, place) < radius)
            .map(|(t, _)| *t),
        boundary,
    )
}

/// Hours per day two tracks were within 0.01 degrees of each other.
pub fn colocate(a: &Track, b: &Track, boundary: &DayBoundary) -> DailySeries {
    Track::hours_where(
        a.slots
            .iter()
            .filter(|(t, pos)| {
                b.slots
                    .get(t)
                    .is_some_and(|other| distance(**pos, *other) < COLOCATION_RADIUS)
            })
            .map(|(t, _)| *t),
        boundary,
    )
}

/// One column per place or person: hours per day spent there or together.
///
/// Without a whitelist every configured place and every other known track is
/// included. `me` names the user's own track and is never a column.
pub fn location_daily_table(
    me: &str,
    tracks: &BTreeMap<String, Track>,
    places: &BTreeMap<String, Place>,
    whitelist: Option<&[String]>,
    boundary: &DayBoundary,
) -> Result<DailyTable, LocationError> {
    let own = tracks.get(me).ok_or_else(|| LocationError::MissingTrack {
        name: me.to_string(),
    })?;
    let names: Vec<&str> = whitelist.map_or_else(
        || places.keys().chain(tracks.keys()).map(String::as_str).collect(),
        |names| names.iter().map(String::as_str).collect(),
    );

    let mut table = DailyTable::new();
    for name in names.into_iter().filter(|n| *n != me) {
        let series = if let Some(place) = places.get(name) {
            proximity_to_location(own, (place.lat, place.long), place.accuracy, boundary)
        } else if let Some(other) = tracks.get(name) {
            colocate(own, other, boundary)
        } else {
            return Err(LocationError::UnknownLocation {
                name: name.to_string(),
            });
        };
        table.insert_series(name, &series);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fix(h: u32, m: u32, lat: f64, long: f64) -> LocationPoint {
        LocationPoint {
            timestamp: Utc.with_ymd_and_hms(2024, 7, 1, h, m, 0).unwrap(),
            lat,
            long,
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    #[test]
    fn resample_fills_forward_onto_grid() {
        let track = Track::resample(&[fix(10, 3, 1.0, 1.0), fix(11, 0, 2.0, 2.0)]);
        // 10:00 precedes the first fix, so the grid starts with data at 10:10.
        assert_eq!(track.len(), 6);
        assert_eq!(
            track.slots.values().next_back(),
            Some(&(2.0, 2.0))
        );
    }

    #[test]
    fn resample_stops_filling_after_twelve_hours() {
        let track = Track::resample(&[fix(0, 0, 1.0, 1.0), fix(23, 0, 1.0, 1.0)]);
        // Slots 00:00..=12:00 plus the final 23:00 slot.
        assert_eq!(track.len(), 6 * 12 + 1 + 1);
    }

    #[test]
    fn proximity_counts_slots_within_radius() {
        let track = Track::resample(&[fix(8, 0, 55.0, 13.0), fix(9, 0, 56.0, 13.0)]);
        let series = proximity_to_location(&track, (55.0, 13.0), 0.001, &DayBoundary::utc());
        assert!((series.get(date(1)).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn colocate_requires_both_tracks_close() {
        let me = Track::resample(&[fix(8, 0, 55.0, 13.0), fix(9, 0, 55.0, 13.0)]);
        let friend = Track::resample(&[fix(8, 30, 55.005, 13.0), fix(9, 0, 57.0, 13.0)]);
        let series = colocate(&me, &friend, &DayBoundary::utc());
        // 08:30, 08:40 and 08:50 overlap within 0.01 degrees.
        assert!((series.get(date(1)).unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn daily_table_rejects_unknown_names() {
        let mut tracks = BTreeMap::new();
        tracks.insert("me".to_string(), Track::resample(&[fix(8, 0, 1.0, 1.0)]));
        let mut places = BTreeMap::new();
        places.insert(
            "home".to_string(),
            Place {
                lat: 1.0,
                long: 1.0,
                accuracy: 0.001,
            },
        );

        let table =
            location_daily_table("me", &tracks, &places, None, &DayBoundary::utc()).unwrap();
        assert_eq!(table.columns(), &["home"]);

        let whitelist = vec!["office".to_string()];
        let err = location_daily_table(
            "me",
            &tracks,
            &places,
            Some(&whitelist),
            &DayBoundary::utc(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            LocationError::UnknownLocation {
                name: "office".to_string()
            }
        );

        let err = location_daily_table("you", &tracks, &places, None, &DayBoundary::utc())
            .unwrap_err();
        assert!(matches!(err, LocationError::MissingTrack { .. }));
    }
}
