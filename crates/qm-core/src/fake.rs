//! Deterministic synthetic screen-time events, for demos and tests.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};

use crate::event::{Event, SOURCE_KEY, seconds_to_duration};
use crate::types::DataSource;

const PARETO_ALPHA: f64 = 0.5;
const PARETO_MODE_SECONDS: f64 = 5.0;
const MAX_DURATION: Duration = Duration::hours(1);

/// Relative weights of generated event attributes. `None` leaves a gap.
const WEIGHTED_DATA: &[(u32, Option<&[(&str, &str)]>)] = &[
    (100, None),
    (2, Some(&[("title", "Uncategorized")])),
    (5, Some(&[("title", "ActivityWatch")])),
    (4, Some(&[("title", "Thankful")])),
    (3, Some(&[("title", "QuantifiedMe")])),
    (3, Some(&[("title", "FMAA01 - Analysis in One Variable")])),
    (3, Some(&[("title", "EDAN95 - Applied Machine Learning")])),
    (2, Some(&[("title", "Stack Overflow")])),
    (2, Some(&[("title", "phone: Brilliant")])),
    (2, Some(&[("url", "youtube.com"), ("title", "YouTube")])),
    (1, Some(&[("url", "reddit.com")])),
    (1, Some(&[("url", "facebook.com")])),
    (1, Some(&[("title", "Plex")])),
    (1, Some(&[("title", "Spotify")])),
    (1, Some(&[("title", "Fallout 4")])),
];

fn pick_data(rng: &mut StdRng) -> Option<&'static [(&'static str, &'static str)]> {
    let total: u32 = WEIGHTED_DATA.iter().map(|(w, _)| w).sum();
    let mut roll = rng.random_range(0..total);
    for (weight, data) in WEIGHTED_DATA {
        if roll < *weight {
            return *data;
        }
        roll -= weight;
    }
    None
}

/// Lomax (Pareto II) sample scaled by the mode, capped at one hour.
#[allow(clippy::cast_precision_loss)]
fn pick_duration(rng: &mut StdRng) -> Duration {
    let u: f64 = rng.random();
    let sample = (1.0 - u).powf(-1.0 / PARETO_ALPHA) - 1.0;
    let seconds = (sample * PARETO_MODE_SECONDS).min(MAX_DURATION.num_seconds() as f64);
    seconds_to_duration(seconds)
}

/// Generates a non-overlapping stream inside `[start + 1s, end)`.
///
/// The same seed always yields the same events.
pub fn fake_events(start: DateTime<Utc>, end: DateTime<Utc>, seed: u64) -> Vec<Event> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut events = Vec::new();
    let mut cursor = start + Duration::seconds(1);

    while cursor < end {
        let duration = pick_duration(&mut rng);
        let timestamp = cursor;
        cursor += duration;
        if cursor > end {
            break;
        }
        let Some(attrs) = pick_data(&mut rng) else {
            continue;
        };
        let mut data: Map<String, Value> = attrs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
            .collect();
        data.insert(SOURCE_KEY.to_string(), DataSource::Fake.as_str().into());
        if let Ok(event) = Event::new(timestamp, duration, data) {
            events.push(event);
        }
    }
    events
}
