//! Interval events, the unit every screen-time source produces.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::ValidationError;

/// Attribute naming the source a stream came from (e.g. `activitywatch`).
pub const SOURCE_KEY: &str = "$source";
/// Attribute naming the device an event was recorded on.
pub const HOSTNAME_KEY: &str = "$hostname";
/// Attribute holding the matched category followed by its ancestors.
pub const TAGS_KEY: &str = "$tags";
/// Attribute holding the matched leaf category.
pub const CATEGORY_KEY: &str = "$category";

/// A timestamped interval of tracked activity.
///
/// Serialized in the ActivityWatch shape: `timestamp` as RFC 3339, `duration`
/// as float seconds and `data` as a free-form object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent")]
pub struct Event {
    /// When the interval starts.
    pub timestamp: DateTime<Utc>,
    /// How long the interval lasts. Never negative, and `timestamp + duration`
    /// is always a representable instant.
    #[serde(serialize_with = "duration_seconds::serialize")]
    pub duration: Duration,
    /// Free-form attributes such as `app`, `title` or `url`.
    pub data: Map<String, Value>,
}

impl Event {
    /// Creates an event, rejecting negative durations and intervals whose end
    /// falls outside the representable range.
    pub fn new(
        timestamp: DateTime<Utc>,
        duration: Duration,
        data: Map<String, Value>,
    ) -> Result<Self, ValidationError> {
        if duration < Duration::zero() {
            return Err(ValidationError::NegativeDuration {
                seconds: duration_to_seconds(duration),
            });
        }
        if timestamp.checked_add_signed(duration).is_none() {
            return Err(ValidationError::EndOutOfRange {
                timestamp,
                seconds: duration_to_seconds(duration),
            });
        }
        Ok(Self {
            timestamp,
            duration,
            data,
        })
    }

    /// End of the half-open interval `[timestamp, end)`.
    ///
    /// Saturates at the latest representable instant for events built by hand
    /// with an oversized duration.
    pub fn end(&self) -> DateTime<Utc> {
        self.timestamp
            .checked_add_signed(self.duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// A copy of this event re-spanned to `[start, end)`, keeping its data.
    pub(crate) fn with_span(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            timestamp: start,
            duration: (end - start).max(Duration::zero()),
            data: self.data.clone(),
        }
    }

    /// Returns a string attribute, if present and a string.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Sets an attribute, replacing any previous value.
    pub fn set_attr(&mut self, key: &str, value: impl Into<Value>) {
        self.data.insert(key.to_string(), value.into());
    }

    /// The `$source` attribute.
    pub fn source(&self) -> Option<&str> {
        self.attr_str(SOURCE_KEY)
    }

    /// The `$hostname` attribute.
    pub fn hostname(&self) -> Option<&str> {
        self.attr_str(HOSTNAME_KEY)
    }

    /// The `$category` attribute set by classification.
    pub fn category(&self) -> Option<&str> {
        self.attr_str(CATEGORY_KEY)
    }

    /// The `$tags` set by classification, leaf first.
    pub fn tags(&self) -> Vec<&str> {
        self.data
            .get(TAGS_KEY)
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns true if classification tagged this event with `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().contains(&tag)
    }
}

/// Converts a duration to fractional seconds.
#[allow(clippy::cast_precision_loss)]
pub fn duration_to_seconds(duration: Duration) -> f64 {
    duration.num_microseconds().map_or_else(
        || duration.num_milliseconds() as f64 / 1_000.0,
        |us| us as f64 / 1_000_000.0,
    )
}

/// Converts a duration to fractional hours.
pub fn duration_to_hours(duration: Duration) -> f64 {
    duration_to_seconds(duration) / 3_600.0
}

/// Converts fractional seconds to a duration with microsecond precision.
#[allow(clippy::cast_possible_truncation)]
pub fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::microseconds((seconds * 1_000_000.0).round() as i64)
}

#[derive(Deserialize)]
struct RawEvent {
    timestamp: DateTime<Utc>,
    #[serde(deserialize_with = "duration_seconds::deserialize")]
    duration: Duration,
    #[serde(default)]
    data: Map<String, Value>,
}

impl TryFrom<RawEvent> for Event {
    type Error = ValidationError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        Self::new(raw.timestamp, raw.duration, raw.data)
    }
}

mod duration_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(super::duration_to_seconds(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = f64::deserialize(deserializer)?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "duration must be a non-negative number of seconds, got {seconds}"
            )));
        }
        Ok(super::seconds_to_duration(seconds))
    }
}
