//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// An event duration was negative.
    #[error("duration must be non-negative, got {seconds}s")]
    NegativeDuration { seconds: f64 },

    /// An event's end lies outside the representable range.
    #[error("event at {timestamp} lasting {seconds}s ends outside the representable range")]
    EndOutOfRange {
        timestamp: DateTime<Utc>,
        seconds: f64,
    },

    /// Invalid data source value.
    #[error("invalid data source: {value}")]
    InvalidDataSource { value: String },
}

/// Where a stream of screen-time events comes from.
///
/// The order of the variants is also the default merge precedence: earlier
/// variants win when two sources cover the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Window/AFK watchers of a local ActivityWatch server.
    ActivityWatch,
    /// Phone usage exported from Smartertime.
    Smartertime,
    /// Manually logged Toggl time entries.
    Toggl,
    /// Synthetic events, for demos and tests.
    Fake,
}

impl DataSource {
    /// All sources in default precedence order.
    pub const ALL: [Self; 4] = [Self::ActivityWatch, Self::Smartertime, Self::Toggl, Self::Fake];

    /// String representation, as stored in the `$source` attribute.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ActivityWatch => "activitywatch",
            Self::Smartertime => "smartertime",
            Self::Toggl => "toggl",
            Self::Fake => "fake",
        }
    }

    /// Default merge priority (lower wins).
    #[must_use]
    pub const fn default_priority(&self) -> u32 {
        match self {
            Self::ActivityWatch => 10,
            Self::Smartertime => 20,
            Self::Toggl => 30,
            Self::Fake => 40,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DataSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activitywatch" | "aw" => Ok(Self::ActivityWatch),
            "smartertime" => Ok(Self::Smartertime),
            "toggl" => Ok(Self::Toggl),
            "fake" => Ok(Self::Fake),
            _ => Err(ValidationError::InvalidDataSource {
                value: s.to_string(),
            }),
        }
    }
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new value after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated category name.
    ///
    /// Category names must be non-empty. They are compared exactly, so
    /// `Work` and `work` are different categories.
    CategoryName, "category name"
);
