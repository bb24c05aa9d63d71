//! Merging per-source event streams into one non-overlapping timeline.
//!
//! # Precedence
//!
//! Sources are folded one at a time with [`union_no_overlap`], which never
//! touches events already in the timeline. Whoever is folded first therefore
//! wins every contested instant. [`TimelineBuilder`] makes that order an
//! explicit per-source `priority` (lower wins, ties keep registration order)
//! instead of leaving it to the order in which loaders happen to run.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::event::Event;

/// Two consecutive events in a sorted stream whose intervals intersect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapError {
    /// Index of the second event of the overlapping pair.
    pub index: usize,
    /// End of the earlier event.
    pub first_end: DateTime<Utc>,
    /// Start of the later event.
    pub second_start: DateTime<Utc>,
}

impl fmt::Display for OverlapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "event {} starts at {} before the previous event ends at {}",
            self.index, self.second_start, self.first_end
        )
    }
}

impl std::error::Error for OverlapError {}

/// Errors raised while assembling a timeline.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// A source delivered a stream that overlaps itself.
    #[error("events from {source_name} overlap: {overlap}")]
    SourceOverlap {
        source_name: String,
        overlap: OverlapError,
    },
    /// The merged timeline overlaps after folding in a source. This is a bug.
    #[error("merged timeline overlaps after joining {source_name}: {overlap}")]
    MergeInvariant {
        source_name: String,
        overlap: OverlapError,
    },
    /// A source delivered an event outside the requested window.
    #[error("event from {source_name} at {timestamp} lies outside {since}..{until}")]
    OutOfWindow {
        source_name: String,
        timestamp: DateTime<Utc>,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },
    /// No source produced a single event.
    #[error("no events from any source")]
    NoEvents,
}

/// Verifies that a timestamp-sorted stream has no overlapping intervals.
pub fn verify_no_overlap(events: &[Event]) -> Result<(), OverlapError> {
    for (index, pair) in events.windows(2).enumerate() {
        let (first, second) = (&pair[0], &pair[1]);
        if second.timestamp < first.end() {
            return Err(OverlapError {
                index: index + 1,
                first_end: first.end(),
                second_start: second.timestamp,
            });
        }
    }
    Ok(())
}

/// Unions two non-overlapping streams, giving `first` priority.
///
/// Every event of `first` is kept unchanged. Events of `second` are kept only
/// where they don't collide with `first`: fully covered events are dropped and
/// partially covered ones are trimmed, or split in two when they straddle an
/// event of `first`. The result is sorted by timestamp.
pub fn union_no_overlap(first: &[Event], second: &[Event]) -> Vec<Event> {
    let mut first = first.to_vec();
    let mut second = second.to_vec();
    first.sort_by_key(|e| e.timestamp);
    second.sort_by_key(|e| e.timestamp);

    let mut merged = Vec::with_capacity(first.len() + second.len());
    let mut i1 = 0;
    let mut i2 = 0;
    // The remainder of `second[i2]` that hasn't been placed yet.
    let mut pending: Option<Event> = second.first().cloned();

    while i1 < first.len() {
        let Some(e2) = pending.take() else {
            break;
        };
        let e1 = &first[i1];

        if e2.end() <= e1.timestamp {
            // Entirely before e1.
            merged.push(e2);
            i2 += 1;
            pending = second.get(i2).cloned();
        } else if e1.end() <= e2.timestamp {
            // Entirely after e1.
            merged.push(e1.clone());
            i1 += 1;
            pending = Some(e2);
        } else if e2.timestamp < e1.timestamp {
            // Starts before e1: keep the head, carry the tail.
            merged.push(e2.with_span(e2.timestamp, e1.timestamp));
            pending = Some(e2.with_span(e1.timestamp, e2.end()));
        } else if e2.end() > e1.end() {
            // Starts inside e1 and runs past it.
            pending = Some(e2.with_span(e1.end(), e2.end()));
            merged.push(e1.clone());
            i1 += 1;
        } else {
            // Fully covered by e1.
            i2 += 1;
            pending = second.get(i2).cloned();
        }
    }

    merged.extend(first.drain(i1..));
    if let Some(e2) = pending {
        merged.push(e2);
        merged.extend(second.drain(i2 + 1..));
    }
    merged
}

/// Total time covered by a set of events, counting shared instants once.
pub fn covered_duration(events: &[Event]) -> Duration {
    let mut spans: Vec<(DateTime<Utc>, DateTime<Utc>)> = events
        .iter()
        .filter(|e| e.duration > Duration::zero())
        .map(|e| (e.timestamp, e.end()))
        .collect();
    spans.sort_by_key(|(start, _)| *start);

    let mut merged: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    for (start, end) in spans {
        if let Some(last) = merged.last_mut() {
            if start <= last.1 {
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((start, end));
    }

    merged
        .iter()
        .fold(Duration::zero(), |acc, (start, end)| acc + (*end - *start))
}

/// What happened when one source was folded into the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSummary {
    /// Source name, e.g. `activitywatch erb-laptop`.
    pub source_name: String,
    /// Merge priority the source was registered with.
    pub priority: u32,
    /// Events the source delivered.
    pub received: usize,
    /// Time the source added to the timeline after trimming.
    pub contributed: Duration,
}

/// A merged, non-overlapping, timestamp-sorted timeline.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Vec<Event>,
    joins: Vec<JoinSummary>,
}

impl Timeline {
    /// The merged events, sorted by timestamp.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Consumes the timeline, returning its events.
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Per-source join summaries in the order sources were folded.
    pub fn joins(&self) -> &[JoinSummary] {
        &self.joins
    }

    /// Total duration of all events in the timeline.
    pub fn total_duration(&self) -> Duration {
        self.events
            .iter()
            .fold(Duration::zero(), |acc, e| acc + e.duration)
    }
}

#[derive(Debug)]
struct SourceStream {
    name: String,
    priority: u32,
    events: Vec<Event>,
}

/// Builds a [`Timeline`] from prioritized sources.
#[derive(Debug, Default)]
pub struct TimelineBuilder {
    sources: Vec<SourceStream>,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl TimelineBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects events that start before `since` or end after `until`.
    #[must_use]
    pub fn window(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.window = Some((since, until));
        self
    }

    /// Registers a source. Lower `priority` wins contested time.
    #[must_use]
    pub fn source(mut self, name: impl Into<String>, priority: u32, events: Vec<Event>) -> Self {
        self.add_source(name, priority, events);
        self
    }

    /// Registers a source in place.
    pub fn add_source(&mut self, name: impl Into<String>, priority: u32, events: Vec<Event>) {
        self.sources.push(SourceStream {
            name: name.into(),
            priority,
            events,
        });
    }

    /// Folds all sources in priority order.
    pub fn build(self) -> Result<Timeline, TimelineError> {
        let mut sources = self.sources;
        // Stable sort keeps registration order among equal priorities.
        sources.sort_by_key(|s| s.priority);

        let mut timeline = Timeline::default();
        for source in sources {
            let SourceStream {
                name,
                priority,
                mut events,
            } = source;

            if events.is_empty() {
                tracing::info!(source = %name, "no events found, continuing");
                continue;
            }

            events.sort_by_key(|e| e.timestamp);
            verify_no_overlap(&events).map_err(|overlap| TimelineError::SourceOverlap {
                source_name: name.clone(),
                overlap,
            })?;

            if let Some((since, until)) = self.window {
                if let Some(outside) = events
                    .iter()
                    .find(|e| e.timestamp < since || e.end() > until)
                {
                    return Err(TimelineError::OutOfWindow {
                        source_name: name,
                        timestamp: outside.timestamp,
                        since,
                        until,
                    });
                }
            }

            tracing::info!(
                source = %name,
                priority,
                count = events.len(),
                start = %events[0].timestamp,
                end = %events[events.len() - 1].timestamp,
                "joining source"
            );

            let before = timeline.total_duration();
            let merged = union_no_overlap(&timeline.events, &events);
            verify_no_overlap(&merged).map_err(|overlap| TimelineError::MergeInvariant {
                source_name: name.clone(),
                overlap,
            })?;
            timeline.events = merged;

            let contributed = timeline.total_duration() - before;
            tracing::debug!(source = %name, contributed_s = contributed.num_seconds(), "source joined");
            timeline.joins.push(JoinSummary {
                source_name: name,
                priority,
                received: events.len(),
                contributed,
            });
        }

        if timeline.events.is_empty() {
            return Err(TimelineError::NoEvents);
        }
        Ok(timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{Map, json};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()
    }

    /// Event starting `start` minutes after t0, lasting `len` minutes.
    fn ev(start: i64, len: i64, title: &str) -> Event {
        let mut data = Map::new();
        data.insert("title".to_string(), json!(title));
        Event::new(
            t0() + Duration::minutes(start),
            Duration::minutes(len),
            data,
        )
        .unwrap()
    }

    fn spans(events: &[Event]) -> Vec<(i64, i64, String)> {
        events
            .iter()
            .map(|e| {
                (
                    (e.timestamp - t0()).num_minutes(),
                    (e.end() - t0()).num_minutes(),
                    e.attr_str("title").unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn union_keeps_disjoint_events_from_both() {
        let merged = union_no_overlap(&[ev(0, 10, "a")], &[ev(20, 5, "b")]);
        assert_eq!(
            spans(&merged),
            vec![(0, 10, "a".into()), (20, 25, "b".into())]
        );
    }

    #[test]
    fn union_drops_fully_covered_event() {
        let merged = union_no_overlap(&[ev(0, 30, "a")], &[ev(5, 10, "b")]);
        assert_eq!(spans(&merged), vec![(0, 30, "a".into())]);
    }

    #[test]
    fn union_trims_partially_covered_events() {
        let merged = union_no_overlap(&[ev(10, 10, "a")], &[ev(5, 10, "b"), ev(18, 10, "c")]);
        assert_eq!(
            spans(&merged),
            vec![
                (5, 10, "b".into()),
                (10, 20, "a".into()),
                (20, 28, "c".into())
            ]
        );
    }

    #[test]
    fn union_splits_straddling_event() {
        let merged = union_no_overlap(&[ev(10, 5, "a"), ev(20, 5, "b")], &[ev(0, 40, "x")]);
        assert_eq!(
            spans(&merged),
            vec![
                (0, 10, "x".into()),
                (10, 15, "a".into()),
                (15, 20, "x".into()),
                (20, 25, "b".into()),
                (25, 40, "x".into())
            ]
        );
        verify_no_overlap(&merged).unwrap();
    }

    #[test]
    fn union_with_empty_streams() {
        assert!(union_no_overlap(&[], &[]).is_empty());
        assert_eq!(union_no_overlap(&[ev(0, 1, "a")], &[]).len(), 1);
        assert_eq!(union_no_overlap(&[], &[ev(0, 1, "b")]).len(), 1);
    }

    #[test]
    fn verify_no_overlap_reports_offending_pair() {
        let err = verify_no_overlap(&[ev(0, 10, "a"), ev(5, 10, "b")]).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.first_end, t0() + Duration::minutes(10));
        assert_eq!(err.second_start, t0() + Duration::minutes(5));
    }

    #[test]
    fn covered_duration_counts_shared_time_once() {
        let events = [ev(0, 10, "a"), ev(5, 10, "b"), ev(30, 5, "c")];
        assert_eq!(covered_duration(&events), Duration::minutes(20));
    }

    #[test]
    fn builder_respects_priority_over_registration_order() {
        let timeline = TimelineBuilder::new()
            .source("toggl", 30, vec![ev(0, 60, "manual")])
            .source("activitywatch", 10, vec![ev(15, 15, "auto")])
            .build()
            .unwrap();

        assert_eq!(
            spans(timeline.events()),
            vec![
                (0, 15, "manual".into()),
                (15, 30, "auto".into()),
                (30, 60, "manual".into())
            ]
        );
        let order: Vec<&str> = timeline
            .joins()
            .iter()
            .map(|j| j.source_name.as_str())
            .collect();
        assert_eq!(order, vec!["activitywatch", "toggl"]);
        assert_eq!(timeline.joins()[1].contributed, Duration::minutes(45));
    }

    #[test]
    fn builder_keeps_registration_order_for_equal_priority() {
        let timeline = TimelineBuilder::new()
            .source("first", 10, vec![ev(0, 10, "first")])
            .source("second", 10, vec![ev(0, 10, "second")])
            .build()
            .unwrap();
        assert_eq!(spans(timeline.events()), vec![(0, 10, "first".into())]);
    }

    #[test]
    fn builder_skips_empty_sources() {
        let timeline = TimelineBuilder::new()
            .source("empty", 10, Vec::new())
            .source("fake", 40, vec![ev(0, 10, "a")])
            .build()
            .unwrap();
        assert_eq!(timeline.events().len(), 1);
        assert_eq!(timeline.joins().len(), 1);
    }

    #[test]
    fn builder_fails_when_all_sources_are_empty() {
        let err = TimelineBuilder::new()
            .source("empty", 10, Vec::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, TimelineError::NoEvents));
    }

    #[test]
    fn builder_rejects_self_overlapping_source() {
        let err = TimelineBuilder::new()
            .source("broken", 10, vec![ev(0, 10, "a"), ev(5, 10, "b")])
            .build()
            .unwrap_err();
        assert!(
            matches!(err, TimelineError::SourceOverlap { ref source_name, .. } if source_name == "broken")
        );
    }

    #[test]
    fn builder_rejects_events_outside_window() {
        let err = TimelineBuilder::new()
            .window(t0(), t0() + Duration::minutes(30))
            .source("aw", 10, vec![ev(20, 20, "late")])
            .build()
            .unwrap_err();
        assert!(matches!(err, TimelineError::OutOfWindow { .. }));
    }
}
