//! Ordered event streams.
//!
//! An [`EventStream`] is the validated input of one replay: a finite
//! sequence whose timestamps never decrease. Same-millisecond bursts are
//! common in combat logs, so equal timestamps are kept in arrival order.
//! Timestamps that go backwards are handled according to [`StreamPolicy`].

use crate::config::StreamPolicy;
use crate::encounter::Fight;
use crate::error::StreamError;
use crate::event::{Event, Timestamp};
use std::ops::Deref;
use tracing::{debug, warn};

/// A finite, non-decreasing sequence of events.
///
/// # Examples
///
/// ```rust
/// use combatlog::{ActorId, Event, EventKind, EventStream, StreamPolicy};
///
/// let events = vec![
///     Event::new(200, ActorId(1), EventKind::Cast),
///     Event::new(100, ActorId(1), EventKind::Cast),
/// ];
///
/// let sorted = EventStream::new(events.clone(), StreamPolicy::Sort).unwrap();
/// assert_eq!(sorted[0].timestamp, 100);
///
/// assert!(EventStream::new(events, StreamPolicy::Strict).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventStream {
    events: Vec<Event>,
}

impl EventStream {
    /// Validate `events` under `policy`.
    pub fn new(mut events: Vec<Event>, policy: StreamPolicy) -> Result<Self, StreamError> {
        let mut out_of_order = 0usize;
        for (index, pair) in events.windows(2).enumerate() {
            let (previous, current) = (pair[0].timestamp, pair[1].timestamp);
            if current < previous {
                match policy {
                    StreamPolicy::Strict => {
                        return Err(StreamError::OutOfOrder {
                            index: index + 1,
                            timestamp: current,
                            previous,
                        });
                    }
                    StreamPolicy::Sort => out_of_order += 1,
                }
            }
        }

        if out_of_order > 0 {
            warn!(
                out_of_order,
                total = events.len(),
                "Event stream was not ordered by timestamp, re-sorting"
            );
            // stable: ties keep arrival order
            events.sort_by_key(|e| e.timestamp);
        }

        Ok(Self { events })
    }

    /// Decode a JSON array of events in the log host's normalized format.
    pub fn from_json(json: &str, policy: StreamPolicy) -> Result<Self, StreamError> {
        let events: Vec<Event> = serde_json::from_str(json)?;
        Self::new(events, policy)
    }

    /// Drop every event outside the fight window.
    pub fn clip_to(self, fight: &Fight) -> Self {
        let before = self.events.len();
        let events: Vec<Event> = self
            .events
            .into_iter()
            .filter(|e| fight.contains(e.timestamp))
            .collect();
        if events.len() != before {
            debug!(
                dropped = before - events.len(),
                "Dropped events outside the fight window"
            );
        }
        Self { events }
    }

    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.events.first().map(|e| e.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.events.last().map(|e| e.timestamp)
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

impl Deref for EventStream {
    type Target = [Event];

    fn deref(&self) -> &[Event] {
        &self.events
    }
}

impl<'a> IntoIterator for &'a EventStream {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorId;
    use crate::event::{AbilityId, EventKind};

    fn cast(ts: Timestamp, ability: u32) -> Event {
        Event::new(ts, ActorId(1), EventKind::Cast).with_ability(AbilityId(ability))
    }

    #[test]
    fn test_ordered_stream_is_untouched() {
        let events = vec![cast(0, 1), cast(5, 2), cast(5, 3), cast(9, 4)];
        let stream = EventStream::new(events.clone(), StreamPolicy::Strict).unwrap();
        assert_eq!(stream.into_events(), events);
    }

    #[test]
    fn test_sort_keeps_arrival_order_for_ties() {
        let events = vec![cast(10, 1), cast(5, 2), cast(10, 3), cast(5, 4)];
        let stream = EventStream::new(events, StreamPolicy::Sort).unwrap();
        let abilities: Vec<u32> = stream.iter().map(|e| e.ability.unwrap().0).collect();
        assert_eq!(abilities, vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_strict_reports_first_violation() {
        let events = vec![cast(10, 1), cast(20, 2), cast(15, 3)];
        let err = EventStream::new(events, StreamPolicy::Strict).unwrap_err();
        assert_eq!(
            err,
            StreamError::OutOfOrder {
                index: 2,
                timestamp: 15,
                previous: 20
            }
        );
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {"timestamp": 1, "type": "cast", "sourceID": 1, "ability": {"guid": 5}},
            {"timestamp": 2, "type": "death", "sourceID": 9, "targetID": 1}
        ]"#;
        let stream = EventStream::from_json(json, StreamPolicy::Strict).unwrap();
        assert_eq!(stream.len(), 2);
        assert_eq!(stream.last_timestamp(), Some(2));
    }

    #[test]
    fn test_from_json_unknown_kind() {
        let json = r#"[{"timestamp": 1, "type": "combatantinfo_v9", "sourceID": 1}]"#;
        let err = EventStream::from_json(json, StreamPolicy::Sort).unwrap_err();
        assert!(matches!(err, StreamError::Malformed(_)));
    }

    #[test]
    fn test_clip_to_fight() {
        let stream =
            EventStream::new(vec![cast(0, 1), cast(50, 2), cast(500, 3)], StreamPolicy::Strict)
                .unwrap();
        let clipped = stream.clip_to(&Fight::new(10, 100, 0));
        assert_eq!(clipped.len(), 1);
        assert_eq!(clipped.first_timestamp(), Some(50));
    }
}
