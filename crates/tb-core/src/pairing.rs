//! State pairing: START/STOP/POINT status for each coded event.
//!
//! A State behavior has no explicit start or stop tag. The status of an
//! occurrence comes from its position: the first occurrence of a
//! (subject, behavior, modifiers) key starts the state, the next one stops
//! it, and so on. This module tracks a running parity per key, so one pass
//! over the (time-sorted) log is enough.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::behavior_type::BehaviorType;
use crate::ethogram::Ethogram;
use crate::event::{Event, PairingKey};
use crate::types::BehaviorCode;

/// Derived status of a coded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventStatus {
    Start,
    Stop,
    Point,
}

impl EventStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Stop => "STOP",
            Self::Point => "POINT",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event with its derived status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedEvent {
    #[serde(flatten)]
    pub event: Event,
    pub status: EventStatus,
}

/// Output of [`flag_events`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pairing {
    /// Events whose behavior is defined in the ethogram, in input order.
    pub flagged: Vec<FlaggedEvent>,
    /// Number of events skipped because their behavior code is undefined.
    pub skipped_undefined: usize,
}

/// Assigns START/STOP/POINT to every event whose behavior is defined.
///
/// Events must be sorted by time ascending. Events with an undefined behavior
/// code are left out of the result and counted in
/// [`Pairing::skipped_undefined`].
pub fn flag_events(ethogram: &Ethogram, events: &[Event]) -> Pairing {
    // true = an odd number of occurrences seen so far (state is open)
    let mut open: HashMap<PairingKey, bool> = HashMap::new();
    let mut flagged = Vec::with_capacity(events.len());
    let mut skipped_undefined = 0;

    for event in events {
        let Some(kind) = ethogram.behavior_type(event.behavior.as_str()) else {
            skipped_undefined += 1;
            continue;
        };

        let status = match kind {
            BehaviorType::Point => EventStatus::Point,
            BehaviorType::State => {
                let is_open = open.entry(event.pairing_key()).or_insert(false);
                let status = if *is_open {
                    EventStatus::Stop
                } else {
                    EventStatus::Start
                };
                *is_open = !*is_open;
                status
            }
        };

        flagged.push(FlaggedEvent {
            event: event.clone(),
            status,
        });
    }

    if skipped_undefined > 0 {
        tracing::warn!(
            skipped = skipped_undefined,
            "skipped events with behavior codes missing from the ethogram"
        );
    }
    tracing::debug!(flagged = flagged.len(), "flagged events");

    Pairing {
        flagged,
        skipped_undefined,
    }
}

/// A state occurrence `[start, stop)` or a point occurrence (`start == stop`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub subject: String,
    pub behavior: BehaviorCode,
    pub modifiers: String,
    pub start_ms: i64,
    pub stop_ms: i64,
    pub kind: BehaviorType,
}

impl Interval {
    pub const fn duration_ms(&self) -> i64 {
        self.stop_ms - self.start_ms
    }
}

/// Builds intervals from flagged events.
///
/// Each STOP closes the START of the same key. A START left open at the end
/// of the log produces no interval. The result is ordered by start time.
pub fn build_intervals(flagged: &[FlaggedEvent]) -> Vec<Interval> {
    let mut open_starts: HashMap<PairingKey, i64> = HashMap::new();
    let mut intervals = Vec::new();

    for FlaggedEvent { event, status } in flagged {
        match status {
            EventStatus::Point => intervals.push(Interval {
                subject: event.subject.clone(),
                behavior: event.behavior.clone(),
                modifiers: event.modifier_string(),
                start_ms: event.time_ms,
                stop_ms: event.time_ms,
                kind: BehaviorType::Point,
            }),
            EventStatus::Start => {
                open_starts.insert(event.pairing_key(), event.time_ms);
            }
            EventStatus::Stop => {
                let key = event.pairing_key();
                if let Some(start_ms) = open_starts.remove(&key) {
                    intervals.push(Interval {
                        subject: key.subject,
                        behavior: key.behavior,
                        modifiers: key.modifiers,
                        start_ms,
                        stop_ms: event.time_ms,
                        kind: BehaviorType::State,
                    });
                }
            }
        }
    }

    intervals.sort_by_key(|interval| interval.start_ms);
    intervals
}
