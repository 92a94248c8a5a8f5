//! Event store query surface used by the clipper and the aggregator.
//!
//! A store holds one row per coded occurrence, keyed by observation, subject,
//! behavior code, behavior type, modifier string and occurrence time. The
//! clipper edits rows in place (insert synthetic boundaries, delete outside
//! the window); the aggregator only selects.
//!
//! [`MemoryStore`] is a plain vector. The SQLite implementation lives in the
//! `tb-db` crate.

use std::convert::Infallible;

use serde::{Deserialize, Serialize};

use crate::behavior_type::BehaviorType;
use crate::ethogram::Ethogram;
use crate::event::Event;
use crate::types::{BehaviorCode, ObservationId};

/// One stored occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub observation: ObservationId,
    pub subject: String,
    pub code: BehaviorCode,
    pub kind: BehaviorType,
    pub modifiers: String,
    pub occurrence_ms: i64,
}

impl StoredEvent {
    /// Builds a row from a coded event, or `None` if its code is undefined.
    pub fn from_event(observation: &ObservationId, ethogram: &Ethogram, event: &Event) -> Option<Self> {
        let kind = ethogram.behavior_type(event.behavior.as_str())?;
        Some(Self {
            observation: observation.clone(),
            subject: event.subject.clone(),
            code: event.behavior.clone(),
            kind,
            modifiers: event.modifier_string(),
            occurrence_ms: event.time_ms,
        })
    }
}

/// Row filter; every `Some` field must match.
///
/// `before_ms` selects `occurrence < before_ms`, `after_ms` selects
/// `occurrence > after_ms`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub observation: Option<ObservationId>,
    pub subject: Option<String>,
    pub code: Option<BehaviorCode>,
    pub kind: Option<BehaviorType>,
    pub modifiers: Option<String>,
    pub before_ms: Option<i64>,
    pub after_ms: Option<i64>,
}

impl EventFilter {
    pub fn observation(observation: &ObservationId) -> Self {
        Self {
            observation: Some(observation.clone()),
            ..Self::default()
        }
    }

    /// Restricts the filter to one (subject, code, modifiers) stream.
    #[must_use]
    pub fn stream(mut self, key: &StreamKey) -> Self {
        self.subject = Some(key.subject.clone());
        self.code = Some(key.code.clone());
        self.modifiers = Some(key.modifiers.clone());
        self
    }

    #[must_use]
    pub const fn before(mut self, time_ms: i64) -> Self {
        self.before_ms = Some(time_ms);
        self
    }

    #[must_use]
    pub const fn after(mut self, time_ms: i64) -> Self {
        self.after_ms = Some(time_ms);
        self
    }

    #[must_use]
    pub const fn kind(mut self, kind: BehaviorType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn matches(&self, row: &StoredEvent) -> bool {
        self.observation.as_ref().is_none_or(|o| *o == row.observation)
            && self.subject.as_ref().is_none_or(|s| *s == row.subject)
            && self.code.as_ref().is_none_or(|c| *c == row.code)
            && self.kind.is_none_or(|k| k == row.kind)
            && self.modifiers.as_ref().is_none_or(|m| *m == row.modifiers)
            && self.before_ms.is_none_or(|t| row.occurrence_ms < t)
            && self.after_ms.is_none_or(|t| row.occurrence_ms > t)
    }
}

/// Identity of a (subject, behavior, modifiers) occurrence stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamKey {
    pub subject: String,
    pub code: BehaviorCode,
    pub modifiers: String,
    pub kind: BehaviorType,
}

impl From<&StoredEvent> for StreamKey {
    fn from(row: &StoredEvent) -> Self {
        Self {
            subject: row.subject.clone(),
            code: row.code.clone(),
            modifiers: row.modifiers.clone(),
            kind: row.kind,
        }
    }
}

/// A keyed, filterable event store.
///
/// `select` returns rows ordered by observation, subject, code, modifiers and
/// occurrence; rows that tie keep their insertion order.
pub trait EventStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn insert(&mut self, rows: &[StoredEvent]) -> Result<usize, Self::Error>;

    fn select(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>, Self::Error>;

    /// Deletes matching rows, returning how many were removed.
    fn delete(&mut self, filter: &EventFilter) -> Result<usize, Self::Error>;

    fn count(&self, filter: &EventFilter) -> Result<usize, Self::Error> {
        Ok(self.select(filter)?.len())
    }

    /// Distinct streams of one observation, sorted.
    fn streams(&self, observation: &ObservationId) -> Result<Vec<StreamKey>, Self::Error> {
        let mut keys: Vec<StreamKey> = self
            .select(&EventFilter::observation(observation))?
            .iter()
            .map(StreamKey::from)
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

/// Loads one observation's events, skipping undefined behavior codes.
///
/// Returns the number of rows inserted.
pub fn load_observation<S: EventStore>(
    store: &mut S,
    observation: &ObservationId,
    ethogram: &Ethogram,
    events: &[Event],
) -> Result<usize, S::Error> {
    let rows: Vec<StoredEvent> = events
        .iter()
        .filter_map(|event| StoredEvent::from_event(observation, ethogram, event))
        .collect();
    let skipped = events.len() - rows.len();
    if skipped > 0 {
        tracing::warn!(
            observation = %observation,
            skipped,
            "not loading events with undefined behavior codes"
        );
    }
    store.insert(&rows)
}

/// In-memory event store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    rows: Vec<StoredEvent>,
}

impl MemoryStore {
    pub const fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Concatenates several stores, keeping each store's row order.
    pub fn merge(stores: impl IntoIterator<Item = Self>) -> Self {
        Self {
            rows: stores.into_iter().flat_map(|store| store.rows).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl EventStore for MemoryStore {
    type Error = Infallible;

    fn insert(&mut self, rows: &[StoredEvent]) -> Result<usize, Self::Error> {
        self.rows.extend_from_slice(rows);
        Ok(rows.len())
    }

    fn select(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>, Self::Error> {
        let mut selected: Vec<StoredEvent> = self
            .rows
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        // stable, so ties keep insertion order
        selected.sort_by(|a, b| {
            (&a.observation, &a.subject, &a.code, &a.modifiers, a.occurrence_ms).cmp(&(
                &b.observation,
                &b.subject,
                &b.code,
                &b.modifiers,
                b.occurrence_ms,
            ))
        });
        Ok(selected)
    }

    fn delete(&mut self, filter: &EventFilter) -> Result<usize, Self::Error> {
        let before = self.rows.len();
        self.rows.retain(|row| !filter.matches(row));
        Ok(before - self.rows.len())
    }

    fn count(&self, filter: &EventFilter) -> Result<usize, Self::Error> {
        Ok(self.rows.iter().filter(|row| filter.matches(row)).count())
    }
}
