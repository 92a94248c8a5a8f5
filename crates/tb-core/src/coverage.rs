//! Observation exhaustivity: how much of the coded span has any behavior active.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::ethogram::Ethogram;
use crate::event::Event;
use crate::interval::{IntervalSet, Span};
use crate::types::{ms_to_seconds, round_to};

/// Result of [`observation_exhaustivity`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Exhaustivity {
    /// Percentage of the theoretical span covered, per subject on average.
    pub percent: f64,
    /// Events ignored because their code is not in the ethogram.
    pub skipped_undefined: usize,
}

/// Computes the exhaustivity of one observation.
///
/// State codes come from the ethogram; when the ethogram is empty they come
/// from `state_codes` instead, and no event is treated as undefined.
///
/// Within a (subject, behavior), State occurrences are consumed two at a time
/// as `[first, second)`, ignoring modifiers. A trailing unmatched occurrence is
/// dropped. Other behaviors contribute an instant.
pub fn observation_exhaustivity(
    events: &[Event],
    ethogram: &Ethogram,
    state_codes: Option<&BTreeSet<String>>,
) -> Exhaustivity {
    let derived;
    let state_codes = if ethogram.is_empty() {
        state_codes
    } else {
        derived = ethogram.state_codes();
        Some(&derived)
    };
    let is_state = |code: &str| state_codes.is_some_and(|codes| codes.contains(code));

    let mut per_subject: BTreeMap<&str, Vec<Span>> = BTreeMap::new();
    let mut pending: HashMap<(&str, &str), i64> = HashMap::new();
    let mut skipped_undefined = 0;

    for event in events {
        let code = event.behavior.as_str();
        if !ethogram.is_empty() && ethogram.get(code).is_none() {
            skipped_undefined += 1;
            continue;
        }

        let spans = per_subject.entry(event.subject.as_str()).or_default();
        if is_state(code) {
            let key = (event.subject.as_str(), code);
            if let Some(open) = pending.remove(&key) {
                spans.push(Span::new(open, event.time_ms));
            } else {
                pending.insert(key, event.time_ms);
            }
        } else {
            spans.push(Span::point(event.time_ms));
        }
    }

    if skipped_undefined > 0 {
        tracing::warn!(
            skipped = skipped_undefined,
            "exhaustivity ignored events with undefined behavior codes"
        );
    }

    let theoretical_ms = match (
        events.iter().map(|e| e.time_ms).max(),
        events.iter().map(|e| e.time_ms).min(),
    ) {
        (Some(last), Some(first)) => last - first,
        _ => 0,
    };

    if per_subject.is_empty() || theoretical_ms == 0 {
        return Exhaustivity {
            percent: 0.0,
            skipped_undefined,
        };
    }

    let subject_count = per_subject.len();
    let observed_ms: i64 = per_subject
        .into_values()
        .map(|spans| IntervalSet::from_spans(spans).total_ms().min(theoretical_ms))
        .sum();

    #[allow(clippy::cast_precision_loss)]
    let percent = ms_to_seconds(observed_ms)
        / (subject_count as f64 * ms_to_seconds(theoretical_ms))
        * 100.0;

    tracing::debug!(percent, observed_ms, theoretical_ms, "computed exhaustivity");

    Exhaustivity {
        percent: round_to(percent, 1),
        skipped_undefined,
    }
}
