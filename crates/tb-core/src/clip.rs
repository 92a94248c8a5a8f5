//! Window clipping with boundary synthesis.
//!
//! A state that is running when the window opens (an odd number of
//! occurrences before `min_ms`) gets a synthetic occurrence at `min_ms`; one
//! still running when the window closes gets one at `max_ms`. Only then are
//! occurrences outside the window deleted. Point behaviors are only filtered.

use crate::behavior_type::BehaviorType;
use crate::error::AnalysisError;
use crate::store::{EventFilter, EventStore, StoredEvent};
use crate::types::ObservationId;
use crate::window::AnalysisWindow;

/// What a clip pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipSummary {
    pub synthesized: usize,
    pub discarded: usize,
}

/// Clips one observation's rows in `store` to `window`.
///
/// Clipping an already clipped observation with the same window changes
/// nothing.
pub fn clip_observation<S: EventStore>(
    store: &mut S,
    observation: &ObservationId,
    window: &AnalysisWindow,
) -> Result<ClipSummary, AnalysisError> {
    let mut synthetic = Vec::new();

    for key in store.streams(observation).map_err(AnalysisError::store)? {
        if key.kind != BehaviorType::State {
            continue;
        }
        let stream = EventFilter::observation(observation).stream(&key);

        let before = store
            .count(&stream.clone().before(window.min_ms))
            .map_err(AnalysisError::store)?;
        let after = store
            .count(&stream.after(window.max_ms))
            .map_err(AnalysisError::store)?;

        for (count, boundary_ms) in [(before, window.min_ms), (after, window.max_ms)] {
            if count % 2 == 1 {
                synthetic.push(StoredEvent {
                    observation: observation.clone(),
                    subject: key.subject.clone(),
                    code: key.code.clone(),
                    kind: key.kind,
                    modifiers: key.modifiers.clone(),
                    occurrence_ms: boundary_ms,
                });
            }
        }
    }

    let synthesized = store.insert(&synthetic).map_err(AnalysisError::store)?;

    let discarded = store
        .delete(&EventFilter::observation(observation).before(window.min_ms))
        .map_err(AnalysisError::store)?
        + store
            .delete(&EventFilter::observation(observation).after(window.max_ms))
            .map_err(AnalysisError::store)?;

    tracing::debug!(
        observation = %observation,
        min_ms = window.min_ms,
        max_ms = window.max_ms,
        synthesized,
        discarded,
        "clipped observation"
    );

    Ok(ClipSummary {
        synthesized,
        discarded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethogram::{Ethogram, EthogramEntry};
    use crate::event::Event;
    use crate::store::{MemoryStore, load_observation};
    use crate::types::BehaviorCode;
    use crate::window::WindowPolicy;

    fn code(s: &str) -> BehaviorCode {
        BehaviorCode::new(s).unwrap()
    }

    fn obs() -> ObservationId {
        ObservationId::new("o1").unwrap()
    }

    fn ethogram() -> Ethogram {
        Ethogram::from_entries([
            EthogramEntry::new(code("run"), BehaviorType::State),
            EthogramEntry::new(code("sniff"), BehaviorType::Point),
        ])
    }

    fn store_with(events: &[Event]) -> MemoryStore {
        let mut store = MemoryStore::new();
        load_observation(&mut store, &obs(), &ethogram(), events).unwrap();
        store
    }

    fn window(min_ms: i64, max_ms: i64) -> AnalysisWindow {
        AnalysisWindow::new(min_ms, max_ms, WindowPolicy::ArbitraryInterval).unwrap()
    }

    fn times(store: &MemoryStore) -> Vec<(String, i64)> {
        store
            .select(&EventFilter::default())
            .unwrap()
            .into_iter()
            .map(|r| (r.code.to_string(), r.occurrence_ms))
            .collect()
    }

    #[test]
    fn state_crossing_both_edges_is_synthesized() {
        let mut store = store_with(&[
            Event::new(0, "", code("run")),
            Event::new(10_000, "", code("run")),
        ]);
        let summary = clip_observation(&mut store, &obs(), &window(3_000, 6_000)).unwrap();
        assert_eq!(summary, ClipSummary { synthesized: 2, discarded: 2 });
        assert_eq!(
            times(&store),
            vec![("run".to_string(), 3_000), ("run".to_string(), 6_000)]
        );
    }

    #[test]
    fn state_crossing_start_edge_is_truncated() {
        let mut store = store_with(&[
            Event::new(0, "", code("run")),
            Event::new(5_000, "", code("run")),
        ]);
        clip_observation(&mut store, &obs(), &window(2_000, 8_000)).unwrap();
        assert_eq!(
            times(&store),
            vec![("run".to_string(), 2_000), ("run".to_string(), 5_000)]
        );
    }

    #[test]
    fn points_are_only_filtered() {
        let mut store = store_with(&[
            Event::new(1_000, "", code("sniff")),
            Event::new(4_000, "", code("sniff")),
            Event::new(9_000, "", code("sniff")),
        ]);
        let summary = clip_observation(&mut store, &obs(), &window(2_000, 8_000)).unwrap();
        assert_eq!(summary.synthesized, 0);
        assert_eq!(times(&store), vec![("sniff".to_string(), 4_000)]);
    }

    #[test]
    fn state_outside_window_disappears() {
        let mut store = store_with(&[
            Event::new(0, "", code("run")),
            Event::new(1_000, "", code("run")),
        ]);
        let summary = clip_observation(&mut store, &obs(), &window(2_000, 8_000)).unwrap();
        assert_eq!(summary.synthesized, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn modifiers_are_clipped_independently() {
        let mut store = store_with(&[
            Event::new(0, "", code("run")).with_modifiers(["fast"]),
            Event::new(1_000, "", code("run")).with_modifiers(["slow"]),
            Event::new(1_500, "", code("run")).with_modifiers(["slow"]),
            Event::new(7_000, "", code("run")).with_modifiers(["fast"]),
        ]);
        let summary = clip_observation(&mut store, &obs(), &window(2_000, 8_000)).unwrap();
        assert_eq!(summary.synthesized, 1);
        assert_eq!(
            times(&store),
            vec![("run".to_string(), 2_000), ("run".to_string(), 7_000)]
        );
    }

    #[test]
    fn clipping_is_idempotent() {
        let mut store = store_with(&[
            Event::new(0, "", code("run")),
            Event::new(3_000, "", code("sniff")),
            Event::new(4_000, "", code("run")),
            Event::new(5_000, "", code("run")),
            Event::new(12_000, "", code("run")),
        ]);
        let w = window(2_000, 8_000);
        clip_observation(&mut store, &obs(), &w).unwrap();
        let once = times(&store);

        let summary = clip_observation(&mut store, &obs(), &w).unwrap();
        assert_eq!(summary, ClipSummary::default());
        assert_eq!(times(&store), once);
    }

    #[test]
    fn other_observations_are_untouched() {
        let other = ObservationId::new("o2").unwrap();
        let mut store = store_with(&[Event::new(0, "", code("run"))]);
        load_observation(&mut store, &other, &ethogram(), &[Event::new(0, "", code("sniff"))])
            .unwrap();

        clip_observation(&mut store, &obs(), &window(2_000, 8_000)).unwrap();
        assert_eq!(
            store.count(&EventFilter::observation(&other)).unwrap(),
            1
        );
    }
}
