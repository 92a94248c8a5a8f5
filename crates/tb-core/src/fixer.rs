//! Closing events for states left open.

use crate::ethogram::Ethogram;
use crate::event::{Event, MODIFIER_SEPARATOR};
use crate::types::ValidationError;
use crate::validation::find_unpaired_states;

/// Default spacing between synthetic closing events: 1 ms.
pub const DEFAULT_EPSILON_MS: i64 = 1;

/// Builds one closing event per state still open in `events`.
///
/// Events are placed just after `fix_at_ms`, each `epsilon_ms` after the
/// previous one so their order is unambiguous. Subjects and behaviors are
/// visited in sorted order.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidEpsilon`] unless `epsilon_ms` is positive.
pub fn fix_unpaired_state_events(
    ethogram: &Ethogram,
    events: &[Event],
    fix_at_ms: i64,
    epsilon_ms: i64,
) -> Result<Vec<Event>, ValidationError> {
    if epsilon_ms <= 0 {
        return Err(ValidationError::InvalidEpsilon { epsilon_ms });
    }
    let mut last_ms = fix_at_ms;
    let fixes: Vec<Event> = find_unpaired_states(ethogram, events)
        .into_iter()
        .map(|state| {
            last_ms = last_ms.max(fix_at_ms) + epsilon_ms;
            let modifiers: Vec<&str> = if state.modifiers.is_empty() {
                Vec::new()
            } else {
                state.modifiers.split(MODIFIER_SEPARATOR).collect()
            };
            Event::new(last_ms, state.subject, state.behavior).with_modifiers(modifiers)
        })
        .collect();

    if !fixes.is_empty() {
        tracing::info!(count = fixes.len(), fix_at_ms, "closing unpaired state events");
    }
    Ok(fixes)
}

/// Inserts `fixes` into a time-sorted event log.
///
/// The result stays sorted by time; at equal times existing events come first.
pub fn merge_fixes(events: &[Event], fixes: &[Event]) -> Vec<Event> {
    let mut merged: Vec<Event> = events.iter().chain(fixes).cloned().collect();
    merged.sort_by_key(|event| event.time_ms);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior_type::BehaviorType;
    use crate::ethogram::EthogramEntry;
    use crate::types::BehaviorCode;
    use crate::validation::check_state_events;

    fn code(s: &str) -> BehaviorCode {
        BehaviorCode::new(s).unwrap()
    }

    fn ethogram() -> Ethogram {
        Ethogram::from_entries([
            EthogramEntry::new(code("run"), BehaviorType::State),
            EthogramEntry::new(code("rest"), BehaviorType::State),
            EthogramEntry::new(code("sniff"), BehaviorType::Point),
        ])
    }

    fn ev(time_ms: i64, subject: &str, behavior: &str, modifiers: &[&str]) -> Event {
        Event::new(time_ms, subject, code(behavior)).with_modifiers(modifiers.iter().copied())
    }

    #[test]
    fn nothing_to_fix() {
        let events = vec![ev(0, "", "run", &[]), ev(1_000, "", "run", &[])];
        assert!(
            fix_unpaired_state_events(&ethogram(), &events, 5_000, DEFAULT_EPSILON_MS)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn closing_events_are_spaced_by_epsilon() {
        let events = vec![
            ev(0, "b", "run", &[]),
            ev(100, "a", "rest", &[]),
            ev(200, "a", "run", &["fast", "left"]),
            ev(300, "a", "sniff", &[]),
        ];
        let fixes = fix_unpaired_state_events(&ethogram(), &events, 5_000, DEFAULT_EPSILON_MS).unwrap();
        let summary: Vec<_> = fixes
            .iter()
            .map(|e| (e.time_ms, e.subject.as_str(), e.behavior.as_str(), e.modifier_string()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (5_001, "a", "rest", String::new()),
                (5_002, "a", "run", "fast|left".to_string()),
                (5_003, "b", "run", String::new()),
            ]
        );
        assert!(fixes.iter().all(|e| e.comment.is_empty()));
    }

    #[test]
    fn non_positive_epsilon_is_rejected() {
        let events = vec![ev(0, "a", "run", &[]), ev(100, "a", "rest", &[])];
        for epsilon_ms in [0, -1] {
            assert_eq!(
                fix_unpaired_state_events(&ethogram(), &events, 5_000, epsilon_ms),
                Err(ValidationError::InvalidEpsilon { epsilon_ms })
            );
        }
    }

    #[test]
    fn closing_times_strictly_increase() {
        let events = vec![ev(0, "a", "run", &[]), ev(100, "a", "rest", &[])];
        let fixes = fix_unpaired_state_events(&ethogram(), &events, 5_000, 1).unwrap();
        let times: Vec<i64> = fixes.iter().map(|e| e.time_ms).collect();
        assert_eq!(times, vec![5_001, 5_002]);
    }

    #[test]
    fn merged_log_is_paired() {
        let events = vec![
            ev(0, "", "run", &[]),
            ev(1_000, "", "rest", &[]),
            ev(2_000, "", "rest", &[]),
        ];
        let fixes = fix_unpaired_state_events(&ethogram(), &events, 2_000, DEFAULT_EPSILON_MS).unwrap();
        let merged = merge_fixes(&events, &fixes);

        assert_eq!(merged.len(), 4);
        assert_eq!(merged.last().unwrap().time_ms, 2_001);
        assert!(check_state_events(&ethogram(), &merged).is_ok());
    }

    #[test]
    fn merge_keeps_existing_events_first_on_ties() {
        let events = vec![ev(0, "", "run", &[]), ev(5_000, "", "sniff", &[])];
        let fixes = vec![ev(5_000, "", "run", &[])];
        let merged = merge_fixes(&events, &fixes);
        let behaviors: Vec<_> = merged.iter().map(|e| e.behavior.as_str()).collect();
        assert_eq!(behaviors, vec!["run", "sniff", "run"]);
    }
}
