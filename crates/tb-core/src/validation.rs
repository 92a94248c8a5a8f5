//! Detection of unpaired state events.
//!
//! Every State behavior must be coded an even number of times per subject
//! and modifier set. Occurrences are matched with an append/remove list per
//! (subject, behavior): an occurrence whose modifier set is already in the
//! list closes it, otherwise it is appended as an open state. Whatever is
//! left in the list at the end is unpaired.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::ethogram::Ethogram;
use crate::event::Event;
use crate::types::{BehaviorCode, TimeFormat, subject_label};

/// Message returned when no state event is left open.
pub const NO_PROBLEM: &str = "No problem detected";

/// Message returned when the ethogram has no State behavior at all.
pub const NO_STATE_BEHAVIOR: &str = "No behavior is defined as `State event`";

/// A state that was opened and never closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpairedState {
    pub subject: String,
    pub behavior: BehaviorCode,
    pub modifiers: String,
    /// When the unmatched occurrence was coded.
    #[serde(rename = "time", with = "crate::event::seconds")]
    pub time_ms: i64,
}

/// Result of checking one observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingReport {
    pub unpaired: Vec<UnpairedState>,
    /// False when the ethogram defines no State behavior (nothing to check).
    pub has_state_behaviors: bool,
}

impl PairingReport {
    pub fn is_ok(&self) -> bool {
        self.unpaired.is_empty()
    }

    /// Human-readable report, one line per unpaired state.
    pub fn message(&self, time_format: TimeFormat) -> String {
        if !self.has_state_behaviors {
            return NO_STATE_BEHAVIOR.to_string();
        }
        if self.unpaired.is_empty() {
            return NO_PROBLEM.to_string();
        }

        let mut out = String::new();
        for state in &self.unpaired {
            let modifier = if state.modifiers.is_empty() {
                String::new()
            } else {
                format!("(modifier {}) ", state.modifiers)
            };
            let _ = writeln!(
                out,
                "The behavior {} {modifier}is not PAIRED for subject \"{}\" at {}",
                state.behavior,
                subject_label(&state.subject),
                time_format.render(state.time_ms),
            );
        }
        out
    }
}

/// Finds every state left open, per subject and behavior (both sorted).
///
/// Within one (subject, behavior), unpaired states are listed in the order
/// they remain in the matching list.
pub fn find_unpaired_states(ethogram: &Ethogram, events: &[Event]) -> Vec<UnpairedState> {
    let mut streams: BTreeMap<(&str, &BehaviorCode), Vec<&Event>> = BTreeMap::new();
    for event in events {
        if ethogram.is_state(event.behavior.as_str()) {
            streams
                .entry((event.subject.as_str(), &event.behavior))
                .or_default()
                .push(event);
        }
    }

    let mut unpaired = Vec::new();
    for ((subject, behavior), occurrences) in streams {
        // (modifiers, time the entry was opened)
        let mut open: Vec<(String, i64)> = Vec::new();
        for event in occurrences {
            let modifiers = event.modifier_string();
            if let Some(pos) = open.iter().position(|(m, _)| *m == modifiers) {
                open.remove(pos);
            } else {
                open.push((modifiers, event.time_ms));
            }
        }

        unpaired.extend(open.into_iter().map(|(modifiers, time_ms)| UnpairedState {
            subject: subject.to_string(),
            behavior: behavior.clone(),
            modifiers,
            time_ms,
        }));
    }

    if !unpaired.is_empty() {
        tracing::debug!(count = unpaired.len(), "found unpaired state events");
    }
    unpaired
}

/// Checks one observation's events for unpaired states.
pub fn check_state_events(ethogram: &Ethogram, events: &[Event]) -> PairingReport {
    if !ethogram.has_state_behaviors() {
        return PairingReport {
            unpaired: Vec::new(),
            has_state_behaviors: false,
        };
    }
    PairingReport {
        unpaired: find_unpaired_states(ethogram, events),
        has_state_behaviors: true,
    }
}

/// `(ok, message)` form of [`check_state_events`].
pub fn check_state_events_obs(
    ethogram: &Ethogram,
    events: &[Event],
    time_format: TimeFormat,
) -> (bool, String) {
    let report = check_state_events(ethogram, events);
    (report.is_ok(), report.message(time_format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior_type::BehaviorType;
    use crate::ethogram::EthogramEntry;
    use insta::assert_snapshot;

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
    fn single_open_state_is_reported() {
        let events = vec![ev(0, "", "run", &[])];
        let (ok, _) = check_state_events_obs(&ethogram(), &events, TimeFormat::Seconds);
        assert!(!ok);

        let report = check_state_events(&ethogram(), &events);
        assert_eq!(report.unpaired.len(), 1);
        assert_eq!(report.unpaired[0].time_ms, 0);
        assert_eq!(report.unpaired[0].behavior.as_str(), "run");
    }

    #[test]
    fn paired_states_pass() {
        let events = vec![
            ev(0, "a", "run", &[]),
            ev(1_000, "a", "sniff", &[]),
            ev(2_000, "a", "run", &[]),
        ];
        let (ok, message) = check_state_events_obs(&ethogram(), &events, TimeFormat::Seconds);
        assert!(ok);
        assert_eq!(message, NO_PROBLEM);
    }

    #[test]
    fn point_only_ethogram_has_nothing_to_check() {
        let ethogram = Ethogram::from_entries([EthogramEntry::new(
            code("sniff"),
            BehaviorType::Point,
        )]);
        let (ok, message) =
            check_state_events_obs(&ethogram, &[ev(0, "", "sniff", &[])], TimeFormat::Seconds);
        assert!(ok);
        assert_eq!(message, NO_STATE_BEHAVIOR);
    }

    #[test]
    fn reports_time_of_the_latest_open() {
        // fast: open 0, close 1, open 4 -> unpaired at 4
        // slow: open 2 -> unpaired at 2
        let events = vec![
            ev(0, "a", "run", &["fast"]),
            ev(1_000, "a", "run", &["fast"]),
            ev(2_000, "a", "run", &["slow"]),
            ev(4_000, "a", "run", &["fast"]),
        ];
        let report = check_state_events(&ethogram(), &events);
        let found: Vec<_> = report
            .unpaired
            .iter()
            .map(|s| (s.modifiers.as_str(), s.time_ms))
            .collect();
        assert_eq!(found, vec![("slow", 2_000), ("fast", 4_000)]);
    }

    #[test]
    fn undefined_codes_are_ignored() {
        let events = vec![ev(0, "", "fly", &[])];
        assert!(check_state_events(&ethogram(), &events).is_ok());
    }

    #[test]
    fn message_lists_subject_modifier_and_time() {
        let events = vec![
            ev(0, "", "rest", &[]),
            ev(83_250, "mouse", "run", &["fast"]),
        ];
        let report = check_state_events(&ethogram(), &events);
        assert_snapshot!(report.message(TimeFormat::HhMmSs).trim_end(), @r#"
        The behavior rest is not PAIRED for subject "No focal subject" at 00:00:00.000
        The behavior run (modifier fast) is not PAIRED for subject "mouse" at 00:01:23.250
        "#);
    }
}
