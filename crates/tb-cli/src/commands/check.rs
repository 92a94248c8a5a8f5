//! Check command: state pairing and undefined behavior codes.

use std::collections::BTreeSet;
use std::io::Write;

use anyhow::Result;
use tb_core::validation::{NO_PROBLEM, NO_STATE_BEHAVIOR};
use tb_core::{TimeFormat, check_observations};

use crate::input::Session;

/// Writes the check report. Returns false when a state is left unpaired.
pub fn run<W: Write>(writer: &mut W, session: &Session, time_format: TimeFormat) -> Result<bool> {
    let ethogram = &session.ethogram;

    let undefined: BTreeSet<String> = session
        .observations
        .iter()
        .flat_map(|obs| ethogram.undefined_codes(&obs.events))
        .collect();
    if !ethogram.is_empty() && !undefined.is_empty() {
        let codes: Vec<&str> = undefined.iter().map(String::as_str).collect();
        writeln!(writer, "Behaviors not defined in the ethogram: {}", codes.join(", "))?;
    }

    if !ethogram.has_state_behaviors() {
        writeln!(writer, "{NO_STATE_BEHAVIOR}")?;
        return Ok(true);
    }

    let check = check_observations(ethogram, &session.observations, time_format);
    if check.is_ok() {
        writeln!(writer, "{NO_PROBLEM}")?;
    } else {
        write!(writer, "{}", check.report)?;
    }
    Ok(check.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    const SESSION: &str = r#"{
        "ethogram": [
            {"code": "run", "type": "State event"},
            {"code": "sniff", "type": "Point event"}
        ],
        "observations": [
            {"id": "o1", "events": [
                {"time": 0, "subject": "mouse", "behavior": "run"},
                {"time": 4, "subject": "mouse", "behavior": "run"}
            ]},
            {"id": "o2", "events": [
                {"time": 3723.5, "behavior": "run", "modifiers": ["fast"]},
                {"time": 3724, "behavior": "groom"}
            ]}
        ]
    }"#;

    fn check(text: &str, time_format: TimeFormat) -> (bool, String) {
        let session = Session::from_json(text).unwrap();
        let mut output = Vec::new();
        let ok = run(&mut output, &session, time_format).unwrap();
        (ok, String::from_utf8(output).unwrap())
    }

    #[test]
    fn reports_unpaired_states_per_observation() {
        let (ok, output) = check(SESSION, TimeFormat::HhMmSs);
        assert!(!ok);
        assert_snapshot!(output.trim_end(), @r#"
        Behaviors not defined in the ethogram: groom
        Observation: o2
        The behavior run (modifier fast) is not PAIRED for subject "No focal subject" at 01:02:03.500
        "#);
    }

    #[test]
    fn paired_session_has_no_problem() {
        let text = r#"{
            "ethogram": [{"code": "run", "type": "State event"}],
            "observations": [{"id": "o1", "events": [
                {"time": 1, "behavior": "run"}, {"time": 2, "behavior": "run"}
            ]}]
        }"#;
        let (ok, output) = check(text, TimeFormat::Seconds);
        assert!(ok);
        assert_eq!(output, "No problem detected\n");
    }

    #[test]
    fn ethogram_without_states_has_nothing_to_check() {
        let text = r#"{
            "ethogram": [{"code": "sniff", "type": "Point event"}],
            "observations": [{"id": "o1", "events": [{"time": 1, "behavior": "sniff"}]}]
        }"#;
        let (ok, output) = check(text, TimeFormat::Seconds);
        assert!(ok);
        assert_eq!(output, "No behavior is defined as `State event`\n");
    }
}
