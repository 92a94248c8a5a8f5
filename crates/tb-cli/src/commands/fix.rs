//! Fix command: closes states left open.

use anyhow::Result;
use tb_core::{fix_unpaired_state_events, merge_fixes};

use crate::input::Session;

/// Adds closing events to every observation. Returns how many were added.
pub fn apply(session: &mut Session, fix_at_ms: i64, epsilon_ms: i64) -> Result<usize> {
    let mut added = 0;
    for observation in &mut session.observations {
        let fixes = fix_unpaired_state_events(
            &session.ethogram,
            &observation.events,
            fix_at_ms,
            epsilon_ms,
        )?;
        if fixes.is_empty() {
            continue;
        }
        tracing::debug!(observation = %observation.id, count = fixes.len(), "closing states");
        added += fixes.len();
        observation.events = merge_fixes(&observation.events, &fixes);
    }
    Ok(added)
}

/// Fixes `session` and renders it back to JSON.
pub fn run(mut session: Session, fix_at_ms: i64, epsilon_ms: i64) -> Result<(usize, String)> {
    let added = apply(&mut session, fix_at_ms, epsilon_ms)?;
    Ok((added, session.to_json()?))
}
