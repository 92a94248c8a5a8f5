//! Session files: an ethogram and the observations coded with it.
//!
//! ```json
//! {
//!   "ethogram": [{"code": "run", "type": "State event", "category": "locomotion"}],
//!   "observations": [
//!     {"id": "cage 1", "length": 60.0, "events": [{"time": 1.5, "subject": "mouse", "behavior": "run"}]}
//!   ]
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tb_core::{Ethogram, Observation};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub ethogram: Ethogram,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

impl Session {
    pub fn from_json(text: &str) -> Result<Self> {
        let mut session: Self = serde_json::from_str(text).context("invalid session file")?;
        for observation in &mut session.observations {
            // Pairing is positional, so events must be in time order.
            observation.events.sort_by_key(|event| event.time_ms);
        }
        Ok(session)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let session = Self::from_json(&text)?;
        tracing::debug!(
            path = %path.display(),
            behaviors = session.ethogram.len(),
            observations = session.observations.len(),
            "loaded session"
        );
        Ok(session)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
