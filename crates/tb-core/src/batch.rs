//! Multi-observation analyses, one rayon task per observation.

use std::fmt::Write;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::budget::{BudgetParameters, TimeBudget, time_budget};
use crate::clip::clip_observation;
use crate::coverage::{Exhaustivity, observation_exhaustivity};
use crate::error::AnalysisError;
use crate::ethogram::Ethogram;
use crate::event::Event;
use crate::store::{EventStore, MemoryStore, load_observation};
use crate::types::{ObservationId, TimeFormat, ValidationError};
use crate::validation::check_state_events;
use crate::window::{AnalysisWindow, WindowPolicy};

/// One observation's coded events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    /// Media or session length, when known.
    #[serde(
        rename = "length",
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::event::seconds::option"
    )]
    pub length_ms: Option<i64>,
    /// Coded events, sorted by time.
    #[serde(default)]
    pub events: Vec<Event>,
}

/// Result of [`check_observations`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchCheck {
    /// Observations with at least one unpaired state, in input order.
    pub unpaired_observations: Vec<ObservationId>,
    /// One `Observation: <id>` section per unpaired observation.
    pub report: String,
}

impl BatchCheck {
    pub fn is_ok(&self) -> bool {
        self.unpaired_observations.is_empty()
    }
}

/// Checks every observation for unpaired state events.
pub fn check_observations(
    ethogram: &Ethogram,
    observations: &[Observation],
    time_format: TimeFormat,
) -> BatchCheck {
    let reports: Vec<_> = observations
        .par_iter()
        .map(|obs| (obs, check_state_events(ethogram, &obs.events)))
        .collect();

    let mut check = BatchCheck::default();
    for (obs, report) in reports {
        if report.is_ok() {
            continue;
        }
        let _ = write!(
            check.report,
            "Observation: {}\n{}\n",
            obs.id,
            report.message(time_format)
        );
        check.unpaired_observations.push(obs.id.clone());
    }

    tracing::debug!(
        observations = observations.len(),
        unpaired = check.unpaired_observations.len(),
        "checked observations"
    );
    check
}

/// Exhaustivity of every observation, in input order.
pub fn exhaustivity_all(
    ethogram: &Ethogram,
    observations: &[Observation],
) -> Vec<(ObservationId, Exhaustivity)> {
    observations
        .par_iter()
        .map(|obs| (obs.id.clone(), observation_exhaustivity(&obs.events, ethogram, None)))
        .collect()
}

/// How to choose each observation's analysis window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowRequest {
    pub policy: WindowPolicy,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
}

impl WindowRequest {
    pub fn resolve(&self, observation: &Observation) -> Result<AnalysisWindow, ValidationError> {
        AnalysisWindow::resolve(
            self.policy,
            &observation.events,
            observation.length_ms,
            self.start_ms,
            self.end_ms,
        )
    }
}

/// A time budget over several observations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBudgetReport {
    /// Windows the observations were clipped to.
    pub windows: Vec<(ObservationId, AnalysisWindow)>,
    #[serde(rename = "total_window", with = "crate::event::seconds")]
    pub total_window_ms: i64,
    pub budget: TimeBudget,
}

/// Loads and clips every observation into `store`, one after the other.
pub fn load_and_clip<S: EventStore>(
    store: &mut S,
    ethogram: &Ethogram,
    observations: &[Observation],
    request: &WindowRequest,
) -> Result<Vec<(ObservationId, AnalysisWindow)>, AnalysisError> {
    let mut windows = Vec::with_capacity(observations.len());
    for obs in observations {
        let window = request.resolve(obs)?;
        load_observation(store, &obs.id, ethogram, &obs.events).map_err(AnalysisError::store)?;
        clip_observation(store, &obs.id, &window)?;
        windows.push((obs.id.clone(), window));
    }
    Ok(windows)
}

/// Time budget over observations held in memory.
///
/// Each observation is clipped in its own in-memory store in parallel; the
/// stores are then merged and aggregated together.
pub fn time_budget_all(
    ethogram: &Ethogram,
    observations: &[Observation],
    request: &WindowRequest,
    params: &BudgetParameters,
) -> Result<TimeBudgetReport, AnalysisError> {
    let clipped: Vec<(MemoryStore, Vec<(ObservationId, AnalysisWindow)>)> = observations
        .par_iter()
        .map(|obs| {
            let mut store = MemoryStore::new();
            let windows = load_and_clip(&mut store, ethogram, std::slice::from_ref(obs), request)?;
            Ok::<_, AnalysisError>((store, windows))
        })
        .collect::<Result<_, _>>()?;

    let (stores, windows): (Vec<_>, Vec<_>) = clipped.into_iter().unzip();
    let store = MemoryStore::merge(stores);
    let windows: Vec<_> = windows.into_iter().flatten().collect();

    let budget = time_budget(&store, &windows, ethogram, params)?;
    Ok(TimeBudgetReport {
        total_window_ms: windows.iter().map(|(_, w)| w.length_ms()).sum(),
        windows,
        budget,
    })
}

/// Time budget over observations clipped into an external store.
pub fn time_budget_in_store<S: EventStore>(
    store: &mut S,
    ethogram: &Ethogram,
    observations: &[Observation],
    request: &WindowRequest,
    params: &BudgetParameters,
) -> Result<TimeBudgetReport, AnalysisError> {
    let windows = load_and_clip(store, ethogram, observations, request)?;
    let budget = time_budget(store, &windows, ethogram, params)?;
    Ok(TimeBudgetReport {
        total_window_ms: windows.iter().map(|(_, w)| w.length_ms()).sum(),
        windows,
        budget,
    })
}
