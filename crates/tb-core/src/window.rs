//! Analysis windows.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::event::{Event, seconds};
use crate::types::ValidationError;

/// How the bounds of an analysis window are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPolicy {
    /// From 0 to the end of the observation.
    #[default]
    FullObservation,
    /// From the first to the last coded event.
    EventsSpan,
    /// Caller-supplied bounds.
    ArbitraryInterval,
}

impl WindowPolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FullObservation => "full",
            Self::EventsSpan => "events",
            Self::ArbitraryInterval => "interval",
        }
    }
}

impl fmt::Display for WindowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::FullObservation),
            "events" => Ok(Self::EventsSpan),
            "interval" => Ok(Self::ArbitraryInterval),
            _ => Err(format!("unknown window policy: {s}")),
        }
    }
}

/// A closed time range `[min_ms, max_ms]` that analyses are restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    #[serde(rename = "min", with = "seconds")]
    pub min_ms: i64,
    #[serde(rename = "max", with = "seconds")]
    pub max_ms: i64,
    pub policy: WindowPolicy,
}

impl AnalysisWindow {
    /// Creates a window, rejecting `min_ms > max_ms`.
    pub const fn new(min_ms: i64, max_ms: i64, policy: WindowPolicy) -> Result<Self, ValidationError> {
        if min_ms > max_ms {
            return Err(ValidationError::InvertedWindow { min_ms, max_ms });
        }
        Ok(Self {
            min_ms,
            max_ms,
            policy,
        })
    }

    /// Resolves the bounds for one observation.
    ///
    /// `observation_length_ms` is the media or session length when known.
    /// `start_ms`/`end_ms` are only read for [`WindowPolicy::ArbitraryInterval`];
    /// a missing start falls back to 0 and a missing end to the observation
    /// length (or the last event).
    pub fn resolve(
        policy: WindowPolicy,
        events: &[Event],
        observation_length_ms: Option<i64>,
        start_ms: Option<i64>,
        end_ms: Option<i64>,
    ) -> Result<Self, ValidationError> {
        let first = events.iter().map(|e| e.time_ms).min();
        let last = events.iter().map(|e| e.time_ms).max();

        match policy {
            WindowPolicy::FullObservation => match observation_length_ms {
                Some(length) => Self::new(0, length.max(last.unwrap_or(0)), policy),
                None => {
                    tracing::debug!("observation length unknown, using the events span");
                    Self::resolve(WindowPolicy::EventsSpan, events, None, None, None)
                }
            },
            WindowPolicy::EventsSpan => Self::new(
                first.unwrap_or(0),
                last.or(observation_length_ms).unwrap_or(0),
                WindowPolicy::EventsSpan,
            ),
            WindowPolicy::ArbitraryInterval => Self::new(
                start_ms.unwrap_or(0),
                end_ms.or(observation_length_ms).or(last).unwrap_or(0),
                policy,
            ),
        }
    }

    pub const fn length_ms(&self) -> i64 {
        self.max_ms - self.min_ms
    }

    pub const fn contains(&self, time_ms: i64) -> bool {
        time_ms >= self.min_ms && time_ms <= self.max_ms
    }
}
