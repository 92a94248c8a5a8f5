//! Behavior type enum as the single source of truth for type strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a behavior has a duration or is instantaneous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BehaviorType {
    /// Coded by a start and a matching stop event.
    State,
    /// Instantaneous; a single event.
    Point,
}

impl BehaviorType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::State => "State event",
            Self::Point => "Point event",
        }
    }

    #[must_use]
    pub const fn is_state(self) -> bool {
        matches!(self, Self::State)
    }
}

impl fmt::Display for BehaviorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BehaviorType {
    type Err = UnknownBehaviorType;

    /// Accepts "State event"/"Point event" in any case, plus the bare words.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        if upper.contains("STATE") {
            Ok(Self::State)
        } else if upper.contains("POINT") {
            Ok(Self::Point)
        } else {
            Err(UnknownBehaviorType(s.to_string()))
        }
    }
}

impl Serialize for BehaviorType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BehaviorType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown behavior type strings.
#[derive(Debug, Clone)]
pub struct UnknownBehaviorType(String);

impl fmt::Display for UnknownBehaviorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown behavior type: {}", self.0)
    }
}

impl std::error::Error for UnknownBehaviorType {}
