//! Core type definitions with validation.
//!
//! Times are carried as `i64` milliseconds. Observation logs are coded with
//! millisecond resolution, so every duration the engine reports is exact.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A time value could not be parsed as decimal seconds.
    #[error("invalid time value: {value:?} (expected decimal seconds with at most 3 decimals)")]
    InvalidTime { value: String },

    /// The analysis window ends before it starts.
    #[error("invalid analysis window: start {min_ms} ms is after end {max_ms} ms")]
    InvertedWindow { min_ms: i64, max_ms: i64 },

    /// A time bin cannot have a negative size.
    #[error("invalid bin size: {bin_size_ms} ms")]
    InvalidBinSize { bin_size_ms: i64 },

    /// Synthetic closing events need a positive spacing.
    #[error("invalid epsilon: {epsilon_ms} ms (must be positive)")]
    InvalidEpsilon { epsilon_ms: i64 },

    /// Invalid time format name.
    #[error("invalid time format: {value}")]
    InvalidTimeFormat { value: String },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValidationError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated behavior code.
    ///
    /// Behavior codes must be non-empty. They identify an ethogram entry
    /// (e.g., "run", "groom").
    BehaviorCode, "behavior code"
);

define_string_id!(
    /// A validated observation identifier.
    ObservationId, "observation ID"
);

/// Label used in reports for events coded without a focal subject.
pub const NO_FOCAL_SUBJECT: &str = "No focal subject";

/// Returns the display label for a subject (empty means no focal subject).
pub fn subject_label(subject: &str) -> &str {
    if subject.is_empty() {
        NO_FOCAL_SUBJECT
    } else {
        subject
    }
}

/// How times are rendered in human-readable messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFormat {
    /// Decimal seconds, e.g. `83.250`.
    #[default]
    Seconds,
    /// Clock notation, e.g. `00:01:23.250`.
    HhMmSs,
}

impl TimeFormat {
    /// String representation for configuration files.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::HhMmSs => "hhmmss",
        }
    }

    /// Renders a millisecond timestamp in this format.
    pub fn render(self, time_ms: i64) -> String {
        match self {
            Self::Seconds => format_seconds(time_ms),
            Self::HhMmSs => format_hhmmss(time_ms),
        }
    }
}

impl fmt::Display for TimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TimeFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seconds" | "s" => Ok(Self::Seconds),
            "hhmmss" => Ok(Self::HhMmSs),
            _ => Err(ValidationError::InvalidTimeFormat {
                value: s.to_string(),
            }),
        }
    }
}

/// Parses decimal seconds (e.g. `"12.345"`) into milliseconds.
///
/// At most three fractional digits are accepted so the conversion is exact.
pub fn parse_seconds(text: &str) -> Result<i64, ValidationError> {
    let invalid = || ValidationError::InvalidTime {
        value: text.to_string(),
    };
    let trimmed = text.trim();
    let (negative, digits) = trimmed
        .strip_prefix('-')
        .map_or((false, trimmed), |rest| (true, rest));
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if frac.len() > 3
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !frac.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let frac: i64 = format!("{frac:0<3}").parse().map_err(|_| invalid())?;

    let ms = whole
        .checked_mul(1000)
        .and_then(|ms| ms.checked_add(frac))
        .ok_or_else(invalid)?;
    Ok(if negative { -ms } else { ms })
}

/// Formats milliseconds as decimal seconds with three decimals.
pub fn format_seconds(time_ms: i64) -> String {
    let sign = if time_ms < 0 { "-" } else { "" };
    let abs = time_ms.unsigned_abs();
    format!("{sign}{}.{:03}", abs / 1000, abs % 1000)
}

/// Formats milliseconds as `HH:MM:SS.mmm`.
pub fn format_hhmmss(time_ms: i64) -> String {
    let sign = if time_ms < 0 { "-" } else { "" };
    let abs = time_ms.unsigned_abs();
    let hours = abs / 3_600_000;
    let minutes = (abs / 60_000) % 60;
    let seconds = (abs / 1000) % 60;
    let millis = abs % 1000;
    format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Converts milliseconds to fractional seconds.
#[allow(clippy::cast_precision_loss)]
pub fn ms_to_seconds(time_ms: i64) -> f64 {
    time_ms as f64 / 1000.0
}

/// Rounds to `decimals` places, ties to even (decimal rounding semantics).
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behavior_code_rejects_empty() {
        assert_eq!(
            BehaviorCode::new(""),
            Err(ValidationError::Empty {
                field: "behavior code"
            })
        );
        assert_eq!(BehaviorCode::new("run").unwrap().as_str(), "run");
    }

    #[test]
    fn behavior_code_deserialize_validates() {
        let result: Result<BehaviorCode, _> = serde_json::from_str(r#""""#);
        assert!(result.is_err());
        let code: BehaviorCode = serde_json::from_str(r#""groom""#).unwrap();
        assert_eq!(code.as_str(), "groom");
    }

    #[test]
    fn parse_seconds_is_exact() {
        assert_eq!(parse_seconds("12.345"), Ok(12_345));
        assert_eq!(parse_seconds("12.3"), Ok(12_300));
        assert_eq!(parse_seconds("12"), Ok(12_000));
        assert_eq!(parse_seconds(".5"), Ok(500));
        assert_eq!(parse_seconds("-1.25"), Ok(-1_250));
        assert_eq!(parse_seconds(" 0.001 "), Ok(1));
    }

    #[test]
    fn parse_seconds_rejects_malformed() {
        for bad in ["", ".", "1.2345", "abc", "1.2.3", "--1", "1e3"] {
            assert!(parse_seconds(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn format_seconds_pads_millis() {
        assert_eq!(format_seconds(12_345), "12.345");
        assert_eq!(format_seconds(5), "0.005");
        assert_eq!(format_seconds(-1_250), "-1.250");
    }

    #[test]
    fn format_hhmmss_renders_clock() {
        assert_eq!(format_hhmmss(3_723_004), "01:02:03.004");
        assert_eq!(format_hhmmss(0), "00:00:00.000");
    }

    #[test]
    fn time_format_roundtrip() {
        for format in [TimeFormat::Seconds, TimeFormat::HhMmSs] {
            let parsed: TimeFormat = format.as_str().parse().expect("should parse");
            assert_eq!(parsed, format);
        }
        assert!("minutes".parse::<TimeFormat>().is_err());
    }

    #[test]
    fn round_to_uses_ties_to_even() {
        assert!((round_to(2.25, 1) - 2.2).abs() < f64::EPSILON);
        assert!((round_to(33.333_333, 1) - 33.3).abs() < f64::EPSILON);
        assert!((round_to(1.234_56, 3) - 1.235).abs() < f64::EPSILON);
    }

    #[test]
    fn subject_label_names_empty_subject() {
        assert_eq!(subject_label(""), NO_FOCAL_SUBJECT);
        assert_eq!(subject_label("mouse 1"), "mouse 1");
    }
}
