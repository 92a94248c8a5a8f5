//! Shared rendering helpers for CLI commands.

use tb_core::{Measure, format_seconds};

/// Renders a duration in seconds with millisecond precision.
pub fn duration(measure: &Measure<i64>) -> String {
    match measure {
        Measure::Value(ms) => format_seconds(*ms),
        other => other.to_string(),
    }
}

/// Renders a statistic with a fixed number of decimals.
pub fn decimal(measure: &Measure<f64>, decimals: usize) -> String {
    match measure {
        Measure::Value(value) => format!("{value:.decimals$}"),
        other => other.to_string(),
    }
}
