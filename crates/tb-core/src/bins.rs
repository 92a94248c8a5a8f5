//! Synthetic time budget split into time bins.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::behavior_type::BehaviorType;
use crate::budget::{Measure, mean_and_stdev};
use crate::ethogram::Ethogram;
use crate::event::Event;
use crate::interval::{IntervalSet, Span};
use crate::pairing::{build_intervals, flag_events};
use crate::types::{BehaviorCode, ObservationId, ValidationError, round_to};
use crate::window::AnalysisWindow;

/// Parameters of a binned time budget.
#[derive(Debug, Clone)]
pub struct BinParameters {
    /// Bin length. 0 puts the whole window in a single bin.
    pub bin_size_ms: i64,
    pub subjects: Option<BTreeSet<String>>,
    pub behaviors: Option<BTreeSet<String>>,
    /// Default: true.
    pub include_modifiers: bool,
    pub excluded_behaviors: BTreeSet<String>,
}

impl Default for BinParameters {
    fn default() -> Self {
        Self {
            bin_size_ms: 0,
            subjects: None,
            behaviors: None,
            include_modifiers: true,
            excluded_behaviors: BTreeSet::new(),
        }
    }
}

/// Statistics of one (subject, behavior, modifiers) in one bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinRecord {
    pub observation: ObservationId,
    #[serde(rename = "bin_start", with = "crate::event::seconds")]
    pub bin_start_ms: i64,
    #[serde(rename = "bin_end", with = "crate::event::seconds")]
    pub bin_end_ms: i64,
    pub subject: String,
    pub behavior: BehaviorCode,
    pub modifiers: String,
    pub count: usize,
    #[serde(
        rename = "total_duration",
        serialize_with = "crate::budget::serialize_ms_as_seconds"
    )]
    pub total_duration_ms: Measure<i64>,
    pub duration_mean: Measure<f64>,
    pub duration_stdev: Measure<f64>,
    /// Fraction of the (exclusion-adjusted) bin, 3 decimals.
    pub proportion: Measure<f64>,
}

#[derive(Debug, Default)]
enum Occurrences {
    State(IntervalSet),
    #[default]
    Empty,
    Point(Vec<i64>),
}

/// Consecutive bins `[start, end]` covering the window.
pub fn time_bins(window: &AnalysisWindow, bin_size_ms: i64) -> Result<Vec<(i64, i64)>, ValidationError> {
    if bin_size_ms < 0 {
        return Err(ValidationError::InvalidBinSize { bin_size_ms });
    }
    let step = |start: i64| {
        if bin_size_ms == 0 {
            window.max_ms
        } else {
            start.saturating_add(bin_size_ms).min(window.max_ms)
        }
    };

    let mut bins = Vec::new();
    let mut start = window.min_ms;
    let mut end = step(start);
    loop {
        bins.push((start, end));
        start = end;
        end = step(start);
        if start == end {
            break;
        }
    }
    Ok(bins)
}

/// Computes the binned budget of one observation.
///
/// State occurrences are paired per modifier set; open states at the end of
/// the log are ignored.
pub fn binned_time_budget(
    observation: &ObservationId,
    events: &[Event],
    ethogram: &Ethogram,
    window: &AnalysisWindow,
    params: &BinParameters,
) -> Result<Vec<BinRecord>, ValidationError> {
    let bins = time_bins(window, params.bin_size_ms)?;

    let subject_selected = |s: &str| params.subjects.as_ref().is_none_or(|set| set.contains(s));
    let behavior_selected = |c: &str| params.behaviors.as_ref().is_none_or(|set| set.contains(c));

    let mut groups: BTreeMap<(String, BehaviorCode, String), Occurrences> = BTreeMap::new();
    let intervals = build_intervals(&flag_events(ethogram, events).flagged);
    for interval in intervals {
        if !subject_selected(&interval.subject) || !behavior_selected(interval.behavior.as_str()) {
            continue;
        }
        let modifiers = if params.include_modifiers {
            interval.modifiers
        } else {
            String::new()
        };
        let entry = groups
            .entry((interval.subject, interval.behavior, modifiers))
            .or_default();
        match (interval.kind, entry) {
            (BehaviorType::Point, Occurrences::Point(times)) => times.push(interval.start_ms),
            (BehaviorType::State, Occurrences::State(set)) => {
                set.insert(Span::new(interval.start_ms, interval.stop_ms));
            }
            (BehaviorType::Point, entry) => *entry = Occurrences::Point(vec![interval.start_ms]),
            (BehaviorType::State, entry) => {
                *entry = Occurrences::State(IntervalSet::from_spans([Span::new(
                    interval.start_ms,
                    interval.stop_ms,
                )]));
            }
        }
    }

    // selected behaviors a subject never showed still get rows
    if let Some(behaviors) = &params.behaviors {
        let seen: BTreeSet<String> = groups.keys().map(|(s, _, _)| s.clone()).collect();
        let subjects = params.subjects.as_ref().unwrap_or(&seen);
        for subject in subjects {
            for entry in behaviors.iter().filter_map(|code| ethogram.get(code)) {
                let observed = groups
                    .keys()
                    .any(|(s, c, _)| s == subject && *c == entry.code);
                if !observed {
                    let empty = match entry.kind {
                        BehaviorType::State => Occurrences::State(IntervalSet::new()),
                        BehaviorType::Point => Occurrences::Point(Vec::new()),
                    };
                    groups.insert((subject.clone(), entry.code.clone(), String::new()), empty);
                }
            }
        }
    }

    let mut records = Vec::new();
    for &(bin_start_ms, bin_end_ms) in &bins {
        let mut excluded_ms: BTreeMap<&str, i64> = BTreeMap::new();
        for ((subject, code, _), occurrences) in &groups {
            if let Occurrences::State(set) = occurrences {
                if params.excluded_behaviors.contains(code.as_str()) {
                    *excluded_ms.entry(subject.as_str()).or_default() +=
                        set.clip(bin_start_ms, bin_end_ms).total_ms();
                }
            }
        }

        for ((subject, code, modifiers), occurrences) in &groups {
            let mut record = BinRecord {
                observation: observation.clone(),
                bin_start_ms,
                bin_end_ms,
                subject: subject.clone(),
                behavior: code.clone(),
                modifiers: modifiers.clone(),
                count: 0,
                total_duration_ms: Measure::NotApplicable,
                duration_mean: Measure::NotApplicable,
                duration_stdev: Measure::NotApplicable,
                proportion: Measure::NotApplicable,
            };

            match occurrences {
                Occurrences::Point(times) => {
                    record.count = times
                        .iter()
                        .filter(|t| (bin_start_ms..=bin_end_ms).contains(*t))
                        .count();
                }
                Occurrences::State(set) => {
                    let clipped = set.clip(bin_start_ms, bin_end_ms);
                    let durations: Vec<i64> =
                        clipped.non_degenerate().map(Span::duration_ms).collect();
                    let total_ms = clipped.total_ms();

                    record.count = durations.len();
                    record.total_duration_ms = Measure::Value(total_ms);
                    (record.duration_mean, record.duration_stdev) = mean_and_stdev(&durations);

                    let bin_ms = bin_end_ms - bin_start_ms;
                    let denominator_ms = if params.excluded_behaviors.contains(code.as_str()) {
                        bin_ms
                    } else {
                        bin_ms - excluded_ms.get(subject.as_str()).copied().unwrap_or(0)
                    };
                    record.proportion = proportion(total_ms, denominator_ms);
                }
                Occurrences::Empty => {}
            }
            records.push(record);
        }
    }

    tracing::debug!(
        observation = %observation,
        bins = bins.len(),
        records = records.len(),
        "computed binned time budget"
    );
    Ok(records)
}

fn proportion(duration_ms: i64, denominator_ms: i64) -> Measure<f64> {
    if denominator_ms <= 0 {
        return Measure::Unavailable;
    }
    #[allow(clippy::cast_precision_loss)]
    let fraction = duration_ms as f64 / denominator_ms as f64;
    Measure::Value(round_to(fraction, 3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethogram::EthogramEntry;
    use crate::window::WindowPolicy;

    fn code(s: &str) -> BehaviorCode {
        BehaviorCode::new(s).unwrap()
    }

    fn obs() -> ObservationId {
        ObservationId::new("o1").unwrap()
    }

    fn ethogram() -> Ethogram {
        Ethogram::from_entries([
            EthogramEntry::new(code("run"), BehaviorType::State),
            EthogramEntry::new(code("rest"), BehaviorType::State),
            EthogramEntry::new(code("sniff"), BehaviorType::Point),
        ])
    }

    fn ev(time_ms: i64, behavior: &str) -> Event {
        Event::new(time_ms, "", code(behavior))
    }

    fn window(min_ms: i64, max_ms: i64) -> AnalysisWindow {
        AnalysisWindow::new(min_ms, max_ms, WindowPolicy::ArbitraryInterval).unwrap()
    }

    #[test]
    fn bins_cover_the_window_and_truncate_the_last() {
        let bins = time_bins(&window(0, 25_000), 10_000).unwrap();
        assert_eq!(bins, vec![(0, 10_000), (10_000, 20_000), (20_000, 25_000)]);
    }

    #[test]
    fn zero_bin_size_is_one_bin() {
        let bins = time_bins(&window(5_000, 25_000), 0).unwrap();
        assert_eq!(bins, vec![(5_000, 25_000)]);
    }

    #[test]
    fn negative_bin_size_is_rejected() {
        assert_eq!(
            time_bins(&window(0, 10_000), -1),
            Err(ValidationError::InvalidBinSize { bin_size_ms: -1 })
        );
    }

    #[test]
    fn state_is_split_across_bins() {
        // run [5,15) over bins of 10 s
        let events = [ev(5_000, "run"), ev(15_000, "run")];
        let params = BinParameters {
            bin_size_ms: 10_000,
            ..BinParameters::default()
        };
        let records =
            binned_time_budget(&obs(), &events, &ethogram(), &window(0, 20_000), &params).unwrap();
        let summary: Vec<_> = records
            .iter()
            .map(|r| (r.bin_start_ms, r.count, r.total_duration_ms, r.proportion))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, 1, Measure::Value(5_000), Measure::Value(0.5)),
                (10_000, 1, Measure::Value(5_000), Measure::Value(0.5)),
            ]
        );
    }

    #[test]
    fn bin_statistics_use_union_components() {
        let events = [
            ev(0, "run"),
            ev(2_000, "run"),
            ev(4_000, "run"),
            ev(8_000, "run"),
        ];
        let records = binned_time_budget(
            &obs(),
            &events,
            &ethogram(),
            &window(0, 10_000),
            &BinParameters::default(),
        )
        .unwrap();
        let run = &records[0];
        assert_eq!(run.count, 2);
        assert_eq!(run.total_duration_ms, Measure::Value(6_000));
        assert_eq!(run.duration_mean, Measure::Value(3.0));
        assert_eq!(run.duration_stdev, Measure::Value(1.414));
        assert_eq!(run.proportion, Measure::Value(0.6));
    }

    #[test]
    fn points_report_count_only() {
        let events = [ev(1_000, "sniff"), ev(6_000, "sniff"), ev(7_000, "sniff")];
        let params = BinParameters {
            bin_size_ms: 5_000,
            ..BinParameters::default()
        };
        let records =
            binned_time_budget(&obs(), &events, &ethogram(), &window(0, 10_000), &params).unwrap();
        let counts: Vec<_> = records.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![1, 2]);
        assert!(records.iter().all(|r| r.total_duration_ms == Measure::NotApplicable));
        assert!(records.iter().all(|r| r.proportion == Measure::NotApplicable));
    }

    #[test]
    fn excluded_time_is_removed_from_other_behaviors() {
        // rest [0,5) excluded, run [5,7.5): 2.5 / 5
        let events = [ev(0, "rest"), ev(5_000, "rest"), ev(5_000, "run"), ev(7_500, "run")];
        let params = BinParameters {
            excluded_behaviors: ["rest".to_string()].into(),
            ..BinParameters::default()
        };
        let records =
            binned_time_budget(&obs(), &events, &ethogram(), &window(0, 10_000), &params).unwrap();
        let proportions: Vec<_> = records
            .iter()
            .map(|r| (r.behavior.as_str(), r.proportion))
            .collect();
        assert_eq!(
            proportions,
            vec![("rest", Measure::Value(0.5)), ("run", Measure::Value(0.5))]
        );
    }

    #[test]
    fn selected_behavior_without_events_has_zero_rows() {
        let params = BinParameters {
            behaviors: Some(["run".to_string(), "rest".to_string()].into()),
            ..BinParameters::default()
        };
        let events = [ev(0, "run"), ev(1_000, "run")];
        let records =
            binned_time_budget(&obs(), &events, &ethogram(), &window(0, 10_000), &params).unwrap();
        let rest = records.iter().find(|r| r.behavior.as_str() == "rest").unwrap();
        assert_eq!(rest.count, 0);
        assert_eq!(rest.total_duration_ms, Measure::Value(0));
        assert_eq!(rest.duration_mean, Measure::NotApplicable);
        assert_eq!(rest.proportion, Measure::Value(0.0));
    }
}
