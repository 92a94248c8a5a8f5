//! Time-budget aggregation.
//!
//! # Algorithm Summary
//!
//! 1. Read the clipped rows of every observation from the store
//! 2. Pair each (subject, behavior, modifiers) stream into intervals; a stream
//!    with an odd number of occurrences marks its group as unpaired
//! 3. Group by (subject, behavior, modifiers), or by (subject, behavior) when
//!    modifiers are ignored, and compute counts, durations and gaps
//! 4. Normalize durations by the total window length, minus the time spent
//!    in excluded behaviors for the subject
//! 5. Optionally roll the records up per behavioral category

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use statrs::statistics::Statistics;

use crate::behavior_type::BehaviorType;
use crate::error::AnalysisError;
use crate::ethogram::Ethogram;
use crate::store::{EventFilter, EventStore, StoredEvent, StreamKey};
use crate::types::{BehaviorCode, ObservationId, ms_to_seconds, round_to};
use crate::window::AnalysisWindow;

/// A reported statistic, or the reason it has no value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measure<T> {
    Value(T),
    /// The statistic does not apply (point durations, fewer than two values).
    NotApplicable,
    /// The group has an odd number of state occurrences.
    Unpaired,
    /// No meaningful value (e.g. an empty percentage denominator).
    Unavailable,
}

impl<T> Measure<T> {
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Placeholder text for the non-value variants.
    pub const fn label(&self) -> Option<&'static str> {
        match self {
            Self::Value(_) => None,
            Self::NotApplicable => Some("NA"),
            Self::Unpaired => Some("UNPAIRED"),
            Self::Unavailable => Some("-"),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Measure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.label()) {
            (Self::Value(value), _) => fmt::Display::fmt(value, f),
            (_, Some(label)) => f.write_str(label),
            (_, None) => Ok(()),
        }
    }
}

impl<T: Serialize> Serialize for Measure<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match (self, self.label()) {
            (Self::Value(value), _) => value.serialize(serializer),
            (_, Some(label)) => serializer.serialize_str(label),
            (_, None) => serializer.serialize_none(),
        }
    }
}

/// Grouping mode of a time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    /// One record per subject, behavior and modifier set.
    #[default]
    Behavior,
    /// One record per subject and behavioral category.
    Category,
}

impl Grouping {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Behavior => "behavior",
            Self::Category => "category",
        }
    }

    /// The aggregation strategy for this mode.
    pub fn strategy(self) -> &'static dyn Aggregation {
        match self {
            Self::Behavior => &ByBehavior,
            Self::Category => &ByCategory,
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grouping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "behavior" => Ok(Self::Behavior),
            "category" => Ok(Self::Category),
            _ => Err(format!("unknown grouping: {s}")),
        }
    }
}

/// Parameters of a time-budget analysis.
#[derive(Debug, Clone)]
pub struct BudgetParameters {
    pub grouping: Grouping,

    /// Subjects to report. `None` reports every subject with events.
    pub subjects: Option<BTreeSet<String>>,

    /// Behaviors to report. `None` reports every behavior with events.
    pub behaviors: Option<BTreeSet<String>>,

    /// Keep modifier sets apart. When false, a behavior's occurrences form a
    /// single group with an empty modifier string.
    /// Default: true.
    pub include_modifiers: bool,

    /// Skip selected behaviors that have no occurrence for a subject.
    /// Default: false (they are reported with a count of 0).
    pub exclude_behaviors_without_events: bool,

    /// Behaviors whose duration is subtracted from the window length when
    /// computing the other behaviors' percentages.
    pub excluded_behaviors: BTreeSet<String>,
}

impl Default for BudgetParameters {
    fn default() -> Self {
        Self {
            grouping: Grouping::Behavior,
            subjects: None,
            behaviors: None,
            include_modifiers: true,
            exclude_behaviors_without_events: false,
            excluded_behaviors: BTreeSet::new(),
        }
    }
}

impl BudgetParameters {
    fn subject_selected(&self, subject: &str) -> bool {
        self.subjects.as_ref().is_none_or(|s| s.contains(subject))
    }

    fn behavior_selected(&self, code: &str) -> bool {
        self.behaviors.as_ref().is_none_or(|b| b.contains(code))
    }
}

/// Statistics for one (subject, behavior, modifiers) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationRecord {
    pub subject: String,
    pub behavior: BehaviorCode,
    pub modifiers: String,
    pub count: Measure<usize>,
    #[serde(rename = "total_duration", serialize_with = "serialize_ms_as_seconds")]
    pub total_duration_ms: Measure<i64>,
    /// Seconds, 3 decimals.
    pub duration_mean: Measure<f64>,
    pub duration_stdev: Measure<f64>,
    pub inter_event_mean: Measure<f64>,
    pub inter_event_stdev: Measure<f64>,
    /// Percentage of the (exclusion-adjusted) window, 1 decimal.
    pub percent_of_window: Measure<f64>,
}

pub(crate) fn serialize_ms_as_seconds<S: Serializer>(
    value: &Measure<i64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Measure::Value(ms) => serializer.serialize_f64(ms_to_seconds(*ms)),
        other => serializer.serialize_str(other.label().unwrap_or_default()),
    }
}

/// Totals for one (subject, category).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRecord {
    pub subject: String,
    pub category: String,
    pub count: usize,
    #[serde(rename = "total_duration", serialize_with = "serialize_ms_as_seconds")]
    pub total_duration_ms: Measure<i64>,
}

/// Output of a time-budget analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "grouping", content = "records", rename_all = "lowercase")]
pub enum TimeBudget {
    Behavior(Vec<AggregationRecord>),
    Category(Vec<CategoryRecord>),
}

/// Turns per-behavior records into the output of one grouping mode.
pub trait Aggregation: Sync {
    fn aggregate(&self, records: Vec<AggregationRecord>, ethogram: &Ethogram) -> TimeBudget;
}

/// Per-behavior output, unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByBehavior;

impl Aggregation for ByBehavior {
    fn aggregate(&self, records: Vec<AggregationRecord>, _ethogram: &Ethogram) -> TimeBudget {
        TimeBudget::Behavior(records)
    }
}

/// Sums counts and durations per category. Unpaired groups and behaviors
/// without events are left out.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByCategory;

impl Aggregation for ByCategory {
    fn aggregate(&self, records: Vec<AggregationRecord>, ethogram: &Ethogram) -> TimeBudget {
        let mut categories: BTreeMap<(String, String), CategoryRecord> = BTreeMap::new();

        for record in records {
            let Measure::Value(count @ 1..) = record.count else {
                continue;
            };
            let category = ethogram.category_label(record.behavior.as_str()).to_string();
            let entry = categories
                .entry((record.subject.clone(), category.clone()))
                .or_insert_with(|| CategoryRecord {
                    subject: record.subject.clone(),
                    category,
                    count: 0,
                    total_duration_ms: Measure::NotApplicable,
                });

            entry.count += count;
            if let Measure::Value(ms) = record.total_duration_ms {
                entry.total_duration_ms = match entry.total_duration_ms {
                    Measure::Value(total) => Measure::Value(total + ms),
                    _ => Measure::Value(ms),
                };
            }
        }

        TimeBudget::Category(categories.into_values().collect())
    }
}

/// Occurrences of one aggregation group, across observations.
#[derive(Debug)]
struct Group {
    kind: BehaviorType,
    unpaired: bool,
    /// (observation index, start, stop); points have start == stop
    spans: Vec<(usize, i64, i64)>,
}

/// Computes a time budget over clipped observations.
///
/// `windows` lists the observations to include with the window each was
/// clipped to. Percentages are relative to the sum of the window lengths.
pub fn time_budget<S: EventStore>(
    store: &S,
    windows: &[(ObservationId, AnalysisWindow)],
    ethogram: &Ethogram,
    params: &BudgetParameters,
) -> Result<TimeBudget, AnalysisError> {
    let records = behavior_records(store, windows, ethogram, params)?;
    Ok(params.grouping.strategy().aggregate(records, ethogram))
}

/// Per-behavior records, whatever the grouping mode.
pub fn behavior_records<S: EventStore>(
    store: &S,
    windows: &[(ObservationId, AnalysisWindow)],
    ethogram: &Ethogram,
    params: &BudgetParameters,
) -> Result<Vec<AggregationRecord>, AnalysisError> {
    let mut groups: BTreeMap<(String, BehaviorCode, String), Group> = BTreeMap::new();
    let mut seen_subjects: BTreeSet<String> = BTreeSet::new();

    for (obs_idx, (observation, _)) in windows.iter().enumerate() {
        let rows = store
            .select(&EventFilter::observation(observation))
            .map_err(AnalysisError::store)?;

        for (key, occurrences) in split_streams(&rows) {
            seen_subjects.insert(key.subject.clone());
            if !params.subject_selected(&key.subject) || !params.behavior_selected(key.code.as_str()) {
                continue;
            }

            let modifiers = if params.include_modifiers {
                key.modifiers.clone()
            } else {
                String::new()
            };
            let group = groups
                .entry((key.subject.clone(), key.code.clone(), modifiers))
                .or_insert_with(|| Group {
                    kind: key.kind,
                    unpaired: false,
                    spans: Vec::new(),
                });

            match key.kind {
                BehaviorType::Point => group
                    .spans
                    .extend(occurrences.iter().map(|t| (obs_idx, *t, *t))),
                BehaviorType::State => {
                    if occurrences.len() % 2 == 1 {
                        tracing::warn!(
                            observation = %observation,
                            subject = %key.subject,
                            behavior = %key.code,
                            modifiers = %key.modifiers,
                            "unpaired state occurrences in time budget"
                        );
                        group.unpaired = true;
                    }
                    group.spans.extend(
                        occurrences
                            .chunks_exact(2)
                            .map(|pair| (obs_idx, pair[0], pair[1])),
                    );
                }
            }
        }
    }

    let total_window_ms: i64 = windows.iter().map(|(_, w)| w.length_ms()).sum();

    let mut excluded_ms: BTreeMap<&str, i64> = BTreeMap::new();
    for ((subject, code, _), group) in &groups {
        if group.kind.is_state()
            && !group.unpaired
            && params.excluded_behaviors.contains(code.as_str())
        {
            *excluded_ms.entry(subject.as_str()).or_default() +=
                group.spans.iter().map(|(_, start, stop)| stop - start).sum::<i64>();
        }
    }

    let mut records: Vec<AggregationRecord> = groups
        .iter()
        .map(|((subject, code, modifiers), group)| {
            let denominator_ms = if params.excluded_behaviors.contains(code.as_str()) {
                total_window_ms
            } else {
                total_window_ms - excluded_ms.get(subject.as_str()).copied().unwrap_or(0)
            };
            group_record(subject, code, modifiers, group, windows, denominator_ms)
        })
        .collect();

    if !params.exclude_behaviors_without_events {
        records.extend(zero_records(&groups, &seen_subjects, ethogram, params));
        records.sort_by(|a, b| {
            (&a.subject, &a.behavior, &a.modifiers).cmp(&(&b.subject, &b.behavior, &b.modifiers))
        });
    }

    tracing::debug!(
        observations = windows.len(),
        records = records.len(),
        total_window_ms,
        "computed time budget"
    );

    Ok(records)
}

/// Splits rows (ordered by stream, then time) into per-stream occurrence times.
fn split_streams(rows: &[StoredEvent]) -> Vec<(StreamKey, Vec<i64>)> {
    let mut streams: Vec<(StreamKey, Vec<i64>)> = Vec::new();
    for row in rows {
        let key = StreamKey::from(row);
        match streams.last_mut() {
            Some((last, times)) if *last == key => times.push(row.occurrence_ms),
            _ => streams.push((key, vec![row.occurrence_ms])),
        }
    }
    streams
}

fn group_record(
    subject: &str,
    code: &BehaviorCode,
    modifiers: &str,
    group: &Group,
    windows: &[(ObservationId, AnalysisWindow)],
    denominator_ms: i64,
) -> AggregationRecord {
    let mut record = AggregationRecord {
        subject: subject.to_string(),
        behavior: code.clone(),
        modifiers: modifiers.to_string(),
        count: Measure::Unpaired,
        total_duration_ms: Measure::Unpaired,
        duration_mean: Measure::Unpaired,
        duration_stdev: Measure::Unpaired,
        inter_event_mean: Measure::Unpaired,
        inter_event_stdev: Measure::Unpaired,
        percent_of_window: Measure::Unavailable,
    };
    if group.unpaired {
        return record;
    }

    let mut spans = group.spans.clone();
    spans.sort_unstable();

    let gaps: Vec<i64> = spans
        .windows(2)
        .filter(|pair| pair[0].0 == pair[1].0)
        .filter_map(|pair| {
            let (obs_idx, _, prev_stop) = pair[0];
            let (_, next_start, _) = pair[1];
            let window = &windows[obs_idx].1;
            let gap = next_start - prev_stop;
            (gap >= 0 && window.contains(prev_stop) && window.contains(next_start)).then_some(gap)
        })
        .collect();
    (record.inter_event_mean, record.inter_event_stdev) = mean_and_stdev(&gaps);
    record.count = Measure::Value(spans.len());

    match group.kind {
        BehaviorType::Point => {
            record.total_duration_ms = Measure::NotApplicable;
            record.duration_mean = Measure::NotApplicable;
            record.duration_stdev = Measure::NotApplicable;
            record.percent_of_window = Measure::NotApplicable;
        }
        BehaviorType::State => {
            let durations: Vec<i64> = spans.iter().map(|(_, start, stop)| stop - start).collect();
            let total_ms: i64 = durations.iter().sum();
            record.total_duration_ms = Measure::Value(total_ms);
            (record.duration_mean, record.duration_stdev) = mean_and_stdev(&durations);
            record.percent_of_window = percent(total_ms, denominator_ms);
        }
    }
    record
}

/// Records for selected behaviors a subject never showed.
fn zero_records(
    groups: &BTreeMap<(String, BehaviorCode, String), Group>,
    seen_subjects: &BTreeSet<String>,
    ethogram: &Ethogram,
    params: &BudgetParameters,
) -> Vec<AggregationRecord> {
    let Some(behaviors) = &params.behaviors else {
        return Vec::new();
    };
    let subjects = params.subjects.as_ref().unwrap_or(seen_subjects);

    let mut records = Vec::new();
    for subject in subjects {
        for code in behaviors {
            let Some(entry) = ethogram.get(code) else {
                continue;
            };
            let observed = groups
                .keys()
                .any(|(s, c, _)| s == subject && c.as_str() == code.as_str());
            if observed {
                continue;
            }

            let duration = match entry.kind {
                BehaviorType::State => Measure::Value(0),
                BehaviorType::Point => Measure::NotApplicable,
            };
            records.push(AggregationRecord {
                subject: subject.clone(),
                behavior: entry.code.clone(),
                modifiers: String::new(),
                count: Measure::Value(0),
                total_duration_ms: duration,
                duration_mean: Measure::NotApplicable,
                duration_stdev: Measure::NotApplicable,
                inter_event_mean: Measure::NotApplicable,
                inter_event_stdev: Measure::NotApplicable,
                percent_of_window: duration.value().map_or(Measure::NotApplicable, |_| Measure::Value(0.0)),
            });
        }
    }
    records
}

/// Sample mean and standard deviation in seconds, rounded to 3 decimals.
pub(crate) fn mean_and_stdev(values_ms: &[i64]) -> (Measure<f64>, Measure<f64>) {
    let seconds: Vec<f64> = values_ms.iter().map(|ms| ms_to_seconds(*ms)).collect();
    let mean = if seconds.is_empty() {
        Measure::NotApplicable
    } else {
        Measure::Value(round_to(seconds.iter().mean(), 3))
    };
    let stdev = if seconds.len() < 2 {
        Measure::NotApplicable
    } else {
        Measure::Value(round_to(seconds.iter().std_dev(), 3))
    };
    (mean, stdev)
}

fn percent(duration_ms: i64, denominator_ms: i64) -> Measure<f64> {
    if duration_ms == 0 {
        return Measure::Value(0.0);
    }
    if denominator_ms <= 0 {
        return Measure::Unavailable;
    }
    #[allow(clippy::cast_precision_loss)]
    let pct = duration_ms as f64 / denominator_ms as f64 * 100.0;
    Measure::Value(round_to(pct, 1))
}
