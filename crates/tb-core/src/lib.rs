//! Event timeline and time-budget engine for coded behavioral observations.
//!
//! This crate contains the fundamental types and logic for:
//! - Pairing: deriving START/STOP/POINT status from positional parity
//! - Validation: finding state events left unpaired
//! - Exhaustivity: how much of an observation is covered by coded behaviors
//! - Clipping: restricting an observation to an analysis window
//! - Time budgets: counts, durations and gaps per subject and behavior

pub mod batch;
pub mod behavior_type;
pub mod bins;
pub mod budget;
pub mod clip;
pub mod coverage;
pub mod error;
pub mod ethogram;
pub mod event;
pub mod fixer;
pub mod interval;
pub mod pairing;
pub mod store;
pub mod types;
pub mod validation;
pub mod window;

pub use batch::{
    BatchCheck, Observation, TimeBudgetReport, WindowRequest, check_observations,
    exhaustivity_all, load_and_clip, time_budget_all, time_budget_in_store,
};
pub use behavior_type::{BehaviorType, UnknownBehaviorType};
pub use bins::{BinParameters, BinRecord, binned_time_budget, time_bins};
pub use budget::{
    AggregationRecord, BudgetParameters, CategoryRecord, Grouping, Measure, TimeBudget,
    behavior_records, time_budget,
};
pub use clip::{ClipSummary, clip_observation};
pub use coverage::{Exhaustivity, observation_exhaustivity};
pub use error::AnalysisError;
pub use ethogram::{Ethogram, EthogramEntry, NO_CATEGORY};
pub use event::{Event, PairingKey};
pub use fixer::{DEFAULT_EPSILON_MS, fix_unpaired_state_events, merge_fixes};
pub use interval::{IntervalSet, Span};
pub use pairing::{EventStatus, FlaggedEvent, Interval, Pairing, build_intervals, flag_events};
pub use store::{EventFilter, EventStore, MemoryStore, StoredEvent, StreamKey, load_observation};
pub use types::{
    BehaviorCode, NO_FOCAL_SUBJECT, ObservationId, TimeFormat, ValidationError, format_hhmmss,
    format_seconds, parse_seconds,
};
pub use validation::{
    PairingReport, UnpairedState, check_state_events, check_state_events_obs,
    find_unpaired_states,
};
pub use window::{AnalysisWindow, WindowPolicy};
