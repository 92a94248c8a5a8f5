//! Command-line argument definitions.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tb_core::{BinParameters, BudgetParameters, Grouping, WindowPolicy, WindowRequest, parse_seconds};

/// Time budgets for coded behavioral observations.
///
/// Reads a session file (ethogram plus observations) and checks state
/// pairing, measures coding exhaustivity or computes time budgets.
#[derive(Debug, Parser)]
#[command(name = "tb", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report state events that are not paired.
    Check {
        /// Session file (JSON).
        session: PathBuf,
    },

    /// Percentage of each observation covered by coded behaviors.
    Exhaustivity {
        session: PathBuf,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Close unpaired states and write the fixed session.
    Fix {
        session: PathBuf,

        /// Time (seconds) after which closing events are placed.
        #[arg(long, value_parser = parse_time)]
        at: i64,

        /// Write the fixed session here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Time budget over all observations of a session.
    Budget {
        session: PathBuf,

        /// Group records by behavior or by behavioral category.
        #[arg(long = "by", default_value = "behavior")]
        grouping: Grouping,

        #[command(flatten)]
        window: WindowArgs,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Omit selected behaviors that have no events.
        #[arg(long)]
        exclude_empty: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Time budget split into consecutive time bins.
    Bins {
        session: PathBuf,

        /// Bin length in seconds. 0 puts the whole window in one bin.
        #[arg(long, value_parser = parse_time, default_value = "0")]
        bin_size: i64,

        #[command(flatten)]
        window: WindowArgs,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Analysis window options.
#[derive(Debug, Clone, Args)]
pub struct WindowArgs {
    /// How the window is chosen: full, events or interval.
    #[arg(long = "window", default_value = "full")]
    pub policy: WindowPolicy,

    /// Window start in seconds (interval only).
    #[arg(long, value_parser = parse_time)]
    pub start: Option<i64>,

    /// Window end in seconds (interval only).
    #[arg(long, value_parser = parse_time)]
    pub end: Option<i64>,
}

impl WindowArgs {
    pub const fn request(&self) -> WindowRequest {
        WindowRequest {
            policy: self.policy,
            start_ms: self.start,
            end_ms: self.end,
        }
    }
}

/// Subject and behavior selection options.
#[derive(Debug, Clone, Args)]
pub struct SelectionArgs {
    /// Only report these subjects (repeatable).
    #[arg(long = "subject")]
    pub subjects: Vec<String>,

    /// Only report these behaviors (repeatable).
    #[arg(long = "behavior")]
    pub behaviors: Vec<String>,

    /// Behaviors whose duration is removed from the others' window (repeatable).
    #[arg(long = "exclude")]
    pub excluded: Vec<String>,

    /// Merge the modifier sets of each behavior.
    #[arg(long)]
    pub ignore_modifiers: bool,
}

fn selected(values: &[String]) -> Option<BTreeSet<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().cloned().collect())
    }
}

impl SelectionArgs {
    pub fn budget_parameters(&self, grouping: Grouping, exclude_empty: bool) -> BudgetParameters {
        BudgetParameters {
            grouping,
            subjects: selected(&self.subjects),
            behaviors: selected(&self.behaviors),
            include_modifiers: !self.ignore_modifiers,
            exclude_behaviors_without_events: exclude_empty,
            excluded_behaviors: self.excluded.iter().cloned().collect(),
        }
    }

    pub fn bin_parameters(&self, bin_size_ms: i64) -> BinParameters {
        BinParameters {
            bin_size_ms,
            subjects: selected(&self.subjects),
            behaviors: selected(&self.behaviors),
            include_modifiers: !self.ignore_modifiers,
            excluded_behaviors: self.excluded.iter().cloned().collect(),
        }
    }
}

fn parse_time(text: &str) -> Result<i64, tb_core::ValidationError> {
    parse_seconds(text)
}
