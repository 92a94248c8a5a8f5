//! Budget command: time budget over every observation of a session.
//!
//! Observations are clipped to their analysis window in the configured
//! store, then aggregated together. Output is a fixed-width table or JSON.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tb_core::types::subject_label;
use tb_core::{
    AggregationRecord, BudgetParameters, CategoryRecord, EventFilter, EventStore, TimeBudget,
    TimeBudgetReport, TimeFormat, WindowRequest, time_budget_all, time_budget_in_store,
};
use tb_db::SqliteStore;

use super::util::{decimal, duration};
use crate::config::{Config, StoreBackend};
use crate::input::Session;

/// Opens the configured database, creating its directory if necessary.
fn open_store(config: &Config) -> Result<SqliteStore> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    SqliteStore::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

/// Clips and aggregates the session in the configured store.
pub fn compute(
    session: &Session,
    config: &Config,
    request: &WindowRequest,
    params: &BudgetParameters,
) -> Result<TimeBudgetReport> {
    match config.store {
        StoreBackend::Memory => Ok(time_budget_all(
            &session.ethogram,
            &session.observations,
            request,
            params,
        )?),
        StoreBackend::Sqlite => {
            let mut store = open_store(config)?;
            // A rerun replaces the rows of the observations it loads.
            for observation in &session.observations {
                store.delete(&EventFilter::observation(&observation.id))?;
            }
            Ok(time_budget_in_store(
                &mut store,
                &session.ethogram,
                &session.observations,
                request,
                params,
            )?)
        }
    }
}

/// Writes the human-readable report.
pub fn write_report<W: Write>(
    writer: &mut W,
    report: &TimeBudgetReport,
    time_format: TimeFormat,
) -> std::io::Result<()> {
    let grouping = match report.budget {
        TimeBudget::Behavior(_) => "behavior",
        TimeBudget::Category(_) => "category",
    };
    writeln!(writer, "TIME BUDGET by {grouping}")?;
    writeln!(
        writer,
        "Observations: {}, total window {}",
        report.windows.len(),
        time_format.render(report.total_window_ms)
    )?;
    for (observation, window) in &report.windows {
        writeln!(
            writer,
            "  {observation}  {} - {}",
            time_format.render(window.min_ms),
            time_format.render(window.max_ms)
        )?;
    }
    writeln!(writer)?;

    match &report.budget {
        TimeBudget::Behavior(records) if !records.is_empty() => write_behaviors(writer, records),
        TimeBudget::Category(records) if !records.is_empty() => write_categories(writer, records),
        _ => writeln!(writer, "No events in the analysis window."),
    }
}

fn write_behaviors<W: Write>(writer: &mut W, records: &[AggregationRecord]) -> std::io::Result<()> {
    writeln!(
        writer,
        "{:<18} {:<10} {:<10} {:>8} {:>10} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "Subject",
        "Behavior",
        "Modifiers",
        "Count",
        "Total (s)",
        "Mean (s)",
        "Std dev",
        "Gap mean",
        "Gap sd",
        "% window"
    )?;
    for record in records {
        writeln!(
            writer,
            "{:<18} {:<10} {:<10} {:>8} {:>10} {:>9} {:>9} {:>9} {:>9} {:>9}",
            subject_label(&record.subject),
            record.behavior.as_str(),
            record.modifiers,
            record.count.to_string(),
            duration(&record.total_duration_ms),
            decimal(&record.duration_mean, 3),
            decimal(&record.duration_stdev, 3),
            decimal(&record.inter_event_mean, 3),
            decimal(&record.inter_event_stdev, 3),
            decimal(&record.percent_of_window, 1),
        )?;
    }
    Ok(())
}

fn write_categories<W: Write>(writer: &mut W, records: &[CategoryRecord]) -> std::io::Result<()> {
    writeln!(
        writer,
        "{:<18} {:<16} {:>8} {:>10}",
        "Subject", "Category", "Count", "Total (s)"
    )?;
    for record in records {
        writeln!(
            writer,
            "{:<18} {:<16} {:>8} {:>10}",
            subject_label(&record.subject),
            record.category,
            record.count,
            duration(&record.total_duration_ms),
        )?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    #[serde(flatten)]
    report: &'a TimeBudgetReport,
}

/// Formats the report as JSON.
pub fn format_report_json(report: &TimeBudgetReport, generated_at: DateTime<Utc>) -> Result<String> {
    let json = JsonReport {
        generated_at: generated_at.to_rfc3339(),
        report,
    };
    Ok(serde_json::to_string_pretty(&json)?)
}

/// Runs the budget command.
pub fn run<W: Write>(
    writer: &mut W,
    session: &Session,
    config: &Config,
    request: &WindowRequest,
    params: &BudgetParameters,
    json: bool,
) -> Result<()> {
    let report = compute(session, config, request, params)?;
    if json {
        writeln!(writer, "{}", format_report_json(&report, Utc::now())?)?;
    } else {
        write_report(writer, &report, config.time_format)?;
    }
    Ok(())
}
