//! Bins command: time budget split into consecutive time bins.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tb_core::types::subject_label;
use tb_core::{BinParameters, BinRecord, TimeFormat, WindowRequest, binned_time_budget};

use super::util::{decimal, duration};
use crate::input::Session;

/// Binned records of every observation, in session order.
pub fn compute(
    session: &Session,
    request: &WindowRequest,
    params: &BinParameters,
) -> Result<Vec<BinRecord>> {
    let mut records = Vec::new();
    for observation in &session.observations {
        let window = request
            .resolve(observation)
            .with_context(|| format!("observation {}", observation.id))?;
        records.extend(binned_time_budget(
            &observation.id,
            &observation.events,
            &session.ethogram,
            &window,
            params,
        )?);
    }
    Ok(records)
}

pub fn write_records<W: Write>(
    writer: &mut W,
    records: &[BinRecord],
    time_format: TimeFormat,
) -> std::io::Result<()> {
    if records.is_empty() {
        return writeln!(writer, "No events in the analysis window.");
    }

    writeln!(
        writer,
        "{:<12} {:<16} {:<18} {:<10} {:<10} {:>6} {:>10} {:>9} {:>9} {:>10}",
        "Observation",
        "Bin",
        "Subject",
        "Behavior",
        "Modifiers",
        "Count",
        "Total (s)",
        "Mean (s)",
        "Std dev",
        "Proportion"
    )?;
    for record in records {
        let bin = format!(
            "{}-{}",
            time_format.render(record.bin_start_ms),
            time_format.render(record.bin_end_ms)
        );
        writeln!(
            writer,
            "{:<12} {:<16} {:<18} {:<10} {:<10} {:>6} {:>10} {:>9} {:>9} {:>10}",
            record.observation.as_str(),
            bin,
            subject_label(&record.subject),
            record.behavior.as_str(),
            record.modifiers,
            record.count,
            duration(&record.total_duration_ms),
            decimal(&record.duration_mean, 3),
            decimal(&record.duration_stdev, 3),
            decimal(&record.proportion, 3),
        )?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct JsonBins<'a> {
    generated_at: String,
    records: &'a [BinRecord],
}

/// Runs the bins command.
pub fn run<W: Write>(
    writer: &mut W,
    session: &Session,
    request: &WindowRequest,
    params: &BinParameters,
    time_format: TimeFormat,
    json: bool,
) -> Result<()> {
    let records = compute(session, request, params)?;
    if json {
        let output = JsonBins {
            generated_at: Utc::now().to_rfc3339(),
            records: &records,
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
    } else {
        write_records(writer, &records, time_format)?;
    }
    Ok(())
}
