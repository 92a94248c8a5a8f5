//! Exhaustivity command.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use tb_core::{ObservationId, exhaustivity_all};

use crate::input::Session;

#[derive(Debug, Serialize)]
struct JsonRow<'a> {
    observation: &'a ObservationId,
    percent: f64,
    skipped_undefined: usize,
}

pub fn run<W: Write>(writer: &mut W, session: &Session, json: bool) -> Result<()> {
    let results = exhaustivity_all(&session.ethogram, &session.observations);

    if json {
        let rows: Vec<JsonRow<'_>> = results
            .iter()
            .map(|(observation, result)| JsonRow {
                observation,
                percent: result.percent,
                skipped_undefined: result.skipped_undefined,
            })
            .collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&rows)?)?;
        return Ok(());
    }

    if results.is_empty() {
        writeln!(writer, "No observations.")?;
        return Ok(());
    }

    for (observation, result) in &results {
        write!(writer, "{observation}: {:.1}%", result.percent)?;
        if result.skipped_undefined > 0 {
            write!(writer, " ({} events with undefined behaviors skipped)", result.skipped_undefined)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}
