//! Text and JSON rendering of decoded profiles
//!
//! Times in text output are shown in microseconds; JSON keeps raw
//! hectonanoseconds.

use crate::accumulate::{AccumulatedZoneData, DurationStats};
use crate::cli::OutputFormat;
use crate::event::{Event, EventKind, VariableValue};
use crate::variable_range::NamedVariable;
use crate::zone_range::ZoneData;
use anyhow::Result;
use serde::Serialize;
use std::io::Write;

/// A single decoded event
#[derive(Debug, Clone, Serialize)]
pub struct JsonEvent<'a> {
    pub time: u64,
    /// Event kind ("zone_start", "zone_end", "info", "variable", "checkpoint")
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<VariableValue>,
}

impl<'a> From<&Event<'a>> for JsonEvent<'a> {
    fn from(event: &Event<'a>) -> Self {
        let (kind, label, value) = match event.kind {
            EventKind::ZoneStart => ("zone_start", None, None),
            EventKind::ZoneEnd => ("zone_end", None, None),
            EventKind::Info(label) => ("info", Some(label), None),
            EventKind::Variable(value) => ("variable", None, Some(value)),
            EventKind::Checkpoint => ("checkpoint", None, None),
        };
        Self {
            time: event.time,
            kind,
            label,
            value,
        }
    }
}

/// Format hectonanoseconds as microseconds
pub fn format_hnsecs(hnsecs: u64) -> String {
    format!("{}.{}us", hnsecs / 10, hnsecs % 10)
}

pub fn write_events<W: Write>(out: &mut W, events: &[Event<'_>], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json: Vec<JsonEvent<'_>> = events.iter().map(JsonEvent::from).collect();
            serde_json::to_writer_pretty(&mut *out, &json)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            for event in events {
                let e = JsonEvent::from(event);
                write!(out, "{:>14} {:<11}", format_hnsecs(e.time), e.kind)?;
                if let Some(label) = e.label {
                    write!(out, " {:?}", label)?;
                }
                if let Some(value) = e.value {
                    write!(out, " {}", value)?;
                }
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

pub fn write_zones<W: Write>(out: &mut W, zones: &[ZoneData<'_>], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, zones)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            writeln!(
                out,
                "{:>6} {:>6} {:>5} {:>14} {:>14}  zone",
                "id", "parent", "level", "start", "duration"
            )?;
            writeln!(out, "{}", "─".repeat(60))?;
            for zone in zones {
                let indent = "  ".repeat(zone.nest_level.saturating_sub(1) as usize);
                writeln!(
                    out,
                    "{:>6} {:>6} {:>5} {:>14} {:>14}  {}{}",
                    zone.id,
                    zone.parent_id,
                    zone.nest_level,
                    format_hnsecs(zone.start_time),
                    format_hnsecs(zone.duration),
                    indent,
                    zone.label
                )?;
            }
        }
    }
    Ok(())
}

pub fn write_variables<W: Write>(
    out: &mut W,
    variables: &[NamedVariable<'_>],
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, variables)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            for var in variables {
                writeln!(out, "{:>14} {} = {}", format_hnsecs(var.time), var.name, var.value)?;
            }
        }
    }
    Ok(())
}

/// Write accumulated zones, most expensive first (`top` = 0 shows all)
pub fn write_summary<W: Write>(
    out: &mut W,
    rows: &[AccumulatedZoneData<'_, DurationStats>],
    top: usize,
    format: OutputFormat,
) -> Result<()> {
    let mut sorted: Vec<_> = rows.iter().collect();
    sorted.sort_by(|a, b| b.zone.duration.cmp(&a.zone.duration));
    if top > 0 {
        sorted.truncate(top);
    }

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &sorted)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            if sorted.is_empty() {
                writeln!(out, "No zones recorded.")?;
                return Ok(());
            }
            writeln!(out, "╔══════════════════════════════════════════════════════════════════════════════════╗")?;
            writeln!(out, "║  Zone Summary (sorted by total time)                                             ║")?;
            writeln!(out, "╚══════════════════════════════════════════════════════════════════════════════════╝")?;
            writeln!(
                out,
                "{:<32} {:>5} {:>8} {:>14} {:>12} {:>12} {:>12}",
                "Zone", "Level", "Calls", "Total", "Avg", "Min", "Max"
            )?;
            writeln!(out, "{}", "─".repeat(100))?;
            for row in sorted {
                let stats = row.accumulated;
                let label = if row.zone.label.is_empty() {
                    "<unlabeled>"
                } else {
                    row.zone.label
                };
                writeln!(
                    out,
                    "{:<32} {:>5} {:>8} {:>14} {:>12} {:>12} {:>12}",
                    label,
                    row.zone.nest_level,
                    stats.calls,
                    format_hnsecs(row.zone.duration),
                    format_hnsecs(row.zone.duration / stats.calls.max(1)),
                    format_hnsecs(stats.min),
                    format_hnsecs(stats.max)
                )?;
            }
            writeln!(out, "{}", "─".repeat(100))?;
        }
    }
    Ok(())
}
