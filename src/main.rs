use anyhow::{Context, Result};
use clap::Parser;
use memmap2::Mmap;
use regex::Regex;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use zoneprof::accumulate::{accumulate_zones, AccumulatedZoneData, DurationStats};
use zoneprof::cli::{Cli, OutputFormat, View};
use zoneprof::config::AnalysisConfig;
use zoneprof::decoder::EventRange;
use zoneprof::report;
use zoneprof::variable_range::VariableRange;
use zoneprof::zone_range::ZoneRange;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Build the effective configuration: file values first, then flags
fn load_config(args: &Cli) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(filter) = &args.filter {
        config.label_filter = Some(filter.clone());
    }
    if let Some(top) = args.top {
        config.top = top;
    }
    if let Some(label_match) = args.label_match {
        config.label_match = label_match;
    }
    config.validate()?;
    Ok(config)
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    // SAFETY: the dump is only read; concurrent truncation by another process
    // is outside what this tool supports.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to mmap {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = mmap.len(), "mapped profile dump");
    Ok(mmap)
}

fn keep(filter: Option<&Regex>, label: &str) -> bool {
    filter.map_or(true, |regex| regex.is_match(label))
}

/// Report one dump for the per-file views
fn report_file<W: Write>(
    out: &mut W,
    args: &Cli,
    filter: Option<&Regex>,
    path: &Path,
    data: &[u8],
) -> Result<()> {
    let context = || format!("Failed to decode {}", path.display());
    match args.view {
        View::Events => {
            let events = EventRange::new(data)
                .collect::<Result<Vec<_>, _>>()
                .with_context(context)?;
            report::write_events(out, &events, args.format)
        }
        View::Zones => {
            let mut zones = ZoneRange::new(data)
                .collect::<Result<Vec<_>, _>>()
                .with_context(context)?;
            zones.retain(|zone| keep(filter, zone.label));
            report::write_zones(out, &zones, args.format)
        }
        View::Variables => {
            let mut variables = VariableRange::new(data)
                .collect::<Result<Vec<_>, _>>()
                .with_context(context)?;
            variables.retain(|var| keep(filter, var.name));
            report::write_variables(out, &variables, args.format)
        }
        View::Summary => unreachable!("summary is reported across all files"),
    }
}

fn report_summary<W: Write>(
    out: &mut W,
    args: &Cli,
    config: &AnalysisConfig,
    filter: Option<&Regex>,
    dumps: &[Mmap],
) -> Result<()> {
    let mut storage: Vec<Option<AccumulatedZoneData<'_, DurationStats>>> =
        vec![None; config.storage_capacity];
    let label_match = config.label_match;
    let totals = accumulate_zones(
        &mut storage,
        DurationStats::reduce,
        |a, b| label_match.matches(a, b),
        dumps.iter().map(|dump| ZoneRange::new(dump)),
    )
    .context("Failed to accumulate zones")?;

    let rows: Vec<_> = totals
        .filter(|row| keep(filter, row.zone.label))
        .copied()
        .collect();
    report::write_summary(out, &rows, config.top, args.format)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = load_config(&args)?;
    let filter = config.label_regex()?;

    let dumps = args
        .files
        .iter()
        .map(|path| map_file(path))
        .collect::<Result<Vec<_>>>()?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if args.view == View::Summary {
        report_summary(&mut out, &args, &config, filter.as_ref(), &dumps)?;
    } else {
        for (path, dump) in args.files.iter().zip(&dumps) {
            if args.files.len() > 1 && args.format == OutputFormat::Text {
                writeln!(out, "==> {} <==", path.display())?;
            }
            report_file(&mut out, &args, filter.as_ref(), path, dump)?;
        }
    }

    out.flush()?;
    Ok(())
}

