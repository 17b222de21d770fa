//! CLI argument parsing for zoneprof

use crate::config::LabelMatch;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

/// What to extract from the profile dumps
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum View {
    /// Every decoded event
    Events,
    /// Reconstructed zones, in end-time order
    Zones,
    /// Named variable samples
    Variables,
    /// Zones of all files accumulated into per-label totals
    Summary,
}

#[derive(Parser, Debug)]
#[command(name = "zoneprof")]
#[command(version)]
#[command(about = "Decode and aggregate zone profile dumps", long_about = None)]
pub struct Cli {
    /// Raw profile dumps to read
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// What to report
    #[arg(long = "view", value_enum, default_value = "zones")]
    pub view: View,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Analysis configuration file (zoneprof.toml)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only report zones (or variables) whose label matches REGEX
    #[arg(short = 'e', long = "filter", value_name = "REGEX")]
    pub filter: Option<String>,

    /// Show only the N most expensive zones in the summary
    #[arg(long = "top", value_name = "N")]
    pub top: Option<usize>,

    /// Label comparison used when accumulating zones
    #[arg(long = "match", value_enum)]
    pub label_match: Option<LabelMatch>,

    /// Enable debug logging to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}
