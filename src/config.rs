//! Analysis configuration (zoneprof.toml)
//!
//! Controls how the `zoneprof` binary decodes and aggregates profile dumps.
//! Every field is optional; command-line flags override file values.
//!
//! # Example zoneprof.toml
//!
//! ```toml
//! label_match = "case_insensitive"
//! storage_capacity = 131072
//! top = 20
//! label_filter = "^(render|physics)"
//! ```

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How zone labels are compared when accumulating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LabelMatch {
    /// Labels must be identical
    #[default]
    Exact,
    /// Labels are compared ignoring ASCII case
    CaseInsensitive,
}

impl LabelMatch {
    pub fn matches(self, a: &str, b: &str) -> bool {
        match self {
            LabelMatch::Exact => crate::accumulate::exact_label_match(a, b),
            LabelMatch::CaseInsensitive => a.eq_ignore_ascii_case(b),
        }
    }
}

/// Root configuration for zoneprof.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Label comparison used by the summary view
    pub label_match: LabelMatch,

    /// Number of accumulation slots (upper bound on zones per summary)
    pub storage_capacity: usize,

    /// Rows shown in the summary view (0 = all)
    pub top: usize,

    /// Only report zones whose label matches this regex
    pub label_filter: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            label_match: LabelMatch::Exact,
            storage_capacity: 65_536,
            top: 0,
            label_filter: None,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_capacity == 0 {
            bail!("storage_capacity must be > 0");
        }
        self.label_regex()?;
        Ok(())
    }

    /// Compiled `label_filter`, if set
    pub fn label_regex(&self) -> Result<Option<Regex>> {
        self.label_filter
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).with_context(|| format!("Invalid label filter: {}", pattern))
            })
            .transpose()
    }
}
