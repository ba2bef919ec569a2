//! Job configuration.
//!
//! A job file describes one dataset pull end to end: which variables and
//! years to request, where the retrieval endpoint lives, and how the runner
//! should stage, retry and store. Everything the pipeline does is driven
//! from here.

use std::{
    fs::File,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{errors::ConfigError, retry::RetryPolicy};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Remote dataset identifier, e.g. `sis-agroproductivity-indicators`.
    pub dataset: String,
    /// Storage prefix for staged archives, e.g. `crop_productivity_indicators`.
    pub prefix: String,
    /// Retrieval endpoint URL.
    pub endpoint: String,
    pub product_family: String,
    pub crop_type: String,
    pub growing_season: String,
    pub variables: Vec<VariableSpec>,
    pub years: Vec<u16>,
    #[serde(default = "default_months")]
    pub months: Vec<u8>,
    #[serde(default = "default_days")]
    pub days: Vec<u8>,
    /// Where Parquet output lands. Defaults to the home directory.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Width of the concurrent fetch window.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Rows per slice when reading grid variables.
    #[serde(default = "default_chunk_rows")]
    pub chunk_rows: usize,
    #[serde(default)]
    pub retry: RetrySettings,
}

/// A requested measurement: the long name used on the wire and the short
/// code embedded in extracted file names (e.g. `crop_development_stage`
/// and `DVS`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_secs: u64,
    pub multiplier: f64,
    pub max_delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: 8,
            initial_delay_secs: 10,
            multiplier: 2.0,
            max_delay_secs: 300,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_secs(self.initial_delay_secs),
            multiplier: self.multiplier,
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

fn default_months() -> Vec<u8> {
    (1..=12).collect()
}

// The vendor publishes dekadal products; these are the days it knows about.
fn default_days() -> Vec<u8> {
    vec![10, 20, 28, 30, 31]
}

fn default_concurrency() -> usize {
    4
}

fn default_chunk_rows() -> usize {
    16
}

impl JobConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: JobConfig = serde_yaml::from_reader(file)?;
        config.validate()?;

        Ok(config)
    }

    pub fn resolve_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.variables.is_empty() {
            return Err(ConfigError::Invalid("at least one variable is required"));
        }
        if self.years.is_empty() {
            return Err(ConfigError::Invalid("at least one year is required"));
        }
        if self.months.iter().any(|m| !(1..=12).contains(m)) {
            return Err(ConfigError::Invalid("months must be between 1 and 12"));
        }
        if self.days.iter().any(|d| !(1..=31).contains(d)) {
            return Err(ConfigError::Invalid("days must be between 1 and 31"));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1"));
        }
        if self.chunk_rows == 0 {
            return Err(ConfigError::Invalid("chunk_rows must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1"));
        }
        if self.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid("retry.multiplier must be at least 1.0"));
        }

        Ok(())
    }
}

// -- Tests -------------------------------------------------------------------
