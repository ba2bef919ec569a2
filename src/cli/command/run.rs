//! Runs a configured ETL job end to end.

use std::path::Path;

use anyhow::Result;
use log::info;
use tempfile::TempDir;

use crate::{config::JobConfig, pipeline::Pipeline};

/// Loads the job file, stages archives through a temporary directory and
/// returns the paths of the written parquet files.
pub async fn run(config_path: &Path) -> Result<Vec<String>> {
    let config = JobConfig::from_file(config_path)?;
    info!(
        "job loaded: dataset `{}`, {} variables, {} years",
        config.dataset,
        config.variables.len(),
        config.years.len()
    );

    let staging_dir = TempDir::new()?;
    let pipeline = Pipeline::new(config);
    let written = pipeline.run(staging_dir.path()).await?;

    Ok(written
        .iter()
        .map(|path| path.to_string_lossy().to_string())
        .collect())
}
