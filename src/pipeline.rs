//! The job runner: fetch → extract → parse → store for every
//! (variable, year) pair in the job.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local};
use futures::{stream, StreamExt};
use indicatif::ProgressBar;
use log::{debug, error, info, warn};

use crate::{
    cli::{create_progress_bar, create_spinner},
    config::{JobConfig, VariableSpec},
    extract::extract_archive,
    fetch::{FetchOutcome, Fetcher},
    frame::{Column, Frame},
    grid,
    parquet::save_frame,
    request::{archive_key, RetrievalRequest},
};

pub struct Pipeline {
    config: JobConfig,
    fetcher: Fetcher,
}

/// An archive staged on disk by the fetch stage.
#[derive(Debug)]
struct StagedArchive {
    variable: VariableSpec,
    year: u16,
    path: PathBuf,
}

/// Aggregated outcome of the fetch stage. Failures are collected rather
/// than swallowed per task; the job fails at the end if any are present.
#[derive(Debug, Default)]
struct StageReport {
    staged: Vec<StagedArchive>,
    empty: Vec<String>,
    failures: Vec<(String, anyhow::Error)>,
}

impl Pipeline {
    pub fn new(config: JobConfig) -> Self {
        let fetcher = Fetcher::new(&config.endpoint, config.retry.policy());

        Pipeline { config, fetcher }
    }

    /// Runs the whole job, staging archives under `staging_dir`, and
    /// returns the written parquet files.
    pub async fn run(&self, staging_dir: &Path) -> Result<Vec<PathBuf>> {
        let report = self.fetch_stage(staging_dir).await;

        for label in &report.empty {
            warn!("no data retrieved for {}", label);
        }
        for (label, err) in &report.failures {
            error!("fetch of {} failed: {:#}", label, err);
        }
        if !report.failures.is_empty() {
            bail!(
                "{} of {} fetch tasks failed",
                report.failures.len(),
                self.task_count()
            );
        }

        let mut written = Vec::new();
        for &year in &self.config.years {
            if let Some(path) = self.assemble_year(&report, year, staging_dir)? {
                written.push(path);
            }
        }

        Ok(written)
    }

    fn task_count(&self) -> usize {
        self.config.variables.len() * self.config.years.len()
    }

    /// Fetches every (variable, year) archive with a bounded concurrency
    /// window.
    async fn fetch_stage(&self, staging_dir: &Path) -> StageReport {
        let tasks: Vec<(VariableSpec, u16)> = self
            .config
            .variables
            .iter()
            .flat_map(|v| self.config.years.iter().map(move |&y| (v.clone(), y)))
            .collect();

        let bar = create_progress_bar(tasks.len() as u64, "Fetching archives".to_string());
        let mut report = StageReport::default();

        let mut results = stream::iter(tasks.into_iter().map(|(variable, year)| {
            let dest = staging_dir.join(archive_key(&self.config.prefix, &variable.name, year));
            async move {
                let outcome = self.fetch_one(&variable, year, &dest).await;
                (variable, year, dest, outcome)
            }
        }))
        .buffer_unordered(self.config.concurrency);

        while let Some((variable, year, dest, outcome)) = results.next().await {
            bar.inc(1);
            let label = format!("{} {}", variable.name, year);

            match outcome {
                Ok(FetchOutcome::Saved(bytes)) => {
                    info!("staged {} ({} bytes)", label, bytes);
                    report.staged.push(StagedArchive {
                        variable,
                        year,
                        path: dest,
                    });
                }
                Ok(FetchOutcome::Empty) => report.empty.push(label),
                Err(err) => report.failures.push((label, err)),
            }
        }
        bar.finish_with_message("Fetch stage complete");

        report
    }

    async fn fetch_one(
        &self,
        variable: &VariableSpec,
        year: u16,
        dest: &Path,
    ) -> Result<FetchOutcome> {
        let request = RetrievalRequest::for_job(&self.config, &variable.name, year)?;
        let bar = ProgressBar::hidden();

        let outcome = self.fetcher.fetch_archive(&request, dest, &bar).await?;
        Ok(outcome)
    }

    /// Extracts the year's staged archives, loads one column per variable
    /// and writes the assembled frame to parquet.
    fn assemble_year(
        &self,
        report: &StageReport,
        year: u16,
        staging_dir: &Path,
    ) -> Result<Option<PathBuf>> {
        let staged: Vec<&StagedArchive> =
            report.staged.iter().filter(|a| a.year == year).collect();

        if staged.is_empty() {
            warn!("year {}: nothing staged, skipping", year);
            return Ok(None);
        }
        if staged.len() != self.config.variables.len() {
            bail!(
                "year {}: staged {} of {} variables",
                year,
                staged.len(),
                self.config.variables.len()
            );
        }

        let extract_dir = staging_dir.join(format!("extracted-{}", year));
        let spinner = create_spinner(format!("Unpacking archives for {}...", year));
        for archive in &staged {
            extract_archive(&archive.path, &extract_dir)
                .with_context(|| format!("extracting {}", archive.path.display()))?;
        }
        spinner.finish_with_message(format!("Archives for {} unpacked", year));

        // Column order follows the job file, not fetch completion order.
        let mut columns = Vec::new();
        for spec in &self.config.variables {
            let grid_path = grid::find_grid_file(&extract_dir, &spec.code, year)?;
            let file = grid::open_grid(&grid_path)?;
            let values = grid::load_variable(&file, &spec.code, self.config.chunk_rows)?;
            columns.push(Column {
                name: spec.code.clone(),
                values,
            });
        }

        let frame = Frame::assemble(year, columns)?;
        debug!("year {} head:\n{}", year, frame.head(5));

        let output_path = self.output_path(year);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        save_frame(&frame, &output_path)?;
        info!(
            "year {}: wrote {} rows to {}",
            year,
            frame.num_rows(),
            output_path.display()
        );

        Ok(Some(output_path))
    }

    fn output_path(&self, year: u16) -> PathBuf {
        let today = Local::now();
        let file_name = format!(
            "{}-{}-{}-{:02}-{:02}.parquet",
            self.config.prefix,
            year,
            today.year(),
            today.month(),
            today.day()
        );

        self.config.resolve_output_dir().join(file_name)
    }
}

// -- Tests -------------------------------------------------------------------
