//! Error types for the pipeline stages that need classification.

use std::path::PathBuf;

use thiserror::Error;

use crate::retry::Retryable;

/// Job configuration failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot open job file: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("cannot deserialize job file: {0}")]
    CantDeserialize(#[from] serde_yaml::Error),

    #[error("invalid job configuration: {0}")]
    Invalid(&'static str),
}

/// Failures while fetching an archive from the retrieval endpoint.
///
/// Only `JobPending` and `Transient` are worth retrying; everything else
/// is treated as fatal for the task.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("remote job is still running")]
    JobPending,

    #[error("transient error talking to endpoint: {0}")]
    Transient(String),

    #[error("endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cannot write staged archive {path}: {source}")]
    Stage {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        matches!(self, FetchError::JobPending | FetchError::Transient(_))
    }
}

// -- Tests -------------------------------------------------------------------
