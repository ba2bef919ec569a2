//! Loads a produced parquet file and renders its first rows.

use std::{fs::File, path::Path};

use anyhow::Result;
use arrow::util::pretty::pretty_format_batches;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

pub fn inspect(file_path: &Path, rows: usize) -> Result<String> {
    let file = File::open(file_path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut batches = Vec::new();
    let mut remaining = rows;

    for batch in reader {
        if remaining == 0 {
            break;
        }
        let batch = batch?;

        if batch.num_rows() > remaining {
            batches.push(batch.slice(0, remaining));
            remaining = 0;
        } else {
            remaining -= batch.num_rows();
            batches.push(batch);
        }
    }

    Ok(pretty_format_batches(&batches)?.to_string())
}

// -- Tests -------------------------------------------------------------------
