//! Save an assembled year frame to a parquet file.

use std::{fs::File, path::Path, sync::Arc};

use anyhow::Result;
use arrow::{
    array::{ArrayRef, Float32Builder, UInt16Builder},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};

use crate::frame::Frame;

const CHUNK_SIZE: usize = 100_000;

/// Writes the frame with a `year` column plus one nullable `Float32` column
/// per variable, in batches of [`CHUNK_SIZE`] rows.
pub fn save_frame(frame: &Frame, file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;

    let mut fields = vec![Field::new("year", DataType::UInt16, false)];
    for column in frame.columns() {
        fields.push(Field::new(&column.name, DataType::Float32, true));
    }
    let schema = Arc::new(Schema::new(fields));

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::ZSTD(
            parquet::basic::ZstdLevel::default(),
        ))
        .set_dictionary_enabled(true)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let rows = frame.num_rows();
    let mut start = 0;
    while start < rows {
        let end = (start + CHUNK_SIZE).min(rows);

        let mut year_builder = UInt16Builder::with_capacity(end - start);
        for _ in start..end {
            year_builder.append_value(frame.year);
        }

        let mut arrays: Vec<ArrayRef> = vec![Arc::new(year_builder.finish())];
        for column in frame.columns() {
            let mut builder = Float32Builder::with_capacity(end - start);
            for value in &column.values[start..end] {
                builder.append_option(*value);
            }
            arrays.push(Arc::new(builder.finish()));
        }

        let batch = RecordBatch::try_new(schema.clone(), arrays)?;
        writer.write(&batch)?;

        start = end;
    }

    writer.close()?;
    Ok(())
}

// -- Tests -------------------------------------------------------------------
