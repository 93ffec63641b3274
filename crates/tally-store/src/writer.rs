use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::Result;

/// Columns attached to every row of a combined artifact.
pub const METADATA_COLUMNS: [&str; 3] = ["model_name", "eval_name", "timestamp"];

/// Provenance stamped onto each row of a combined artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMetadata {
    pub model_name: String,
    pub eval_name: String,
    pub timestamp: String,
}

/// Append (or replace) the `model_name`, `eval_name`, and `timestamp`
/// columns of a batch.
pub fn annotate_batch(batch: &RecordBatch, meta: &RowMetadata) -> Result<RecordBatch> {
    let rows = batch.num_rows();
    let schema = batch.schema();

    let mut fields: Vec<FieldRef> = Vec::with_capacity(schema.fields().len() + 3);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len() + 3);
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        if METADATA_COLUMNS.contains(&field.name().as_str()) {
            continue;
        }
        fields.push(field.clone());
        columns.push(column.clone());
    }

    for (name, value) in METADATA_COLUMNS.iter().zip([
        meta.model_name.as_str(),
        meta.eval_name.as_str(),
        meta.timestamp.as_str(),
    ]) {
        fields.push(Arc::new(Field::new(*name, DataType::Utf8, false)));
        columns.push(Arc::new(StringArray::from(vec![value; rows])));
    }

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
    Ok(batch)
}

/// Write batches to a Parquet file with ZSTD compression.
///
/// All batches must share the first batch's schema. Writing nothing is a
/// no-op and creates no file.
pub fn write_batches(batches: &[RecordBatch], path: &Path) -> Result<()> {
    let Some(first) = batches.first() else {
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(Default::default()))
        .build();

    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, first.schema(), Some(props))?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.close()?;

    Ok(())
}

/// Directory-safe form of an evaluation name (`|` and `:` become `_`).
pub fn safe_eval_name(eval_name: &str) -> String {
    eval_name.replace(['|', ':'], "_")
}

/// Path of the combined artifact for one (evaluation, model) pair.
pub fn combined_path(output_dir: &Path, eval_name: &str, model_name: &str) -> PathBuf {
    output_dir
        .join(safe_eval_name(eval_name))
        .join(format!("{model_name}.parquet"))
}
