use std::fs::File;
use std::path::Path;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray, StructArray};
use arrow::compute::{can_cast_types, cast, cast_with_options, CastOptions};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value;

use tally_core::config::{CorrectnessPolicy, RecordSchema};
use tally_core::error::SchemaError;
use tally_core::record::EvaluationRecord;

use crate::error::Result;

/// Extensions [`read_records`] understands.
pub const RECORD_EXTENSIONS: [&str; 3] = ["parquet", "jsonl", "json"];

/// Read all record batches of a Parquet file.
pub fn read_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

/// Read and validate the records of one file belonging to `subset`.
///
/// The question id and score are required: a row without them fails the
/// whole file. The model name falls back to the file stem and the timestamp
/// is left empty when their columns are absent.
pub fn read_records(
    path: &Path,
    subset: &str,
    schema: &RecordSchema,
    policy: CorrectnessPolicy,
) -> Result<Vec<EvaluationRecord>> {
    let source_name = path.display().to_string();
    let fallback_model = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let records = match path.extension().and_then(|e| e.to_str()) {
        Some("parquet") => {
            let mut records = Vec::new();
            for batch in read_batches(path)? {
                records.extend(batch_records(
                    &batch,
                    subset,
                    schema,
                    &fallback_model,
                    &source_name,
                )?);
            }
            records
        }
        Some("jsonl") => {
            let data = std::fs::read_to_string(path)?;
            let mut rows = Vec::new();
            for line in data.lines().filter(|l| !l.trim().is_empty()) {
                rows.push(serde_json::from_str::<Value>(line)?);
            }
            json_records(&rows, subset, schema, &fallback_model, &source_name)?
        }
        Some("json") => {
            let data = std::fs::read_to_string(path)?;
            let rows = match serde_json::from_str::<Value>(&data)? {
                Value::Array(rows) => rows,
                row => vec![row],
            };
            json_records(&rows, subset, schema, &fallback_model, &source_name)?
        }
        _ => {
            tracing::debug!(path = %source_name, "not a record file");
            Vec::new()
        }
    };

    for record in &records {
        record.validate(policy, &source_name)?;
    }
    Ok(records)
}

/// Convert one Arrow batch into records.
pub fn batch_records(
    batch: &RecordBatch,
    subset: &str,
    schema: &RecordSchema,
    fallback_model: &str,
    source_name: &str,
) -> Result<Vec<EvaluationRecord>> {
    let ids = string_column(batch, &schema.question_field, source_name)?
        .ok_or_else(|| missing(&schema.question_field, source_name))?;
    let scores = float_column(batch, &schema.score_field, source_name)?
        .ok_or_else(|| missing(&schema.score_field, source_name))?;
    let models = string_column(batch, &schema.model_field, source_name)?;
    let timestamps = string_column(batch, &schema.timestamp_field, source_name)?;

    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        if ids.is_null(row) {
            return Err(missing(&schema.question_field, source_name).into());
        }
        if scores.is_null(row) {
            return Err(missing(&schema.score_field, source_name).into());
        }
        let model = models
            .as_ref()
            .filter(|m| !m.is_null(row))
            .map_or(fallback_model, |m| m.value(row));
        let mut record =
            EvaluationRecord::new(ids.value(row), model, subset, scores.value(row));
        if let Some(ts) = timestamps.as_ref().filter(|t| !t.is_null(row)) {
            record = record.with_timestamp(ts.value(row));
        }
        records.push(record);
    }
    Ok(records)
}

/// Look up a column by dotted path: an exact (flattened) column name first,
/// then a walk through nested struct columns.
pub fn find_column(batch: &RecordBatch, path: &str) -> Option<ArrayRef> {
    if let Some(column) = batch.column_by_name(path) {
        return Some(column.clone());
    }
    let mut segments = path.split('.');
    let mut current = batch.column_by_name(segments.next()?)?.clone();
    for segment in segments {
        let nested = current.as_any().downcast_ref::<StructArray>()?;
        current = nested.column_by_name(segment)?.clone();
    }
    Some(current)
}

fn string_column(batch: &RecordBatch, path: &str, source_name: &str) -> Result<Option<StringArray>> {
    let Some(column) = find_column(batch, path) else {
        return Ok(None);
    };
    let cast_column = cast(&column, &DataType::Utf8).map_err(|_| unsupported(path, &column))?;
    let strings = cast_column
        .as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| unsupported(path, &column))?;
    tracing::trace!(field = path, source = source_name, "resolved string column");
    Ok(Some(strings))
}

fn float_column(batch: &RecordBatch, path: &str, source_name: &str) -> Result<Option<Float64Array>> {
    let Some(column) = find_column(batch, path) else {
        return Ok(None);
    };
    if !can_cast_types(column.data_type(), &DataType::Float64) {
        return Err(unsupported(path, &column).into());
    }
    // A value that does not parse is an error, not a null.
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    let cast_column = cast_with_options(&column, &DataType::Float64, &options).map_err(|e| {
        SchemaError::InvalidValue {
            field: path.to_string(),
            value: e.to_string(),
            source_name: source_name.to_string(),
        }
    })?;
    let floats = cast_column
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| unsupported(path, &column))?;
    tracing::trace!(field = path, source = source_name, "resolved score column");
    Ok(Some(floats))
}

/// Convert JSON rows into records.
pub fn json_records(
    rows: &[Value],
    subset: &str,
    schema: &RecordSchema,
    fallback_model: &str,
    source_name: &str,
) -> Result<Vec<EvaluationRecord>> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let question_id = lookup(row, &schema.question_field)
            .and_then(json_to_string)
            .ok_or_else(|| missing(&schema.question_field, source_name))?;
        let score = match lookup(row, &schema.score_field) {
            None | Some(Value::Null) => {
                return Err(missing(&schema.score_field, source_name).into());
            }
            Some(value) => json_to_score(value).ok_or_else(|| SchemaError::InvalidValue {
                field: schema.score_field.clone(),
                value: value.to_string(),
                source_name: source_name.to_string(),
            })?,
        };
        let model = lookup(row, &schema.model_field)
            .and_then(json_to_string)
            .unwrap_or_else(|| fallback_model.to_string());

        let mut record = EvaluationRecord::new(question_id, model, subset, score);
        if let Some(ts) = lookup(row, &schema.timestamp_field).and_then(json_to_string) {
            record = record.with_timestamp(ts);
        }
        records.push(record);
    }
    Ok(records)
}

/// Dotted-path lookup in a JSON object, accepting flattened keys too.
pub fn lookup<'a>(row: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(value) = row.get(path) {
        return Some(value);
    }
    path.split('.').try_fold(row, |value, segment| value.get(segment))
}

fn json_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_to_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn missing(field: &str, source_name: &str) -> SchemaError {
    SchemaError::MissingField {
        field: field.to_string(),
        source_name: source_name.to_string(),
    }
}

fn unsupported(field: &str, column: &ArrayRef) -> SchemaError {
    SchemaError::UnsupportedType {
        field: field.to_string(),
        data_type: column.data_type().to_string(),
    }
}
