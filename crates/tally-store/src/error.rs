use thiserror::Error;

use tally_core::error::{SchemaError, TallyError};

/// Storage-side error type for reading and writing result files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("No rows to write for {}", .0.display())]
    Empty(std::path::PathBuf),
}

impl From<StoreError> for TallyError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Schema(schema) => TallyError::Schema(schema),
            StoreError::Io(io) => TallyError::Io(io),
            StoreError::Serialization(json) => TallyError::Serialization(json),
            other => TallyError::Other(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn serialization_error_display() {
        let err: StoreError = serde_json::from_str::<serde_json::Value>("invalid")
            .unwrap_err()
            .into();
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn schema_error_is_transparent() {
        let err: StoreError = SchemaError::MissingField {
            field: "specifics.id".into(),
            source_name: "a.parquet".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Missing required field 'specifics.id' in a.parquet"
        );
    }

    #[test]
    fn store_error_to_tally_error() {
        let schema: StoreError = SchemaError::UnsupportedType {
            field: "metrics.acc_norm".into(),
            data_type: "List(Utf8)".into(),
        }
        .into();
        assert!(matches!(TallyError::from(schema), TallyError::Schema(_)));

        let arrow: StoreError = arrow::error::ArrowError::ComputeError("bad cast".into()).into();
        let tally: TallyError = arrow.into();
        assert!(matches!(tally, TallyError::Other(_)));
        assert!(tally.to_string().contains("bad cast"));
    }
}
