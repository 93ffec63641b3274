use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the Tally aggregator.
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Failed to write artifact '{artifact}': {reason}")]
    Write { artifact: String, reason: String },

    #[error("No result files found under {}", .0.display())]
    NoFilesFound(PathBuf),

    /// Nothing usable was found, but only because every entry under `root`
    /// was skipped during discovery.
    #[error(
        "No result files discovered under {}: {} entr(ies) skipped, first: {}",
        .root.display(),
        .warnings.len(),
        .warnings.first().map(ToString::to_string).unwrap_or_default()
    )]
    DetectionFailed {
        root: PathBuf,
        warnings: Vec<DiscoveryError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Problems found while walking a results tree. These are recovered locally:
/// the entry is skipped and the scan continues.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error("Unreadable entry {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("Cannot tell whether {} is a model or an organization folder", .0.display())]
    AmbiguousLayout(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}

/// A record does not match the declared record schema.
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    #[error("Missing required field '{field}' in {source_name}")]
    MissingField { field: String, source_name: String },

    #[error("Invalid value for '{field}' in {source_name}: {value}")]
    InvalidValue {
        field: String,
        value: String,
        source_name: String,
    },

    #[error("Unsupported column type for '{field}': {data_type}")]
    UnsupportedType { field: String, data_type: String },
}

pub type Result<T> = std::result::Result<T, TallyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_error_display() {
        let err = DiscoveryError::Unreadable {
            path: PathBuf::from("/data/org"),
            reason: "permission denied".into(),
        };
        assert_eq!(
            err.to_string(),
            "Unreadable entry /data/org: permission denied"
        );
    }

    #[test]
    fn ambiguous_layout_display() {
        let err = DiscoveryError::AmbiguousLayout(PathBuf::from("/data/empty"));
        assert!(err.to_string().contains("/data/empty"));
    }

    #[test]
    fn schema_error_display() {
        let err = SchemaError::MissingField {
            field: "specifics.id".into(),
            source_name: "a.parquet".into(),
        };
        assert_eq!(
            err.to_string(),
            "Missing required field 'specifics.id' in a.parquet"
        );
    }

    #[test]
    fn no_files_found_display() {
        let err = TallyError::NoFilesFound(PathBuf::from("/data"));
        assert_eq!(err.to_string(), "No result files found under /data");
    }

    #[test]
    fn detection_failed_display() {
        let err = TallyError::DetectionFailed {
            root: PathBuf::from("/data"),
            warnings: vec![DiscoveryError::AmbiguousLayout(PathBuf::from("/data/m"))],
        };
        let message = err.to_string();
        assert!(message.starts_with("No result files discovered under /data: 1 entr(ies) skipped"));
        assert!(message.contains("/data/m"));
    }

    #[test]
    fn tally_error_from_schema_error() {
        let schema_err = SchemaError::InvalidValue {
            field: "metrics.acc_norm".into(),
            value: "-1".into(),
            source_name: "x.jsonl".into(),
        };
        let err: TallyError = schema_err.into();
        assert!(matches!(err, TallyError::Schema(SchemaError::InvalidValue { .. })));
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn tally_error_from_discovery_error() {
        let err: TallyError = DiscoveryError::NotADirectory(PathBuf::from("f.txt")).into();
        assert!(matches!(err, TallyError::Discovery(DiscoveryError::NotADirectory(_))));
    }

    #[test]
    fn write_error_display() {
        let err = TallyError::Write {
            artifact: "dataset_total".into(),
            reason: "disk full".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to write artifact 'dataset_total': disk full"
        );
    }
}
