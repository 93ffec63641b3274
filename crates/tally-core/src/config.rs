use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};
use crate::record::DirectoryLayout;

/// How "universally correct" treats scores outside `{0, 1}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectnessPolicy {
    /// Scores above 1 are accepted; a question is universally correct when
    /// the summed score reaches the number of attempts.
    #[default]
    Lenient,
    /// Scores must lie in `[0, 1]`; anything else is rejected at ingestion.
    Strict,
}

/// Which results-tree shape the scanner should assume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutSelector {
    /// Probe each top-level entry.
    #[default]
    Auto,
    Flat,
    Nested,
}

impl LayoutSelector {
    /// The declared layout, or `None` when probing is requested.
    pub fn declared(self) -> Option<DirectoryLayout> {
        match self {
            Self::Auto => None,
            Self::Flat => Some(DirectoryLayout::Flat),
            Self::Nested => Some(DirectoryLayout::Nested),
        }
    }
}

/// Field paths used to pull records out of result rows.
///
/// Dotted paths address nested struct columns (`specifics.id`) as well as
/// already-flattened column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Required.
    #[serde(default = "default_question_field")]
    pub question_field: String,
    /// Required.
    #[serde(default = "default_score_field")]
    pub score_field: String,
    /// Optional; falls back to the file stem.
    #[serde(default = "default_model_field")]
    pub model_field: String,
    /// Optional.
    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,
}

fn default_question_field() -> String {
    "specifics.id".into()
}

fn default_score_field() -> String {
    "metrics.acc_norm".into()
}

fn default_model_field() -> String {
    "model_name".into()
}

fn default_timestamp_field() -> String {
    "timestamp".into()
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self {
            question_field: default_question_field(),
            score_field: default_score_field(),
            model_field: default_model_field(),
            timestamp_field: default_timestamp_field(),
        }
    }
}

/// Configuration for scanning and aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateConfig {
    #[serde(default)]
    pub schema: RecordSchema,

    #[serde(default)]
    pub correctness: CorrectnessPolicy,

    #[serde(default)]
    pub layout: LayoutSelector,

    /// Directory name skipped during subset discovery (the report output).
    #[serde(default = "default_report_dir_name")]
    pub report_dir_name: String,
}

fn default_report_dir_name() -> String {
    "evaluation_results".into()
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            schema: RecordSchema::default(),
            correctness: CorrectnessPolicy::default(),
            layout: LayoutSelector::default(),
            report_dir_name: default_report_dir_name(),
        }
    }
}

impl AggregateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: RecordSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_correctness(mut self, policy: CorrectnessPolicy) -> Self {
        self.correctness = policy;
        self
    }

    pub fn with_layout(mut self, layout: LayoutSelector) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_report_dir_name(mut self, name: impl Into<String>) -> Self {
        self.report_dir_name = name.into();
        self
    }

    /// Load from YAML. Missing keys take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| TallyError::Config(e.to_string()))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }
}
