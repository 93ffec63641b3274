use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::CorrectnessPolicy;
use crate::error::SchemaError;

/// One scored (model, question) observation within a subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// Stable cross-model question identifier.
    pub question_id: String,
    pub model_name: String,
    /// Benchmark subset (evaluation name) the question belongs to.
    pub subset_name: String,
    /// 0/1 correctness or a continuous score.
    pub is_correct: f64,
    /// Evaluation run time, when the source carries one.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl EvaluationRecord {
    pub fn new(
        question_id: impl Into<String>,
        model_name: impl Into<String>,
        subset_name: impl Into<String>,
        is_correct: f64,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            model_name: model_name.into(),
            subset_name: subset_name.into(),
            is_correct,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Check the score against the correctness policy.
    ///
    /// Negative and non-finite scores are always rejected. Scores above 1 are
    /// accepted only under [`CorrectnessPolicy::Lenient`].
    pub fn validate(
        &self,
        policy: CorrectnessPolicy,
        source_name: &str,
    ) -> Result<(), SchemaError> {
        let score = self.is_correct;
        let out_of_range = !score.is_finite()
            || score < 0.0
            || (policy == CorrectnessPolicy::Strict && score > 1.0);
        if out_of_range {
            return Err(SchemaError::InvalidValue {
                field: "is_correct".into(),
                value: score.to_string(),
                source_name: source_name.to_string(),
            });
        }
        if self.question_id.is_empty() {
            return Err(SchemaError::MissingField {
                field: "question_id".into(),
                source_name: source_name.to_string(),
            });
        }
        Ok(())
    }
}

/// The two recognized results-tree shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryLayout {
    /// `root/model_name/timestamp/*`
    Flat,
    /// `root/model_org/model_name/timestamp/*`
    Nested,
}

/// A discovered result file for one (model, evaluation, run) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFile {
    pub path: PathBuf,
    /// Effective model name (`org_model` for nested layouts).
    pub model_name: String,
    pub eval_name: String,
    /// Raw run-folder name the file was found in.
    pub run_name: String,
    /// Timestamp derived from the run-folder name.
    pub timestamp: String,
}

impl ResultFile {
    /// Parsed run time, if the timestamp follows the harness format
    /// (`2025-07-01T09-34-12.763860`).
    pub fn run_time(&self) -> Option<NaiveDateTime> {
        parse_run_time(&self.timestamp)
    }
}

pub fn parse_run_time(timestamp: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H-%M-%S%.f").ok()
}
