//! Subset-by-subset aggregation with a single join point.
//!
//! [`aggregate_subset`] depends only on one subset's records, so subsets can
//! be processed independently. [`AggregateReport::from_subsets`] is the join:
//! macro and micro averages are computed there, once every subset is done.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use tally_core::error::{Result, TallyError};
use tally_core::record::EvaluationRecord;
use tally_core::source::RecordSource;

use crate::accuracy::model_accuracy;
use crate::averages::{macro_micro_averages, Averages};
use crate::correctness::analyze;

/// Names of the report artifacts, in write order.
pub const ARTIFACT_NAMES: [&str; 6] = [
    "all_evaluation_results",
    "all_evaluation_results_filtered",
    "all_correct_ids",
    "all_correct_ratios",
    "dataset_total",
    "dataset_total_filtered",
];

/// Everything computed for one subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsetAggregate {
    pub subset: String,
    pub correct_ratios: BTreeMap<String, f64>,
    /// Sorted ids of universally correct questions.
    pub all_correct_ids: Vec<String>,
    pub accuracy: BTreeMap<String, f64>,
    /// Accuracy with universally correct questions removed.
    pub accuracy_filtered: BTreeMap<String, f64>,
    /// Distinct questions.
    pub total_questions: usize,
    /// Questions not answered correctly by every model.
    pub hard_questions: usize,
    pub total_records: usize,
    pub filtered_records: usize,
}

pub fn aggregate_subset(subset: &str, records: &[EvaluationRecord]) -> SubsetAggregate {
    let correctness = analyze(records);
    let unfiltered = model_accuracy(records, None);
    let filtered = model_accuracy(records, Some(&correctness.universally_correct));

    SubsetAggregate {
        subset: subset.to_string(),
        correct_ratios: correctness.ratios(),
        all_correct_ids: correctness.universally_correct.iter().cloned().collect(),
        accuracy: unfiltered.accuracies,
        accuracy_filtered: filtered.accuracies,
        total_questions: correctness.total_questions(),
        hard_questions: correctness.hard_questions(),
        total_records: unfiltered.total_records,
        filtered_records: filtered.retained_records,
    }
}

/// Cross-subset report, for the unfiltered and the filtered view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateReport {
    pub all_evaluation_results: BTreeMap<String, BTreeMap<String, f64>>,
    pub all_evaluation_results_filtered: BTreeMap<String, BTreeMap<String, f64>>,
    pub averages: Averages,
    pub averages_filtered: Averages,
    pub all_correct_ids: BTreeMap<String, Vec<String>>,
    pub all_correct_ratios: BTreeMap<String, BTreeMap<String, f64>>,
    pub dataset_total: BTreeMap<String, usize>,
    pub dataset_total_filtered: BTreeMap<String, usize>,
    /// Subsets that could not be loaded, with the reason.
    pub failed_subsets: BTreeMap<String, String>,
}

impl AggregateReport {
    /// Join per-subset results and compute the averages.
    pub fn from_subsets(subsets: impl IntoIterator<Item = SubsetAggregate>) -> Self {
        let mut report = Self::default();
        for s in subsets {
            report.dataset_total.insert(s.subset.clone(), s.total_questions);
            report
                .dataset_total_filtered
                .insert(s.subset.clone(), s.hard_questions);
            report
                .all_evaluation_results
                .insert(s.subset.clone(), s.accuracy);
            report
                .all_evaluation_results_filtered
                .insert(s.subset.clone(), s.accuracy_filtered);
            report
                .all_correct_ids
                .insert(s.subset.clone(), s.all_correct_ids);
            report.all_correct_ratios.insert(s.subset, s.correct_ratios);
        }
        report.averages = macro_micro_averages(&report.all_evaluation_results, &report.dataset_total);
        report.averages_filtered = macro_micro_averages(
            &report.all_evaluation_results_filtered,
            &report.dataset_total_filtered,
        );
        report
    }

    pub fn subset_count(&self) -> usize {
        self.dataset_total.len()
    }

    /// The report as named JSON artifacts. Accuracy artifacts carry the
    /// averages under `macro_averages` and `micro_averages`.
    pub fn artifacts(&self) -> Result<BTreeMap<String, Value>> {
        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            ARTIFACT_NAMES[0].to_string(),
            with_averages(&self.all_evaluation_results, &self.averages)?,
        );
        artifacts.insert(
            ARTIFACT_NAMES[1].to_string(),
            with_averages(&self.all_evaluation_results_filtered, &self.averages_filtered)?,
        );
        artifacts.insert(ARTIFACT_NAMES[2].to_string(), serde_json::to_value(&self.all_correct_ids)?);
        artifacts.insert(ARTIFACT_NAMES[3].to_string(), serde_json::to_value(&self.all_correct_ratios)?);
        artifacts.insert(ARTIFACT_NAMES[4].to_string(), serde_json::to_value(&self.dataset_total)?);
        artifacts.insert(
            ARTIFACT_NAMES[5].to_string(),
            serde_json::to_value(&self.dataset_total_filtered)?,
        );
        Ok(artifacts)
    }
}

fn with_averages(
    per_subset: &BTreeMap<String, BTreeMap<String, f64>>,
    averages: &Averages,
) -> Result<Value> {
    let mut value = serde_json::to_value(per_subset)?;
    let Value::Object(map) = &mut value else {
        return Err(TallyError::Other("accuracy table is not a JSON object".into()));
    };
    for reserved in ["macro_averages", "micro_averages"] {
        if map.contains_key(reserved) {
            tracing::warn!(subset = reserved, "subset name collides with an average entry");
        }
    }
    map.insert(
        "macro_averages".into(),
        serde_json::to_value(&averages.macro_averages)?,
    );
    map.insert(
        "micro_averages".into(),
        serde_json::to_value(&averages.micro_averages)?,
    );
    Ok(value)
}

/// Load each subset in turn, aggregate it, then join.
///
/// A subset that fails to load (for example on a [`SchemaError`]) is logged
/// and left out. When no subset yields any record the result is
/// [`TallyError::NoFilesFound`].
///
/// [`SchemaError`]: tally_core::error::SchemaError
pub fn run_aggregation(source: &dyn RecordSource) -> Result<AggregateReport> {
    let subsets = source.subsets()?;
    tracing::info!(count = subsets.len(), subsets = ?subsets, "found subsets");

    let mut aggregates = Vec::with_capacity(subsets.len());
    let mut failed = BTreeMap::new();
    for subset in &subsets {
        tracing::info!(subset = %subset, "processing subset");
        let records = match source.load_subset(subset) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(subset = %subset, "skipping subset: {e}");
                failed.insert(subset.clone(), e.to_string());
                continue;
            }
        };
        if records.is_empty() {
            tracing::warn!(subset = %subset, "subset has no records");
            continue;
        }
        aggregates.push(aggregate_subset(subset, &records));
    }

    if aggregates.is_empty() {
        return Err(TallyError::NoFilesFound(source.origin()));
    }

    let mut report = AggregateReport::from_subsets(aggregates);
    report.failed_subsets = failed;
    Ok(report)
}
