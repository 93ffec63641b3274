use std::collections::{BTreeMap, BTreeSet};

use tally_core::group::group_by;
use tally_core::record::EvaluationRecord;

/// Per-model mean accuracy over the retained records of one subset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccuracyTable {
    /// `model_name → mean(is_correct)`. Models with no retained record are
    /// absent, not zero.
    pub accuracies: BTreeMap<String, f64>,
    /// Records considered before exclusion.
    pub total_records: usize,
    /// Records left after exclusion.
    pub retained_records: usize,
}

/// Mean score per model, skipping records whose question is in `exclude`.
/// Means are capped at 1 when lenient ingestion lets scores above 1 through.
pub fn model_accuracy(
    records: &[EvaluationRecord],
    exclude: Option<&BTreeSet<String>>,
) -> AccuracyTable {
    let retained: Vec<&EvaluationRecord> = records
        .iter()
        .filter(|r| exclude.is_none_or(|ids| !ids.contains(&r.question_id)))
        .collect();
    if exclude.is_some() {
        tracing::info!(
            before = records.len(),
            after = retained.len(),
            "filtered universally correct questions"
        );
    }

    let accuracies = group_by(retained.iter().copied(), |r| r.model_name.as_str())
        .into_iter()
        .map(|(model, group)| {
            let sum: f64 = group.iter().map(|r| r.is_correct).sum();
            (model.to_string(), (sum / group.len() as f64).min(1.0))
        })
        .collect();

    AccuracyTable {
        accuracies,
        total_records: records.len(),
        retained_records: retained.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> Vec<EvaluationRecord> {
        vec![
            EvaluationRecord::new("1", "x", "S", 1.0),
            EvaluationRecord::new("1", "y", "S", 1.0),
            EvaluationRecord::new("2", "x", "S", 1.0),
            EvaluationRecord::new("2", "y", "S", 0.0),
        ]
    }

    #[test]
    fn unfiltered_accuracy() {
        let table = model_accuracy(&scenario(), None);
        assert_eq!(table.accuracies["x"], 1.0);
        assert_eq!(table.accuracies["y"], 0.5);
        assert_eq!(table.retained_records, 4);
    }

    #[test]
    fn filtered_accuracy() {
        let exclude: BTreeSet<String> = ["1".to_string()].into_iter().collect();
        let table = model_accuracy(&scenario(), Some(&exclude));
        assert_eq!(table.accuracies["x"], 1.0);
        assert_eq!(table.accuracies["y"], 0.0);
        assert_eq!(table.total_records, 4);
        assert_eq!(table.retained_records, 2);
    }

    #[test]
    fn model_with_nothing_left_is_omitted() {
        let records = vec![
            EvaluationRecord::new("1", "x", "S", 1.0),
            EvaluationRecord::new("2", "y", "S", 0.0),
        ];
        let exclude: BTreeSet<String> = ["1".to_string()].into_iter().collect();
        let table = model_accuracy(&records, Some(&exclude));
        assert!(!table.accuracies.contains_key("x"));
        assert_eq!(table.accuracies["y"], 0.0);
    }

    #[test]
    fn scores_above_one_cap_the_mean() {
        let records = vec![
            EvaluationRecord::new("q1", "x", "S", 1.5),
            EvaluationRecord::new("q2", "x", "S", 1.0),
            EvaluationRecord::new("q1", "y", "S", 1.5),
            EvaluationRecord::new("q2", "y", "S", 0.0),
        ];
        let table = model_accuracy(&records, None);
        assert_eq!(table.accuracies["x"], 1.0);
        assert_eq!(table.accuracies["y"], 0.75);
    }

    #[test]
    fn empty_exclusion_keeps_everything() {
        let table = model_accuracy(&scenario(), Some(&BTreeSet::new()));
        assert_eq!(table.retained_records, 4);
        assert_eq!(table.accuracies, model_accuracy(&scenario(), None).accuracies);
    }
}
