//! Keyed partitioning of records and result files.
//!
//! Groups are returned in `BTreeMap`s so iteration order, and therefore every
//! report derived from it, is stable across runs.

use std::collections::BTreeMap;

use crate::record::{EvaluationRecord, ResultFile};

/// Partition `items` by `key`. Every item lands in exactly one group.
pub fn group_by<'a, T, K, F>(items: impl IntoIterator<Item = &'a T>, mut key: F) -> BTreeMap<K, Vec<&'a T>>
where
    T: 'a,
    K: Ord,
    F: FnMut(&'a T) -> K,
{
    let mut groups: BTreeMap<K, Vec<&'a T>> = BTreeMap::new();
    for item in items {
        groups.entry(key(item)).or_default().push(item);
    }
    groups
}

pub fn by_question(records: &[EvaluationRecord]) -> BTreeMap<&str, Vec<&EvaluationRecord>> {
    group_by(records, |r| r.question_id.as_str())
}

pub fn by_model(records: &[EvaluationRecord]) -> BTreeMap<&str, Vec<&EvaluationRecord>> {
    group_by(records, |r| r.model_name.as_str())
}

/// Partition discovered files by evaluation name without opening them.
pub fn files_by_eval(files: impl IntoIterator<Item = ResultFile>) -> BTreeMap<String, Vec<ResultFile>> {
    let mut groups: BTreeMap<String, Vec<ResultFile>> = BTreeMap::new();
    for file in files {
        groups.entry(file.eval_name.clone()).or_default().push(file);
    }
    groups
}

/// Timestamp part of a run-folder name: the last `_`-delimited segment, or
/// the whole name when there is no `_`.
pub fn run_timestamp(run_name: &str) -> &str {
    run_name
        .rsplit_once('_')
        .map_or(run_name, |(_, timestamp)| timestamp)
}
