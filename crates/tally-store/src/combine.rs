use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use tally_core::config::LayoutSelector;
use tally_core::error::{Result, TallyError};
use tally_core::group::files_by_eval;
use tally_core::record::ResultFile;

use crate::error::StoreError;
use crate::reader::read_batches;
use crate::scan::DirectoryScanner;
use crate::writer::{annotate_batch, combined_path, write_batches, RowMetadata};

/// What a combine pass produced.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CombineSummary {
    /// Evaluation names found, sorted.
    pub evaluations: Vec<String>,
    /// Artifacts written, one per (evaluation, model).
    pub written: Vec<PathBuf>,
    /// Artifacts that could not be produced, with the reason.
    pub failed: Vec<(PathBuf, String)>,
    /// Directory entries skipped during discovery.
    pub skipped_entries: usize,
}

/// Reorganize a results tree into `output_dir/<eval>/<model>.parquet`.
///
/// Discovered files are grouped by evaluation name first, then each group is
/// read, stamped with `model_name`, `eval_name`, and `timestamp`, and written
/// before the next group is touched. When a model has several runs of one
/// evaluation only the latest run is kept; its shards are concatenated.
pub fn combine(root: &Path, output_dir: &Path, layout: LayoutSelector) -> Result<CombineSummary> {
    let outcome = DirectoryScanner::new(root).with_layout(layout).scan()?;
    if outcome.is_empty() {
        if outcome.warnings.is_empty() {
            return Err(TallyError::NoFilesFound(root.to_path_buf()));
        }
        return Err(TallyError::DetectionFailed {
            root: root.to_path_buf(),
            warnings: outcome.warnings,
        });
    }
    std::fs::create_dir_all(output_dir)?;

    let groups = files_by_eval(outcome.files);
    let mut summary = CombineSummary {
        evaluations: groups.keys().cloned().collect(),
        skipped_entries: outcome.warnings.len(),
        ..Default::default()
    };
    tracing::info!(count = summary.evaluations.len(), evaluations = ?summary.evaluations, "found evaluation types");

    for (eval_name, files) in groups {
        for (model_name, run_files) in latest_runs(files) {
            let path = combined_path(output_dir, &eval_name, &model_name);
            match combine_model(&run_files, &eval_name, &path) {
                Ok(rows) => {
                    tracing::debug!(path = %path.display(), rows, "wrote combined artifact");
                    summary.written.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "failed to combine {eval_name} for {model_name}: {e}");
                    summary.failed.push((path, e.to_string()));
                }
            }
        }
    }

    tracing::info!(
        output = %output_dir.display(),
        written = summary.written.len(),
        failed = summary.failed.len(),
        "combine complete"
    );
    Ok(summary)
}

/// Per model, the files of its most recent run.
fn latest_runs(files: Vec<ResultFile>) -> BTreeMap<String, Vec<ResultFile>> {
    let mut by_model: BTreeMap<String, Vec<ResultFile>> = BTreeMap::new();
    for file in files {
        by_model.entry(file.model_name.clone()).or_default().push(file);
    }

    by_model
        .into_iter()
        .filter_map(|(model, files)| {
            let latest = files
                .iter()
                .max_by_key(|f| (f.run_time(), f.timestamp.clone()))?
                .run_name
                .clone();
            let (kept, superseded): (Vec<_>, Vec<_>) =
                files.into_iter().partition(|f| f.run_name == latest);
            for old in &superseded {
                tracing::info!(model = %model, run = %old.run_name, kept = %latest, "superseded run ignored");
            }
            Some((model, kept))
        })
        .collect()
}

fn combine_model(files: &[ResultFile], eval_name: &str, path: &Path) -> crate::error::Result<usize> {
    let mut batches = Vec::new();
    for file in files {
        let meta = RowMetadata {
            model_name: file.model_name.clone(),
            eval_name: eval_name.to_string(),
            timestamp: file.timestamp.clone(),
        };
        for batch in read_batches(&file.path)? {
            batches.push(annotate_batch(&batch, &meta)?);
        }
    }
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    if rows == 0 {
        return Err(StoreError::Empty(path.to_path_buf()));
    }
    write_batches(&batches, path)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(model: &str, run: &str) -> ResultFile {
        ResultFile {
            path: PathBuf::from(format!("{model}/{run}/f.parquet")),
            model_name: model.into(),
            eval_name: "ev".into(),
            run_name: run.into(),
            timestamp: tally_core::group::run_timestamp(run).into(),
        }
    }

    #[test]
    fn latest_run_wins() {
        let runs = latest_runs(vec![
            file("m", "2025-07-01T09-34-12.1"),
            file("m", "2025-07-02T00-00-00.0"),
            file("m", "2025-07-02T00-00-00.0"),
            file("n", "2025-01-01T00-00-00"),
        ]);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs["m"].len(), 2);
        assert!(runs["m"].iter().all(|f| f.run_name == "2025-07-02T00-00-00.0"));
        assert_eq!(runs["n"].len(), 1);
    }

    #[test]
    fn unparseable_timestamps_fall_back_to_text_order() {
        let runs = latest_runs(vec![file("m", "run-a"), file("m", "run-b")]);
        assert_eq!(runs["m"][0].run_name, "run-b");
    }

    #[test]
    fn empty_tree_reports_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = combine(dir.path(), &dir.path().join("out"), LayoutSelector::Auto).unwrap_err();
        assert!(matches!(err, TallyError::NoFilesFound(_)));
    }

    #[test]
    fn tree_of_only_skipped_entries_reports_detection_failure() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("r");
        std::fs::create_dir_all(root.join("m").join("run1")).unwrap();

        let err = combine(&root, &dir.path().join("out"), LayoutSelector::Auto).unwrap_err();
        match err {
            TallyError::DetectionFailed { root: failed_root, warnings } => {
                assert_eq!(failed_root, root);
                assert!(matches!(
                    warnings.as_slice(),
                    [tally_core::error::DiscoveryError::AmbiguousLayout(_)]
                ));
            }
            other => panic!("expected a detection failure, got {other:?}"),
        }
    }
}
