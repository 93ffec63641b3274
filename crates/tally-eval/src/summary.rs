//! Per-document summaries of harness result files.
//!
//! A harness results document looks like
//!
//! ```json
//! {
//!   "config_general": { "model_name": "org/model" },
//!   "results": { "community|suite:task|0": { "acc_norm": 0.71 } },
//!   "config_tasks": { "community|suite:task": { "effective_num_docs": 120 } }
//! }
//! ```
//!
//! and becomes one row: file name, model name, document-weighted macro
//! accuracy, and one column per task.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use walkdir::WalkDir;

use tally_core::error::{Result, TallyError};
use tally_store::artifacts::write_csv;

/// Model name used when a document does not carry one.
pub const UNKNOWN_MODEL: &str = "N/A";

/// One row of the summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub file_name: String,
    pub model_name: String,
    pub macro_accuracy: f64,
    /// `task_name → acc_norm`.
    pub tasks: BTreeMap<String, f64>,
}

/// Score of one task, with its document count when the config has one.
#[derive(Debug, Clone, PartialEq)]
struct TaskScore {
    acc_norm: f64,
    num_docs: Option<f64>,
}

/// Document-weighted mean over tasks that carry a document count.
fn weighted_accuracy<'a>(scores: impl IntoIterator<Item = &'a TaskScore>) -> f64 {
    let (weighted, docs) = scores
        .into_iter()
        .filter_map(|s| s.num_docs.map(|n| (s.acc_norm * n, n)))
        .fold((0.0, 0.0), |(w, d), (sw, sd)| (w + sw, d + sd));
    if docs > 0.0 { weighted / docs } else { 0.0 }
}

/// `suite:task|shard` → `task`: the text after the first `:` up to the next
/// `:` or `|`. Keys without `:` are used as they are.
pub fn task_name(task_key: &str) -> &str {
    match task_key.split_once(':') {
        Some((_, rest)) => rest.split([':', '|']).next().unwrap_or(rest),
        None => task_key,
    }
}

/// The `config_tasks` key for a results key: everything before the last `|`.
pub fn task_config_key(task_key: &str) -> &str {
    task_key.rsplit_once('|').map_or(task_key, |(key, _)| key)
}

/// Build the summary row of one results document.
pub fn extract_summary(doc: &Value, file_name: &str) -> SummaryRow {
    let model_name = doc
        .pointer("/config_general/model_name")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_MODEL)
        .to_string();

    let mut scores: BTreeMap<String, TaskScore> = BTreeMap::new();
    if let Some(results) = doc.get("results").and_then(Value::as_object) {
        for (task_key, result) in results {
            if task_key.contains("_average") || task_key == "all" {
                continue;
            }
            let Some(acc_norm) = result.get("acc_norm").and_then(Value::as_f64) else {
                continue;
            };
            let num_docs = doc
                .get("config_tasks")
                .and_then(|tasks| tasks.get(task_config_key(task_key)))
                .and_then(|config| config.get("effective_num_docs"))
                .and_then(Value::as_f64);
            scores.insert(task_name(task_key).to_string(), TaskScore { acc_norm, num_docs });
        }
    }

    SummaryRow {
        file_name: file_name.to_string(),
        model_name,
        macro_accuracy: weighted_accuracy(scores.values()),
        tasks: scores.into_iter().map(|(name, s)| (name, s.acc_norm)).collect(),
    }
}

pub fn read_summary(path: &Path) -> Result<SummaryRow> {
    let data = std::fs::read_to_string(path)?;
    let doc: Value = serde_json::from_str(&data)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(extract_summary(&doc, &file_name))
}

/// Summaries of every `*.json` file under `folder`, in path order.
/// Unreadable documents are skipped with a warning.
pub fn collect_summaries(folder: &Path) -> Result<Vec<SummaryRow>> {
    let files: Vec<PathBuf> = WalkDir::new(folder)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    if files.is_empty() {
        return Err(TallyError::NoFilesFound(folder.to_path_buf()));
    }

    let mut rows = Vec::with_capacity(files.len());
    for path in &files {
        match read_summary(path) {
            Ok(row) => rows.push(row),
            Err(e) => tracing::warn!(path = %path.display(), "skipping results document: {e}"),
        }
    }
    tracing::info!(documents = files.len(), rows = rows.len(), "collected summaries");
    Ok(rows)
}

/// Header and cells of the summary table. Task columns are sorted; a task
/// missing from a row is an empty cell.
pub fn summary_table(rows: &[SummaryRow]) -> (Vec<String>, Vec<Vec<String>>) {
    let tasks: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.tasks.keys().map(String::as_str))
        .collect();

    let mut header = vec![
        "file_name".to_string(),
        "model_name".to_string(),
        "macro_accuracy".to_string(),
    ];
    header.extend(tasks.iter().map(|t| t.to_string()));

    let cells = rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                row.file_name.clone(),
                row.model_name.clone(),
                row.macro_accuracy.to_string(),
            ];
            cells.extend(
                tasks
                    .iter()
                    .map(|t| row.tasks.get(*t).map(f64::to_string).unwrap_or_default()),
            );
            cells
        })
        .collect();
    (header, cells)
}

pub fn write_summary_csv(rows: &[SummaryRow], path: &Path) -> Result<()> {
    let (header, cells) = summary_table(rows);
    write_csv(path, &header, &cells)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "config_general": {"model_name": "org/model"},
            "results": {
                "community|cyber:roadmap|0": {"acc_norm": 1.0},
                "community|cyber:threats|0": {"acc_norm": 0.5},
                "community|cyber:nodocs|0": {"acc_norm": 0.0},
                "community|cyber:_average|0": {"acc_norm": 0.9},
                "all": {"acc_norm": 0.75}
            },
            "config_tasks": {
                "community|cyber:roadmap": {"effective_num_docs": 10},
                "community|cyber:threats": {"effective_num_docs": 30},
                "community|cyber:nodocs": {}
            }
        })
    }

    #[test]
    fn task_names() {
        assert_eq!(task_name("community|cyber:roadmap|0"), "roadmap");
        assert_eq!(task_name("plain_task"), "plain_task");
        assert_eq!(task_name("suite:task"), "task");
        assert_eq!(task_name("suite|a:b:c|0"), "b");
        assert_eq!(task_config_key("community|cyber:roadmap|0"), "community|cyber:roadmap");
        assert_eq!(task_config_key("plain"), "plain");
    }

    #[test]
    fn extracts_weighted_macro_accuracy() {
        let row = extract_summary(&doc(), "results.json");
        assert_eq!(row.model_name, "org/model");
        assert_eq!(row.tasks.len(), 3);
        assert_eq!(row.tasks["roadmap"], 1.0);
        assert!(!row.tasks.contains_key("_average"));
        // (1.0 * 10 + 0.5 * 30) / 40; the task without a doc count is left out.
        assert!((row.macro_accuracy - 0.625).abs() < 1e-12);
    }

    #[test]
    fn missing_sections_default() {
        let row = extract_summary(&json!({}), "empty.json");
        assert_eq!(row.model_name, UNKNOWN_MODEL);
        assert!(row.tasks.is_empty());
        assert_eq!(row.macro_accuracy, 0.0);
    }

    #[test]
    fn table_fills_missing_tasks() {
        let a = extract_summary(&doc(), "a.json");
        let b = SummaryRow {
            file_name: "b.json".into(),
            model_name: "other".into(),
            macro_accuracy: 0.5,
            tasks: [("extra".to_string(), 0.5)].into_iter().collect(),
        };
        let (header, cells) = summary_table(&[a, b]);
        assert_eq!(
            header,
            vec!["file_name", "model_name", "macro_accuracy", "extra", "nodocs", "roadmap", "threats"]
        );
        assert_eq!(cells[0][3], "");
        assert_eq!(cells[0][5], "1");
        assert_eq!(cells[1][3], "0.5");
        assert_eq!(cells[1][6], "");
    }

    #[test]
    fn collects_recursively_and_skips_bad_documents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("org").join("model");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("results_1.json"), doc().to_string()).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let rows = collect_summaries(dir.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].file_name, "results_1.json");
    }

    #[test]
    fn empty_folder_reports_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_summaries(dir.path()).unwrap_err();
        assert!(matches!(err, TallyError::NoFilesFound(_)));
    }

    #[test]
    fn writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined_results.csv");
        write_summary_csv(&[extract_summary(&doc(), "r.json")], &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "file_name,model_name,macro_accuracy,nodocs,roadmap,threats"
        );
        assert_eq!(lines.next().unwrap(), "r.json,org/model,0.625,0,1,0.5");
    }
}
