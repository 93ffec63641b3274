use std::path::{Path, PathBuf};

use tally_core::config::LayoutSelector;
use tally_core::error::DiscoveryError;
use tally_core::group::run_timestamp;
use tally_core::record::{DirectoryLayout, ResultFile};

/// Extension of per-sample result files.
pub const RESULT_EXTENSION: &str = "parquet";

/// Files found by a scan, plus every entry that had to be skipped.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<ResultFile>,
    pub warnings: Vec<DiscoveryError>,
}

impl ScanOutcome {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Walks a results tree laid out as `root/model/run/*` or
/// `root/org/model/run/*` and resolves model name and run timestamp for
/// every result file.
pub struct DirectoryScanner {
    root: PathBuf,
    layout: LayoutSelector,
}

impl DirectoryScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            layout: LayoutSelector::Auto,
        }
    }

    pub fn with_layout(mut self, layout: LayoutSelector) -> Self {
        self.layout = layout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan the tree. Only an unreadable root is an error; anything below it
    /// that cannot be read is skipped and reported in [`ScanOutcome::warnings`].
    pub fn scan(&self) -> Result<ScanOutcome, DiscoveryError> {
        if !self.root.is_dir() {
            return Err(DiscoveryError::NotADirectory(self.root.clone()));
        }
        let mut outcome = ScanOutcome::default();
        let top_level = read_sorted(&self.root).map_err(|reason| DiscoveryError::Unreadable {
            path: self.root.clone(),
            reason,
        })?;

        for entry in top_level {
            if !entry.is_dir() {
                tracing::debug!(path = %entry.display(), "skipping non-directory entry");
                continue;
            }
            let Some(entry_name) = dir_name(&entry, &mut outcome.warnings) else {
                continue;
            };
            let layout = match self.layout.declared() {
                Some(layout) => layout,
                None => match probe_layout(&entry, &mut outcome.warnings) {
                    Some(layout) => layout,
                    None => continue,
                },
            };
            tracing::debug!(entry = %entry_name, ?layout, "classified top-level entry");

            match layout {
                DirectoryLayout::Flat => {
                    scan_model_dir(&entry, &entry_name, &mut outcome);
                }
                DirectoryLayout::Nested => {
                    for model_dir in subdirectories(&entry, &mut outcome.warnings) {
                        let Some(model_name) = dir_name(&model_dir, &mut outcome.warnings) else {
                            continue;
                        };
                        let full_name = format!("{entry_name}_{model_name}");
                        scan_model_dir(&model_dir, &full_name, &mut outcome);
                    }
                }
            }
        }

        for warning in &outcome.warnings {
            tracing::warn!("{warning}");
        }
        tracing::info!(
            root = %self.root.display(),
            files = outcome.files.len(),
            skipped = outcome.warnings.len(),
            "scan complete"
        );
        Ok(outcome)
    }
}

/// Decide whether `entry` is a model folder or an organization folder.
///
/// Subdirectories are examined in name order until one is informative: one
/// holding result files means `entry` is a model folder, one holding only
/// further directories means it is an organization folder.
fn probe_layout(entry: &Path, warnings: &mut Vec<DiscoveryError>) -> Option<DirectoryLayout> {
    let children = subdirectories(entry, warnings);
    if children.is_empty() {
        tracing::debug!(path = %entry.display(), "skipping empty directory");
        return None;
    }
    for child in &children {
        let contents = match read_sorted(child) {
            Ok(contents) => contents,
            Err(reason) => {
                warnings.push(DiscoveryError::Unreadable {
                    path: child.clone(),
                    reason,
                });
                continue;
            }
        };
        if contents.iter().any(|p| is_result_file(p)) {
            return Some(DirectoryLayout::Flat);
        }
        if contents.iter().any(|p| p.is_dir()) {
            return Some(DirectoryLayout::Nested);
        }
    }
    warnings.push(DiscoveryError::AmbiguousLayout(entry.to_path_buf()));
    None
}

fn scan_model_dir(model_dir: &Path, model_name: &str, outcome: &mut ScanOutcome) {
    for run_dir in subdirectories(model_dir, &mut outcome.warnings) {
        let Some(run_name) = dir_name(&run_dir, &mut outcome.warnings) else {
            continue;
        };
        let entries = match read_sorted(&run_dir) {
            Ok(entries) => entries,
            Err(reason) => {
                outcome.warnings.push(DiscoveryError::Unreadable {
                    path: run_dir.clone(),
                    reason,
                });
                continue;
            }
        };
        for path in entries.into_iter().filter(|p| is_result_file(p)) {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                outcome.warnings.push(DiscoveryError::Unreadable {
                    path: path.clone(),
                    reason: "file name is not valid UTF-8".into(),
                });
                continue;
            };
            outcome.files.push(ResultFile {
                eval_name: eval_name_from_file_name(file_name),
                model_name: model_name.to_string(),
                timestamp: run_timestamp(&run_name).to_string(),
                run_name: run_name.clone(),
                path,
            });
        }
    }
}

/// Evaluation name encoded in a result-file name.
///
/// `details_<suite>|<eval_name>|<shard>_<timestamp>.parquet` yields the text
/// between the first and second `|`. Without a `|`, an optional `details_`
/// prefix and the extension are removed and the trailing `_<timestamp>`
/// segment is dropped.
pub fn eval_name_from_file_name(file_name: &str) -> String {
    if let Some(eval_name) = file_name.split('|').nth(1) {
        return eval_name.to_string();
    }
    let stem = file_name
        .strip_suffix(&format!(".{RESULT_EXTENSION}"))
        .unwrap_or(file_name);
    let stem = stem.strip_prefix("details_").unwrap_or(stem);
    match stem.rsplit_once('_') {
        Some((name, _)) if !name.is_empty() => name.to_string(),
        _ => stem.to_string(),
    }
}

pub fn is_result_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == RESULT_EXTENSION)
}

fn read_sorted(dir: &Path) -> Result<Vec<PathBuf>, String> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| e.to_string())?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();
    Ok(entries)
}

fn subdirectories(dir: &Path, warnings: &mut Vec<DiscoveryError>) -> Vec<PathBuf> {
    match read_sorted(dir) {
        Ok(entries) => entries.into_iter().filter(|p| p.is_dir()).collect(),
        Err(reason) => {
            warnings.push(DiscoveryError::Unreadable {
                path: dir.to_path_buf(),
                reason,
            });
            Vec::new()
        }
    }
}

fn dir_name(path: &Path, warnings: &mut Vec<DiscoveryError>) -> Option<String> {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => Some(name.to_string()),
        None => {
            warnings.push(DiscoveryError::Unreadable {
                path: path.to_path_buf(),
                reason: "directory name is not valid UTF-8".into(),
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn eval_name_from_delimited_name() {
        assert_eq!(
            eval_name_from_file_name("details_community|task_a:sub|0_2025-01-01T00-00-00.parquet"),
            "task_a:sub"
        );
    }

    #[test]
    fn eval_name_fallback() {
        assert_eq!(eval_name_from_file_name("task_b_2025-01-01T00-00-00.parquet"), "task_b");
        assert_eq!(
            eval_name_from_file_name("details_mmlu_2025-01-01T00-00-00.763860.parquet"),
            "mmlu"
        );
        assert_eq!(eval_name_from_file_name("results.parquet"), "results");
    }

    #[test]
    fn scans_flat_layout() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("model-a/run_2025-01-01T00-00-00/details_x|ev1|0_t.parquet"));
        touch(&dir.path().join("model-a/run_2025-01-01T00-00-00/notes.txt"));
        touch(&dir.path().join("model-b/2025-02-01T00-00-00/details_x|ev2|0_t.parquet"));

        let outcome = DirectoryScanner::new(dir.path()).scan().unwrap();
        assert_eq!(outcome.files.len(), 2);
        assert!(outcome.warnings.is_empty());

        let a = &outcome.files[0];
        assert_eq!(a.model_name, "model-a");
        assert_eq!(a.eval_name, "ev1");
        assert_eq!(a.run_name, "run_2025-01-01T00-00-00");
        assert_eq!(a.timestamp, "2025-01-01T00-00-00");
        assert_eq!(outcome.files[1].model_name, "model-b");
    }

    #[test]
    fn scans_nested_layout() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("org/model-1/2025-01-01T00-00-00/details_x|ev|0_t.parquet"));
        touch(&dir.path().join("org/model-2/2025-01-01T00-00-00/details_x|ev|0_t.parquet"));

        let outcome = DirectoryScanner::new(dir.path()).scan().unwrap();
        let names: Vec<&str> = outcome.files.iter().map(|f| f.model_name.as_str()).collect();
        assert_eq!(names, vec!["org_model-1", "org_model-2"]);
    }

    #[test]
    fn mixed_layouts_in_one_root() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("flat-model/t1/details_x|ev|0_t.parquet"));
        touch(&dir.path().join("org/nested-model/t1/details_x|ev|0_t.parquet"));

        let outcome = DirectoryScanner::new(dir.path()).scan().unwrap();
        let names: Vec<&str> = outcome.files.iter().map(|f| f.model_name.as_str()).collect();
        assert_eq!(names, vec!["flat-model", "org_nested-model"]);
    }

    #[test]
    fn skips_files_and_empty_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("README.md"));
        fs::create_dir_all(dir.path().join("empty-model")).unwrap();
        touch(&dir.path().join("m/t/details_x|ev|0_t.parquet"));

        let outcome = DirectoryScanner::new(dir.path()).scan().unwrap();
        assert_eq!(outcome.files.len(), 1);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn probe_skips_empty_first_run_folder() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("m/a-empty-run")).unwrap();
        touch(&dir.path().join("m/b-run/details_x|ev|0_t.parquet"));

        let outcome = DirectoryScanner::new(dir.path()).scan().unwrap();
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].model_name, "m");
    }

    #[test]
    fn all_empty_subdirectories_is_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("m/run1")).unwrap();

        let outcome = DirectoryScanner::new(dir.path()).scan().unwrap();
        assert!(outcome.is_empty());
        assert!(matches!(outcome.warnings[0], DiscoveryError::AmbiguousLayout(_)));
    }

    #[test]
    fn declared_layout_overrides_probe() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("org/model/t/details_x|ev|0_t.parquet"));

        let outcome = DirectoryScanner::new(dir.path())
            .with_layout(LayoutSelector::Flat)
            .scan()
            .unwrap();
        // Treated as model "org" with run folder "model", which holds no files.
        assert!(outcome.is_empty());

        let outcome = DirectoryScanner::new(dir.path())
            .with_layout(LayoutSelector::Nested)
            .scan()
            .unwrap();
        assert_eq!(outcome.files[0].model_name, "org_model");
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectoryScanner::new(dir.path().join("nope")).scan().unwrap_err();
        assert!(matches!(err, DiscoveryError::NotADirectory(_)));
    }
}
