use std::path::{Path, PathBuf};

use tally_core::config::AggregateConfig;
use tally_core::error::{DiscoveryError, Result, TallyError};
use tally_core::record::EvaluationRecord;
use tally_core::source::RecordSource;

use crate::reader::{read_records, RECORD_EXTENSIONS};

/// Reads subsets from a directory where each subdirectory is one subset
/// holding one record file per model (the layout written by
/// [`combine`](crate::combine::combine)).
pub struct DirectorySource {
    root: PathBuf,
    config: AggregateConfig,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, config: AggregateConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_files(&self, subset_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(subset_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| RECORD_EXTENSIONS.contains(&e))
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

impl RecordSource for DirectorySource {
    fn subsets(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(DiscoveryError::NotADirectory(self.root.clone()).into());
        }
        let mut subsets = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(root = %self.root.display(), "skipping unreadable entry: {e}");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match path.file_name().and_then(|n| n.to_str()) {
                Some(name) if name == self.config.report_dir_name => {}
                Some(name) => subsets.push(name.to_string()),
                None => tracing::warn!(path = %path.display(), "skipping non UTF-8 subset name"),
            }
        }
        subsets.sort();
        Ok(subsets)
    }

    fn load_subset(&self, subset: &str) -> Result<Vec<EvaluationRecord>> {
        let subset_dir = self.root.join(subset);
        let mut records = Vec::new();
        for file in self.record_files(&subset_dir)? {
            let batch = read_records(
                &file,
                subset,
                &self.config.schema,
                self.config.correctness,
            )
            .map_err(TallyError::from)?;
            tracing::debug!(file = %file.display(), rows = batch.len(), "loaded records");
            records.extend(batch);
        }
        Ok(records)
    }

    fn origin(&self) -> PathBuf {
        self.root.clone()
    }
}
