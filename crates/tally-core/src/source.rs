use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::Result;
use crate::record::EvaluationRecord;

/// Supplier of evaluation records, one subset at a time.
///
/// Implementations load a subset fully on request and hold nothing between
/// calls, which bounds memory to the largest single subset.
pub trait RecordSource {
    /// Names of the subsets available, in a stable order.
    fn subsets(&self) -> Result<Vec<String>>;

    /// Every record of one subset.
    fn load_subset(&self, subset: &str) -> Result<Vec<EvaluationRecord>>;

    /// Where the records come from, for diagnostics.
    fn origin(&self) -> PathBuf {
        PathBuf::from("<memory>")
    }
}

/// Records held in memory, keyed by subset name.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    subsets: BTreeMap<String, Vec<EvaluationRecord>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record to the subset named by its `subset_name`.
    pub fn push(&mut self, record: EvaluationRecord) -> &mut Self {
        self.subsets
            .entry(record.subset_name.clone())
            .or_default()
            .push(record);
        self
    }

    pub fn len(&self) -> usize {
        self.subsets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<EvaluationRecord> for InMemorySource {
    fn from_iter<I: IntoIterator<Item = EvaluationRecord>>(iter: I) -> Self {
        let mut source = Self::new();
        for record in iter {
            source.push(record);
        }
        source
    }
}

impl RecordSource for InMemorySource {
    fn subsets(&self) -> Result<Vec<String>> {
        Ok(self.subsets.keys().cloned().collect())
    }

    fn load_subset(&self, subset: &str) -> Result<Vec<EvaluationRecord>> {
        Ok(self.subsets.get(subset).cloned().unwrap_or_default())
    }
}
