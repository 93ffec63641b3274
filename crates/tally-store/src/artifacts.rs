use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use tally_core::error::TallyError;

use crate::error::Result;

/// Result of writing a set of named artifacts.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    pub written: Vec<PathBuf>,
    /// One [`TallyError::Write`] per artifact that could not be persisted.
    pub failed: Vec<TallyError>,
}

impl WriteOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Persist each named value as `<output_dir>/<name>.json`.
///
/// A failure on one artifact is recorded and the remaining artifacts are
/// still written.
pub fn write_json_artifacts<T: Serialize>(
    output_dir: &Path,
    artifacts: &BTreeMap<String, T>,
) -> WriteOutcome {
    let mut outcome = WriteOutcome::default();
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        tracing::warn!(dir = %output_dir.display(), "cannot create output directory: {e}");
    }

    for (name, value) in artifacts {
        let path = output_dir.join(format!("{name}.json"));
        match write_json(&path, value) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "wrote artifact");
                outcome.written.push(path);
            }
            Err(e) => {
                tracing::warn!(artifact = %name, "failed to write artifact: {e}");
                outcome.failed.push(TallyError::Write {
                    artifact: name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    outcome
}

/// Write a value as JSON with four-space indentation.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    std::fs::write(path, to_pretty_json(value)?)?;
    Ok(())
}

pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(buf)
}

/// Write a table as CSV, creating parent directories.
pub fn write_csv(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
