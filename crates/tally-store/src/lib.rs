pub mod artifacts;
pub mod combine;
pub mod error;
pub mod reader;
pub mod scan;
pub mod source;
pub mod writer;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::artifacts::{write_csv, write_json_artifacts, WriteOutcome};
    pub use crate::combine::{combine, CombineSummary};
    pub use crate::error::StoreError;
    pub use crate::reader::{read_batches, read_records};
    pub use crate::scan::{eval_name_from_file_name, DirectoryScanner, ScanOutcome};
    pub use crate::source::DirectorySource;
    pub use crate::writer::{annotate_batch, safe_eval_name, write_batches, RowMetadata};
}
