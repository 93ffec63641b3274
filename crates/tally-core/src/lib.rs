pub mod config;
pub mod error;
pub mod group;
pub mod record;
pub mod source;

pub mod prelude {
    pub use crate::config::{AggregateConfig, CorrectnessPolicy, LayoutSelector, RecordSchema};
    pub use crate::error::{DiscoveryError, Result, SchemaError, TallyError};
    pub use crate::group::{by_model, by_question, files_by_eval, group_by, run_timestamp};
    pub use crate::record::{DirectoryLayout, EvaluationRecord, ResultFile};
    pub use crate::source::{InMemorySource, RecordSource};
}
