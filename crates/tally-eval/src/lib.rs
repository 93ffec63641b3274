pub mod accuracy;
pub mod averages;
pub mod correctness;
pub mod pipeline;
pub mod summary;

pub mod prelude {
    pub use crate::accuracy::{model_accuracy, AccuracyTable};
    pub use crate::averages::{macro_micro_averages, Averages};
    pub use crate::correctness::{analyze, CorrectnessReport, QuestionProfile};
    pub use crate::pipeline::{
        aggregate_subset, run_aggregation, AggregateReport, SubsetAggregate, ARTIFACT_NAMES,
    };
    pub use crate::summary::{collect_summaries, extract_summary, write_summary_csv, SummaryRow};
}
