//! `tally`: combine, aggregate, and summarize evaluation results.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_core::config::{AggregateConfig, CorrectnessPolicy, LayoutSelector};
use tally_core::error::{Result, TallyError};
use tally_eval::pipeline::run_aggregation;
use tally_eval::summary::{collect_summaries, write_summary_csv};
use tally_store::artifacts::write_json_artifacts;
use tally_store::combine::combine;
use tally_store::source::DirectorySource;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Aggregate per-question evaluation results across models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reorganize a results tree into one file per evaluation and model
    Combine {
        /// Root of the results tree
        folder: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "results/combined_details")]
        output: PathBuf,

        /// Directory layout of the results tree [default: auto]
        #[arg(long, value_enum)]
        layout: Option<LayoutArg>,

        /// YAML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compute correctness ratios, accuracies, and averages for a dataset
    Aggregate {
        /// Dataset directory with one subdirectory per subset
        dataset_dir: PathBuf,

        /// Output directory [default: <DATASET_DIR>/evaluation_results]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// YAML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Reject scores outside [0, 1]
        #[arg(long)]
        strict_scores: bool,
    },

    /// Summarize harness result documents into one CSV table
    Summarize {
        /// Folder searched recursively for JSON result documents
        folder: PathBuf,

        /// Output CSV file
        #[arg(short, long, default_value = "combined_results.csv")]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    Auto,
    Flat,
    Nested,
}

impl From<LayoutArg> for LayoutSelector {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Auto => LayoutSelector::Auto,
            LayoutArg::Flat => LayoutSelector::Flat,
            LayoutArg::Nested => LayoutSelector::Nested,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Combine {
            folder,
            output,
            layout,
            config,
        } => load_config(config.as_deref()).and_then(|config| {
            let layout = layout.map_or(config.layout, LayoutSelector::from);
            cmd_combine(&folder, &output, layout)
        }),
        Commands::Aggregate {
            dataset_dir,
            output,
            config,
            strict_scores,
        } => cmd_aggregate(&dataset_dir, output, config.as_deref(), strict_scores),
        Commands::Summarize { folder, output } => cmd_summarize(&folder, &output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(TallyError::NoFilesFound(path)) => {
            eprintln!("No files found under {}", path.display());
            ExitCode::FAILURE
        }
        Err(TallyError::DetectionFailed { root, warnings }) => {
            eprintln!(
                "Could not discover result files under {}; every entry was skipped:",
                root.display()
            );
            for warning in &warnings {
                eprintln!("  {warning}");
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AggregateConfig> {
    match path {
        Some(path) => AggregateConfig::from_yaml_file(path),
        None => Ok(AggregateConfig::default()),
    }
}

fn cmd_combine(folder: &Path, output: &Path, layout: LayoutSelector) -> Result<()> {
    let summary = combine(folder, output, layout)?;
    println!(
        "Combined {} evaluation(s) into {} file(s) under {}",
        summary.evaluations.len(),
        summary.written.len(),
        output.display()
    );
    if summary.skipped_entries > 0 {
        println!("Skipped {} entr(ies) during discovery", summary.skipped_entries);
    }
    for (path, reason) in &summary.failed {
        eprintln!("  failed {}: {reason}", path.display());
    }
    if summary.written.is_empty() {
        return Err(TallyError::Other("no combined file could be written".into()));
    }
    Ok(())
}

fn cmd_aggregate(
    dataset_dir: &Path,
    output: Option<PathBuf>,
    config: Option<&Path>,
    strict_scores: bool,
) -> Result<()> {
    let mut config = load_config(config)?;
    if strict_scores {
        config = config.with_correctness(CorrectnessPolicy::Strict);
    }
    let output = output.unwrap_or_else(|| dataset_dir.join(&config.report_dir_name));

    let source = DirectorySource::new(dataset_dir, config);
    let report = run_aggregation(&source)?;
    let outcome = write_json_artifacts(&output, &report.artifacts()?);

    println!(
        "Aggregated {} subset(s); wrote {} artifact(s) to {}",
        report.subset_count(),
        outcome.written.len(),
        output.display()
    );
    for (subset, reason) in &report.failed_subsets {
        eprintln!("  skipped subset {subset}: {reason}");
    }
    for e in &outcome.failed {
        eprintln!("  {e}");
    }
    if !outcome.is_complete() {
        return Err(TallyError::Other(format!(
            "{} artifact(s) could not be written",
            outcome.failed.len()
        )));
    }
    Ok(())
}

fn cmd_summarize(folder: &Path, output: &Path) -> Result<()> {
    let rows = collect_summaries(folder)?;
    write_summary_csv(&rows, output)?;
    println!("Wrote {} row(s) to {}", rows.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_aggregate_flags() {
        let cli = Cli::try_parse_from([
            "tally",
            "aggregate",
            "data/cyber",
            "--strict-scores",
            "--config",
            "tally.yaml",
        ])
        .unwrap();
        match cli.command {
            Commands::Aggregate {
                dataset_dir,
                output,
                config,
                strict_scores,
            } => {
                assert_eq!(dataset_dir, PathBuf::from("data/cyber"));
                assert!(output.is_none());
                assert_eq!(config, Some(PathBuf::from("tally.yaml")));
                assert!(strict_scores);
            }
            _ => panic!("expected aggregate"),
        }
    }

    #[test]
    fn combine_defaults() {
        let cli = Cli::try_parse_from(["tally", "combine", "results", "--layout", "nested"]).unwrap();
        match cli.command {
            Commands::Combine { output, layout, .. } => {
                assert_eq!(output, PathBuf::from("results/combined_details"));
                assert_eq!(layout.map(LayoutSelector::from), Some(LayoutSelector::Nested));
            }
            _ => panic!("expected combine"),
        }
    }

    #[test]
    fn summarize_empty_folder_is_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_summarize(dir.path(), &dir.path().join("out.csv")).unwrap_err();
        assert!(matches!(err, TallyError::NoFilesFound(_)));
    }
}
