//! GK pipeline CLI
//!
//! Deterministic offline loader, trainer and evaluator for GK models.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gk_core::ArtifactLayout;
use gk_trainer::{train_from_csv, Dataset, Evaluator, DEFAULT_SEED};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "gk-train")]
#[command(author = "GK Prediction Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic trainer and evaluator for GK poverty-line models", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the wide table and write its long form
    Load {
        /// Wide CSV (provinsi + nilai.<JENIS>.<DAERAH>.<TAHUN>.<PERIODE> columns)
        #[arg(short, long)]
        input: PathBuf,

        /// Long-form output path
        #[arg(long, default_value = "data/raw/dataset.csv")]
        raw_output: PathBuf,
    },

    /// Fit every variant and persist models, held-out set and fit metrics
    Train {
        #[arg(short, long)]
        input: PathBuf,

        /// Artifacts root directory
        #[arg(short, long, default_value = ".")]
        artifacts: PathBuf,

        /// Seed for the split and every estimator
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: i64,
    },

    /// Score persisted models on the held-out set and pick the best
    Evaluate {
        #[arg(short, long, default_value = ".")]
        artifacts: PathBuf,
    },

    /// Load, train and evaluate in one go
    Run {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = ".")]
        artifacts: PathBuf,

        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: i64,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("GK Trainer v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Load { input, raw_output } => {
            let dataset = Dataset::from_csv(&input)
                .with_context(|| format!("Failed to load dataset from {}", input.display()))?;
            dataset
                .write_long_csv(&raw_output)
                .context("Failed to write long-form dataset")?;
            info!(rows = dataset.len(), output = %raw_output.display(), "load complete");
        }
        Command::Train {
            input,
            artifacts,
            seed,
        } => {
            let layout = ArtifactLayout::new(artifacts);
            let run = train_from_csv(&input, &layout, seed).context("Training failed")?;
            for trained in &run.models {
                info!(
                    variant = %trained.artifact.variant,
                    r2 = trained.fit_metrics.r2,
                    hash = %trained.artifact.metadata.model_hash,
                    "model written"
                );
            }
        }
        Command::Evaluate { artifacts } => {
            let report = Evaluator::new(ArtifactLayout::new(artifacts))
                .run()
                .context("Evaluation failed")?;
            info!(best = %report.best.variant, r2 = report.best.r2, "evaluation complete");
        }
        Command::Run {
            input,
            artifacts,
            seed,
        } => {
            let layout = ArtifactLayout::new(artifacts);
            let report = gk_trainer::run_pipeline(&input, &layout, seed).context("Pipeline failed")?;
            info!(best = %report.best.variant, r2 = report.best.r2, "pipeline complete");
        }
    }

    Ok(())
}
