//! GK Trainer - deterministic offline pipeline
//!
//! Loads the wide GK table, encodes it, fits the three model variants on a
//! seeded split and evaluates them against the shared held-out set.

pub mod cart;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod evaluation;
pub mod forest;
pub mod split;
pub mod trainer;

use gk_core::{encode, ArtifactLayout};
use std::path::Path;
use tracing::info;

pub use dataset::{Dataset, ID_COLUMN, LONG_COLUMNS};
pub use deterministic::{LcgRng, SplitTieBreaker};
pub use errors::{Result, TrainerError};
pub use evaluation::{evaluate_models, EvaluationReport, Evaluator};
pub use forest::{fit_forest, ForestConfig};
pub use split::{train_test_split, SplitIndices};
pub use trainer::{EstimatorConfig, Trainer, TrainedModel, TrainingRun, VariantConfig, DEFAULT_SEED};

/// Load, encode and train from a wide CSV, persisting the training artifacts.
pub fn train_from_csv(input: &Path, layout: &ArtifactLayout, seed: i64) -> Result<TrainingRun> {
    let dataset = Dataset::from_csv(input)?;
    dataset.write_long_csv(layout.raw_dataset_path())?;

    let table = encode(dataset.observations())?;
    let run = Trainer::new(seed).train(&table)?;
    run.persist(layout)?;
    Ok(run)
}

/// Full pipeline: load, train, evaluate.
pub fn run_pipeline(input: &Path, layout: &ArtifactLayout, seed: i64) -> Result<EvaluationReport> {
    let run = train_from_csv(input, layout, seed)?;
    info!(models = run.models.len(), "training finished; evaluating");
    Evaluator::new(layout.clone()).run()
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
