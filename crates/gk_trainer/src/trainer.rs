//! Model training for the three fixed variants
//!
//! Splits the encoded table once, fits every variant on the same training
//! rows, scores it on the test rows and hands back artifacts ready to
//! persist.

use gk_core::{
    ArtifactLayout, EncodedTable, FitMetrics, LinearModel, MetricsReport, ModelArtifact,
    ModelKind, ModelVariant, RegressionMetrics,
};
use linfa::traits::Fit;
use linfa_linear::LinearRegression;
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::info;

use crate::errors::{Result, TrainerError};
use crate::forest::{fit_forest, ForestConfig};
use crate::split::train_test_split;

/// Seed shared by the split and every estimator
pub const DEFAULT_SEED: i64 = 42;

/// Estimator family and its hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "estimator", rename_all = "snake_case")]
pub enum EstimatorConfig {
    LinearRegression,
    RandomForest(ForestConfig),
}

/// One named training configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    pub variant: ModelVariant,
    pub estimator: EstimatorConfig,
}

impl VariantConfig {
    pub fn for_variant(variant: ModelVariant, seed: i64) -> Self {
        let estimator = match variant {
            ModelVariant::Default => EstimatorConfig::LinearRegression,
            ModelVariant::Custom => EstimatorConfig::RandomForest(ForestConfig {
                n_estimators: 100,
                max_depth: Some(10),
                min_samples_split: 2,
                min_samples_leaf: 1,
                seed,
            }),
            ModelVariant::Tuned => EstimatorConfig::RandomForest(ForestConfig {
                n_estimators: 200,
                max_depth: Some(15),
                min_samples_split: 5,
                min_samples_leaf: 2,
                seed,
            }),
        };
        Self { variant, estimator }
    }

    /// All three variants in `default`, `custom`, `tuned` order
    pub fn all(seed: i64) -> Vec<Self> {
        ModelVariant::ALL
            .iter()
            .map(|&variant| Self::for_variant(variant, seed))
            .collect()
    }
}

/// A fitted variant with its test-split fit quality
#[derive(Clone, Debug)]
pub struct TrainedModel {
    pub artifact: ModelArtifact,
    pub fit_metrics: FitMetrics,
}

/// Output of one training run
#[derive(Clone, Debug)]
pub struct TrainingRun {
    pub models: Vec<TrainedModel>,
    /// Test split, persisted as the shared held-out set
    pub holdout: EncodedTable,
    pub training_rows: usize,
}

/// Trainer for the fixed variant set
pub struct Trainer {
    configs: Vec<VariantConfig>,
    seed: i64,
}

impl Trainer {
    pub fn new(seed: i64) -> Self {
        Self {
            configs: VariantConfig::all(seed),
            seed,
        }
    }

    pub fn with_configs(configs: Vec<VariantConfig>, seed: i64) -> Self {
        Self { configs, seed }
    }

    pub fn configs(&self) -> &[VariantConfig] {
        &self.configs
    }

    /// Split `table`, then fit and score every configured variant
    pub fn train(&self, table: &EncodedTable) -> Result<TrainingRun> {
        let split = train_test_split(table.n_rows(), self.seed)?;
        let train = table.select_rows(&split.train);
        // Imputed targets train the models but are never scored
        let holdout = table.select_rows(&split.test).with_observed_targets();
        let observed: Vec<usize> = holdout
            .targets()
            .iter()
            .enumerate()
            .filter(|(_, y)| !y.is_nan())
            .map(|(i, _)| i)
            .collect();
        if observed.is_empty() {
            return Err(TrainerError::Training(
                "test split has no rows with an observed target".into(),
            ));
        }
        let test = holdout.select_rows(&observed);

        info!(
            seed = self.seed,
            train_rows = train.n_rows(),
            test_rows = holdout.n_rows(),
            scored_rows = test.n_rows(),
            features = ?table.feature_names(),
            "split encoded table"
        );

        let mut models = Vec::with_capacity(self.configs.len());
        for config in &self.configs {
            info!(variant = %config.variant, params = ?config.estimator, "training variant");

            let model = fit_estimator(&config.estimator, train.features().view(), train.targets().view())?;
            let artifact = ModelArtifact::new(
                config.variant,
                table.feature_names().to_vec(),
                model,
                train.n_rows(),
            )?;

            let predictions = artifact.predict(test.features())?;
            let scored = RegressionMetrics::score(test.targets().view(), predictions.view())?;
            let fit_metrics = FitMetrics::from(&scored);

            info!(
                variant = %config.variant,
                mse = fit_metrics.mse,
                rmse = fit_metrics.rmse,
                r2 = fit_metrics.r2,
                model_hash = %artifact.metadata.model_hash,
                "variant trained"
            );

            models.push(TrainedModel {
                artifact,
                fit_metrics,
            });
        }

        Ok(TrainingRun {
            models,
            holdout,
            training_rows: train.n_rows(),
        })
    }
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

fn fit_estimator<'a>(
    estimator: &EstimatorConfig,
    features: ArrayView2<'a, f64>,
    targets: ArrayView1<'a, f64>,
) -> Result<ModelKind> {
    match estimator {
        EstimatorConfig::LinearRegression => {
            let dataset = linfa::Dataset::new(features.to_owned(), targets.to_owned());
            let fitted = LinearRegression::new()
                .fit(&dataset)
                .map_err(|err| TrainerError::Training(format!("least squares fit failed: {err}")))?;

            Ok(ModelKind::Linear(LinearModel {
                intercept: fitted.intercept(),
                coefficients: fitted.params().to_vec(),
            }))
        }
        EstimatorConfig::RandomForest(config) => {
            Ok(ModelKind::RandomForest(fit_forest(features, targets, config)?))
        }
    }
}

impl TrainingRun {
    pub fn get(&self, variant: ModelVariant) -> Option<&TrainedModel> {
        self.models.iter().find(|m| m.artifact.variant == variant)
    }

    /// Write model artifacts, the held-out set and training metrics
    pub fn persist(&self, layout: &ArtifactLayout) -> Result<()> {
        let mut fit_report = MetricsReport::<FitMetrics>::new();

        for trained in &self.models {
            let path = layout.model_path(trained.artifact.variant);
            trained.artifact.save(&path)?;
            fit_report.insert(trained.artifact.variant, trained.fit_metrics);
        }

        let holdout_path = layout.holdout_path();
        if let Some(parent) = holdout_path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.holdout.write_csv(&holdout_path)?;
        fit_report.save(layout.train_metrics_path())?;

        info!(
            models = self.models.len(),
            holdout = %holdout_path.display(),
            holdout_rows = self.holdout.n_rows(),
            "training artifacts persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    /// Full-rank table with a known linear relation
    fn linear_table(rows: usize) -> EncodedTable {
        let features = Array2::from_shape_fn((rows, 3), |(i, j)| match j {
            0 => (i % 7) as f64,
            1 => (i % 2) as f64,
            _ => ((i / 3) % 2) as f64,
        });
        let targets = Array1::from_shape_fn(rows, |i| {
            let row = features.row(i);
            300_000.0 + 10_000.0 * row[0] + 5_000.0 * row[1] + 50_000.0 * row[2]
        });
        EncodedTable::new(
            vec!["year_num".into(), "periode_num".into(), "jenis_TOTAL".into()],
            features,
            targets,
        )
        .unwrap()
    }

    fn small_configs() -> Vec<VariantConfig> {
        vec![
            VariantConfig::for_variant(ModelVariant::Default, DEFAULT_SEED),
            VariantConfig {
                variant: ModelVariant::Custom,
                estimator: EstimatorConfig::RandomForest(ForestConfig {
                    n_estimators: 8,
                    max_depth: Some(6),
                    ..ForestConfig::default()
                }),
            },
        ]
    }

    #[test]
    fn test_variant_hyperparameters() {
        let configs = VariantConfig::all(DEFAULT_SEED);
        assert_eq!(configs.len(), 3);
        assert_eq!(configs[0].estimator, EstimatorConfig::LinearRegression);

        match &configs[2].estimator {
            EstimatorConfig::RandomForest(forest) => {
                assert_eq!(forest.n_estimators, 200);
                assert_eq!(forest.max_depth, Some(15));
                assert_eq!(forest.min_samples_split, 5);
                assert_eq!(forest.min_samples_leaf, 2);
                assert_eq!(forest.seed, 42);
            }
            other => panic!("tuned should be a forest, got {other:?}"),
        }
    }

    #[test]
    fn test_linear_recovers_coefficients() {
        let run = Trainer::with_configs(small_configs(), DEFAULT_SEED)
            .train(&linear_table(60))
            .unwrap();

        let default = run.get(ModelVariant::Default).unwrap();
        match &default.artifact.model {
            ModelKind::Linear(model) => {
                assert!((model.intercept - 300_000.0).abs() < 1e-3);
                assert!((model.coefficients[0] - 10_000.0).abs() < 1e-3);
                assert!((model.coefficients[2] - 50_000.0).abs() < 1e-3);
            }
            other => panic!("expected linear model, got {other:?}"),
        }
        assert!(default.fit_metrics.r2 > 0.999);
    }

    #[test]
    fn test_holdout_is_twenty_percent() {
        let run = Trainer::with_configs(small_configs(), DEFAULT_SEED)
            .train(&linear_table(60))
            .unwrap();
        assert_eq!(run.holdout.n_rows(), 12);
        assert_eq!(run.training_rows, 48);
        assert_eq!(run.models.len(), 2);
    }

    #[test]
    fn test_training_is_deterministic() {
        let trainer = Trainer::with_configs(small_configs(), DEFAULT_SEED);
        let a = trainer.train(&linear_table(40)).unwrap();
        let b = trainer.train(&linear_table(40)).unwrap();

        for (x, y) in a.models.iter().zip(&b.models) {
            assert_eq!(x.artifact.metadata.model_hash, y.artifact.metadata.model_hash);
        }
    }

    #[test]
    fn test_persist_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());

        let run = Trainer::with_configs(small_configs(), DEFAULT_SEED)
            .train(&linear_table(30))
            .unwrap();
        run.persist(&layout).unwrap();

        assert!(layout.model_path(ModelVariant::Default).exists());
        assert!(ModelArtifact::hash_path(&layout.model_path(ModelVariant::Custom)).exists());
        assert!(layout.holdout_path().exists());

        let report: MetricsReport<FitMetrics> = MetricsReport::load(layout.train_metrics_path()).unwrap();
        assert!(report.get(ModelVariant::Custom).is_some());

        let holdout = EncodedTable::read_csv(layout.holdout_path()).unwrap();
        assert_eq!(holdout.n_rows(), run.holdout.n_rows());
    }
}
