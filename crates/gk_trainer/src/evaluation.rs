//! Held-out evaluation and best-model selection

use gk_core::{
    ArtifactLayout, BestModel, EncodedTable, MetricsReport, ModelArtifact, ModelKind,
    ModelVariant, RegressionMetrics,
};
use ndarray::Array1;
use std::collections::BTreeMap;
use std::fs;
use tracing::{error, info, warn};

use crate::errors::{Result, TrainerError};

/// Scores of every model that could be evaluated, plus the winner
#[derive(Clone, Debug)]
pub struct EvaluationReport {
    pub metrics: MetricsReport,
    pub best: BestModel,
    /// Forest feature importances, sorted descending
    pub importances: BTreeMap<ModelVariant, Vec<(String, f64)>>,
    pub holdout_rows: usize,
}

/// Scores persisted models against the shared held-out set
pub struct Evaluator {
    layout: ArtifactLayout,
}

impl Evaluator {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    /// Load the held-out set and every persisted model, then score them.
    /// Models that fail to load are logged and skipped.
    pub fn evaluate(&self) -> Result<EvaluationReport> {
        let holdout = EncodedTable::read_csv(self.layout.holdout_path())?;

        let mut models = Vec::new();
        for variant in ModelVariant::ALL {
            let path = self.layout.model_path(variant);
            match ModelArtifact::load(&path) {
                Ok(artifact) => models.push(artifact),
                Err(err) => error!(
                    variant = %variant,
                    path = %path.display(),
                    error = %err,
                    "failed to load model; skipping"
                ),
            }
        }

        evaluate_models(&holdout, &models)
    }

    /// [`Evaluator::evaluate`] followed by [`EvaluationReport::persist`]
    pub fn run(&self) -> Result<EvaluationReport> {
        let report = self.evaluate()?;
        report.persist(&self.layout)?;
        Ok(report)
    }
}

/// Score `models` on `holdout`; rows with a missing target are dropped
pub fn evaluate_models(holdout: &EncodedTable, models: &[ModelArtifact]) -> Result<EvaluationReport> {
    let keep: Vec<usize> = holdout
        .targets()
        .iter()
        .enumerate()
        .filter(|(_, y)| !y.is_nan())
        .map(|(i, _)| i)
        .collect();

    let excluded = holdout.n_rows() - keep.len();
    if excluded > 0 {
        warn!(excluded, "held-out rows with missing target excluded from evaluation");
    }
    if keep.is_empty() {
        return Err(TrainerError::Evaluation("held-out set has no rows with a target".into()));
    }
    let holdout = holdout.select_rows(&keep);

    let mut metrics = MetricsReport::new();
    let mut importances = BTreeMap::new();
    let mut best: Option<BestModel> = None;

    // ModelVariant order decides ties
    let mut ordered: Vec<&ModelArtifact> = models.iter().collect();
    ordered.sort_by_key(|m| m.variant);

    for artifact in ordered {
        let scored = match score(artifact, &holdout) {
            Ok(scored) => scored,
            Err(err) => {
                error!(variant = %artifact.variant, error = %err, "failed to score model; skipping");
                continue;
            }
        };

        info!(
            variant = %artifact.variant,
            model_type = artifact.model_type(),
            mse = scored.mse,
            rmse = scored.rmse,
            mae = scored.mae,
            r2 = scored.r2,
            mape = scored.mape,
            "model evaluated"
        );
        metrics.insert(artifact.variant, scored);

        if let ModelKind::RandomForest(forest) = &artifact.model {
            importances.insert(
                artifact.variant,
                ranked_importances(&artifact.feature_names, &forest.feature_importances),
            );
        }

        if best.map_or(true, |b| scored.r2 > b.r2) {
            best = Some(BestModel {
                variant: artifact.variant,
                r2: scored.r2,
            });
        }
    }

    let best = best.ok_or_else(|| TrainerError::Evaluation("no model could be evaluated".into()))?;
    info!(variant = %best.variant, r2 = best.r2, "best model selected");

    Ok(EvaluationReport {
        metrics,
        best,
        importances,
        holdout_rows: holdout.n_rows(),
    })
}

fn score(artifact: &ModelArtifact, holdout: &EncodedTable) -> Result<RegressionMetrics> {
    gk_core::FeatureSchema::new(holdout.feature_names().to_vec()).verify(&artifact.feature_names)?;
    let predictions: Array1<f64> = artifact.predict(holdout.features())?;
    Ok(RegressionMetrics::score(
        holdout.targets().view(),
        predictions.view(),
    )?)
}

fn ranked_importances(names: &[String], values: &[f64]) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = names.iter().cloned().zip(values.iter().copied()).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

impl EvaluationReport {
    /// Write all metrics, the best-model pointer and importance tables
    pub fn persist(&self, layout: &ArtifactLayout) -> Result<()> {
        self.metrics.save(layout.all_metrics_path())?;
        self.best.save(layout.best_model_path())?;

        for (variant, ranked) in &self.importances {
            let path = layout.feature_importance_path(*variant);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut writer = csv::Writer::from_path(&path)?;
            writer.write_record(["feature", "importance"])?;
            for (name, value) in ranked {
                writer.write_record([name.as_str(), value.to_string().as_str()])?;
            }
            writer.flush()?;
        }

        info!(
            metrics = %layout.all_metrics_path().display(),
            best = %layout.best_model_path().display(),
            "evaluation artifacts persisted"
        );
        Ok(())
    }
}
