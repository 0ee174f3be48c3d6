//! Prediction service state
//!
//! A [`PredictionService`] is built once at start-up and is immutable
//! afterwards. If the artifacts cannot be loaded it stays up in a failed
//! state: health reports unhealthy and predictions are refused.

use gk_core::{
    BestModel, FeatureSchema, MetricsReport, ModelArtifact, ModelVariant, RegressionMetrics,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::config::ServiceConfig;
use crate::errors::{Result, ServiceError};

/// A validated model together with its held-out metrics
#[derive(Debug, Clone)]
pub struct LoadedModel {
    artifact: ModelArtifact,
    metrics: RegressionMetrics,
}

impl LoadedModel {
    /// Accept `artifact` only if it was trained on the canonical schema
    pub fn new(artifact: ModelArtifact, metrics: RegressionMetrics) -> Result<Self> {
        FeatureSchema::canonical().verify(&artifact.feature_names)?;
        artifact.validate()?;
        Ok(Self { artifact, metrics })
    }

    /// Read the configured (or best) variant and its metrics from disk
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let layout = config.layout();

        let variant = match config.model_variant {
            Some(variant) => variant,
            None => BestModel::load(layout.best_model_path())?.variant,
        };

        let artifact = ModelArtifact::load(layout.model_path(variant))?;
        let report: MetricsReport = MetricsReport::load(layout.all_metrics_path())?;
        let metrics = *report.get(variant).ok_or_else(|| {
            ServiceError::Unavailable(format!("no metrics recorded for variant {variant}"))
        })?;

        Self::new(artifact, metrics)
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn metrics(&self) -> &RegressionMetrics {
        &self.metrics
    }

    pub fn variant(&self) -> ModelVariant {
        self.artifact.variant
    }
}

#[derive(Debug)]
enum ServiceState {
    Serving(Arc<LoadedModel>),
    LoadFailed { reason: String },
}

/// Health probe result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

/// What `/metadata` reports about the served model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub metrics: RegressionMetrics,
    pub features: Vec<String>,
}

/// Shared, read-only handle to the served model
#[derive(Debug, Clone)]
pub struct PredictionService {
    state: Arc<ServiceState>,
}

impl PredictionService {
    /// Load from disk; failures are logged and produce an unavailable service
    pub fn load(config: &ServiceConfig) -> Self {
        match LoadedModel::from_config(config) {
            Ok(model) => {
                info!(
                    variant = %model.variant(),
                    model_type = model.artifact.model_type(),
                    model_hash = %model.artifact.metadata.model_hash,
                    r2 = model.metrics.r2,
                    "model and metrics loaded"
                );
                Self::serving(model)
            }
            Err(err) => {
                error!(
                    artifacts_dir = %config.artifacts_dir.display(),
                    error = %err,
                    "failed to load model or metrics"
                );
                Self::unavailable(err.to_string())
            }
        }
    }

    /// Build from in-memory fixtures
    pub fn from_parts(artifact: ModelArtifact, metrics: RegressionMetrics) -> Result<Self> {
        Ok(Self::serving(LoadedModel::new(artifact, metrics)?))
    }

    pub fn serving(model: LoadedModel) -> Self {
        Self {
            state: Arc::new(ServiceState::Serving(Arc::new(model))),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: Arc::new(ServiceState::LoadFailed {
                reason: reason.into(),
            }),
        }
    }

    fn model(&self) -> Result<&Arc<LoadedModel>> {
        match self.state.as_ref() {
            ServiceState::Serving(model) => Ok(model),
            ServiceState::LoadFailed { .. } => {
                Err(ServiceError::Unavailable("Model not loaded".to_string()))
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model().is_ok()
    }

    pub fn health(&self) -> HealthStatus {
        match self.state.as_ref() {
            ServiceState::Serving(_) => HealthStatus {
                status: "healthy",
                error: None,
            },
            ServiceState::LoadFailed { reason } => HealthStatus {
                status: "unhealthy",
                error: Some(format!("Model not loaded: {reason}")),
            },
        }
    }

    /// Predict GK from a feature-name → value mapping. Extra keys are ignored.
    pub fn predict(&self, features: &Map<String, Value>) -> Result<f64> {
        let model = self.model()?;
        let names = &model.artifact.feature_names;

        let missing: Vec<String> = names
            .iter()
            .filter(|name| !features.contains_key(name.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::MissingFeatures(missing));
        }

        let mut row = Vec::with_capacity(names.len());
        for name in names {
            row.push(feature_value(name, &features[name.as_str()])?);
        }

        model
            .artifact
            .predict_row(&row)
            .map_err(|err| ServiceError::Prediction(err.to_string()))
    }

    pub fn metadata(&self) -> Result<ModelInfo> {
        let model = self.model()?;
        Ok(ModelInfo {
            model_type: model.artifact.model_type().to_string(),
            metrics: model.metrics,
            features: model.artifact.feature_names.clone(),
        })
    }
}

fn feature_value(name: &str, value: &Value) -> Result<f64> {
    let invalid = |reason: &str| ServiceError::InvalidFeature {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    match value {
        Value::Number(n) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid("not a finite number")),
        Value::Null => Err(invalid("value is null")),
        _ => Err(invalid("expected a number")),
    }
}
