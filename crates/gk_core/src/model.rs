//! Persisted regression models
//!
//! A [`ModelArtifact`] bundles the fitted parameters with the ordered
//! feature names it was trained on and a BLAKE3 hash of both. Artifacts are
//! stored as canonical JSON with a `.hash` sidecar holding the digest of the
//! file bytes.

use crate::errors::{CoreError, Result};
use crate::features::FeatureSchema;
use crate::serialization::{canonical_digest_hex, canonical_json_string, digest_hex};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// The three trained configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// Ordinary least squares
    Default,
    /// Shallow random forest
    Custom,
    /// Deeper random forest with tuned leaf/split sizes
    Tuned,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 3] = [ModelVariant::Default, ModelVariant::Custom, ModelVariant::Tuned];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Default => "default",
            ModelVariant::Custom => "custom",
            ModelVariant::Tuned => "tuned",
        }
    }

    /// Human-readable model type reported by `/metadata`
    pub fn model_type(&self) -> &'static str {
        match self {
            ModelVariant::Default => "Linear Regression (Default)",
            ModelVariant::Custom => "Random Forest Regressor (Custom)",
            ModelVariant::Tuned => "Random Forest Regressor (Tuned)",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariant {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(ModelVariant::Default),
            "custom" => Ok(ModelVariant::Custom),
            "tuned" => Ok(ModelVariant::Tuned),
            other => Err(CoreError::InvalidParameters(format!(
                "unknown model variant {other:?} (expected default, custom or tuned)"
            ))),
        }
    }
}

/// Intercept plus one coefficient per feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

/// A regression tree node (internal or leaf)
///
/// Internal nodes send `x[feature_idx] <= threshold` to `left`, everything
/// else to `right`. Leaves have `feature_idx == -1` and carry `leaf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub feature_idx: i32,
    pub threshold: f64,
    pub left: i32,
    pub right: i32,
    pub leaf: Option<f64>,
}

impl TreeNode {
    pub fn internal(feature_idx: usize, threshold: f64) -> Self {
        Self {
            feature_idx: feature_idx as i32,
            threshold,
            left: -1,
            right: -1,
            leaf: None,
        }
    }

    pub fn leaf(value: f64) -> Self {
        Self {
            feature_idx: -1,
            threshold: 0.0,
            left: -1,
            right: -1,
            leaf: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx < 0 || self.leaf.is_some()
    }
}

/// Flat node array, node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Walk the tree; `None` means the node array is malformed
    pub fn evaluate(&self, features: &[f64]) -> Option<f64> {
        let mut idx = 0usize;

        // A well-formed tree never revisits a node
        for _ in 0..=self.nodes.len() {
            let node = self.nodes.get(idx)?;
            if node.is_leaf() {
                return node.leaf;
            }

            let value = *features.get(node.feature_idx as usize)?;
            let next = if value <= node.threshold {
                node.left
            } else {
                node.right
            };
            idx = usize::try_from(next).ok()?;
        }

        None
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: i32, budget: usize) -> usize {
            match usize::try_from(idx).ok().and_then(|i| nodes.get(i)) {
                Some(node) if !node.is_leaf() && budget > 0 => {
                    1 + walk(nodes, node.left, budget - 1).max(walk(nodes, node.right, budget - 1))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0, self.nodes.len())
    }
}

/// Bagged ensemble of regression trees; prediction is the tree mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub trees: Vec<RegressionTree>,
    /// Normalised total impurity decrease per feature
    pub feature_importances: Vec<f64>,
}

impl ForestModel {
    pub fn predict(&self, features: &[f64]) -> Option<f64> {
        if self.trees.is_empty() {
            return None;
        }

        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.evaluate(features)?;
        }
        Some(sum / self.trees.len() as f64)
    }
}

/// Fitted estimator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    Linear(LinearModel),
    RandomForest(ForestModel),
}

impl ModelKind {
    fn raw_predict(&self, features: &[f64]) -> Result<f64> {
        match self {
            ModelKind::Linear(model) => Ok(model.predict(features)),
            ModelKind::RandomForest(forest) => forest
                .predict(features)
                .ok_or_else(|| CoreError::InvalidParameters("malformed forest structure".into())),
        }
    }

    /// Highest feature index referenced plus one
    fn required_width(&self) -> usize {
        match self {
            ModelKind::Linear(model) => model.coefficients.len(),
            ModelKind::RandomForest(forest) => forest
                .trees
                .iter()
                .flat_map(|t| t.nodes.iter())
                .filter(|n| !n.is_leaf())
                .map(|n| n.feature_idx as usize + 1)
                .max()
                .unwrap_or(0),
        }
    }
}

/// Bookkeeping stored next to the parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: String,
    pub created_at: u64,
    pub training_rows: usize,
    pub feature_count: usize,
    pub model_hash: String,
}

/// Fitted model ready for persistence or serving
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub variant: ModelVariant,
    pub feature_names: Vec<String>,
    pub model: ModelKind,
    pub metadata: ModelMetadata,
}

#[derive(Serialize)]
struct HashInput<'a> {
    variant: ModelVariant,
    feature_names: &'a [String],
    model: &'a ModelKind,
}

impl ModelArtifact {
    pub fn new(
        variant: ModelVariant,
        feature_names: Vec<String>,
        model: ModelKind,
        training_rows: usize,
    ) -> Result<Self> {
        let model_hash = Self::calculate_model_hash(variant, &feature_names, &model)?;
        let artifact = Self {
            variant,
            metadata: ModelMetadata {
                version: crate::VERSION.to_string(),
                created_at: chrono::Utc::now().timestamp().max(0) as u64,
                training_rows,
                feature_count: feature_names.len(),
                model_hash,
            },
            feature_names,
            model,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    /// BLAKE3 over the canonical JSON of variant, feature names and parameters
    pub fn calculate_model_hash(
        variant: ModelVariant,
        feature_names: &[String],
        model: &ModelKind,
    ) -> Result<String> {
        Ok(canonical_digest_hex(&HashInput {
            variant,
            feature_names,
            model,
        })?)
    }

    pub fn model_type(&self) -> &'static str {
        self.variant.model_type()
    }

    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::new(self.feature_names.clone())
    }

    /// Structural and integrity checks
    pub fn validate(&self) -> Result<()> {
        if self.feature_names.len() != self.metadata.feature_count {
            return Err(CoreError::FeatureCountMismatch {
                expected: self.metadata.feature_count,
                actual: self.feature_names.len(),
            });
        }

        let width = self.model.required_width();
        let linear = matches!(self.model, ModelKind::Linear(_));
        if (linear && width != self.feature_names.len()) || width > self.feature_names.len() {
            return Err(CoreError::FeatureCountMismatch {
                expected: self.feature_names.len(),
                actual: width,
            });
        }

        let computed = Self::calculate_model_hash(self.variant, &self.feature_names, &self.model)?;
        if computed != self.metadata.model_hash {
            return Err(CoreError::HashMismatch {
                expected: self.metadata.model_hash.clone(),
                actual: computed,
            });
        }

        Ok(())
    }

    /// Predict one row given in `feature_names` order.
    ///
    /// GK is a non-negative quantity, so outputs are floored at zero.
    pub fn predict_row(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.feature_names.len() {
            return Err(CoreError::FeatureCountMismatch {
                expected: self.feature_names.len(),
                actual: features.len(),
            });
        }

        let raw = self.model.raw_predict(features)?;
        if !raw.is_finite() {
            return Err(CoreError::NonFinitePrediction(raw));
        }
        Ok(raw.max(0.0))
    }

    /// Predict every row of a design matrix
    pub fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        let mut out = Array1::zeros(features.nrows());
        for (i, row) in features.rows().into_iter().enumerate() {
            out[i] = self.predict_row(&row.to_vec())?;
        }
        Ok(out)
    }

    /// Sidecar path holding the digest of the artifact file
    pub fn hash_path(path: &Path) -> PathBuf {
        path.with_extension("hash")
    }

    /// Write canonical JSON plus the `.hash` sidecar; returns the file digest
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = canonical_json_string(self)?;
        let digest = digest_hex(json.as_bytes());

        fs::write(path, &json)?;
        fs::write(Self::hash_path(path), &digest)?;

        info!(
            variant = %self.variant,
            path = %path.display(),
            model_hash = %self.metadata.model_hash,
            "model saved"
        );
        Ok(digest)
    }

    /// Read an artifact, checking the sidecar digest when present and the
    /// embedded model hash always
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;

        let hash_path = Self::hash_path(path);
        if hash_path.exists() {
            let expected = fs::read_to_string(&hash_path)?.trim().to_string();
            let actual = digest_hex(json.as_bytes());
            if expected != actual {
                return Err(CoreError::HashMismatch { expected, actual });
            }
        } else {
            debug!(path = %path.display(), "no hash sidecar; skipping file digest check");
        }

        let artifact: ModelArtifact = serde_json::from_str(&json)?;
        artifact.validate()?;
        Ok(artifact)
    }
}
