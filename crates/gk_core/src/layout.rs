//! On-disk artifact layout
//!
//! ```text
//! <root>/data/raw/dataset.csv
//! <root>/data/processed/holdout.csv
//! <root>/models/<variant>_model.json
//! <root>/models/<variant>_model.hash
//! <root>/metrics/train_metrics.json
//! <root>/metrics/all_metrics.json
//! <root>/metrics/best_model.json
//! <root>/metrics/feature_importance_<variant>.csv
//! ```

use crate::model::ModelVariant;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dataset_path(&self) -> PathBuf {
        self.root.join("data").join("raw").join("dataset.csv")
    }

    pub fn holdout_path(&self) -> PathBuf {
        self.root.join("data").join("processed").join("holdout.csv")
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    pub fn model_path(&self, variant: ModelVariant) -> PathBuf {
        self.models_dir()
            .join(format!("{}_model.json", variant.as_str()))
    }

    pub fn metrics_dir(&self) -> PathBuf {
        self.root.join("metrics")
    }

    pub fn train_metrics_path(&self) -> PathBuf {
        self.metrics_dir().join("train_metrics.json")
    }

    pub fn all_metrics_path(&self) -> PathBuf {
        self.metrics_dir().join("all_metrics.json")
    }

    pub fn best_model_path(&self) -> PathBuf {
        self.metrics_dir().join("best_model.json")
    }

    pub fn feature_importance_path(&self, variant: ModelVariant) -> PathBuf {
        self.metrics_dir()
            .join(format!("feature_importance_{}.csv", variant.as_str()))
    }
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self::new(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted() {
        let layout = ArtifactLayout::new("/srv/gk");
        assert_eq!(
            layout.model_path(ModelVariant::Tuned),
            PathBuf::from("/srv/gk/models/tuned_model.json")
        );
        assert_eq!(
            layout.all_metrics_path(),
            PathBuf::from("/srv/gk/metrics/all_metrics.json")
        );
        assert_eq!(
            layout.feature_importance_path(ModelVariant::Custom),
            PathBuf::from("/srv/gk/metrics/feature_importance_custom.csv")
        );
    }
}
