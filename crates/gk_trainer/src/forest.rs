//! Random forest regressor
//!
//! Bagged CART trees: every tree sees a bootstrap sample drawn with its own
//! seed, derived from the forest seed and the tree index.

use gk_core::ForestModel;
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cart::{CartBuilder, TreeConfig};
use crate::deterministic::{xxhash64_i64, LcgRng};
use crate::errors::{Result, TrainerError};

/// Random forest hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: i64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

impl ForestConfig {
    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(TrainerError::Training("n_estimators must be positive".into()));
        }
        if self.min_samples_split < 2 {
            return Err(TrainerError::Training("min_samples_split must be at least 2".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(TrainerError::Training("min_samples_leaf must be positive".into()));
        }
        Ok(())
    }
}

/// Fit a forest on `features` / `targets`
pub fn fit_forest<'a>(
    features: ArrayView2<'a, f64>,
    targets: ArrayView1<'a, f64>,
    config: &ForestConfig,
) -> Result<ForestModel> {
    config.validate()?;

    let n = features.nrows();
    if n == 0 || n != targets.len() {
        return Err(TrainerError::Training(format!(
            "cannot fit forest on {n} rows with {} targets",
            targets.len()
        )));
    }

    let width = features.ncols();
    let mut trees = Vec::with_capacity(config.n_estimators);
    let mut importances = vec![0.0; width];

    for tree_idx in 0..config.n_estimators {
        let mut rng = LcgRng::new(xxhash64_i64(&[tree_idx as i64], config.seed));
        let samples = rng.bootstrap(n);

        let (tree, tree_importances) =
            CartBuilder::new(features, targets, config.tree_config()).build(&samples);

        // Normalise per tree before averaging
        let total: f64 = tree_importances.iter().sum();
        if total > 0.0 {
            for (acc, value) in importances.iter_mut().zip(&tree_importances) {
                *acc += value / total;
            }
        }

        debug!(
            tree = tree_idx + 1,
            of = config.n_estimators,
            nodes = tree.nodes.len(),
            depth = tree.depth(),
            "grew tree"
        );
        trees.push(tree);
    }

    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        importances.iter_mut().for_each(|v| *v /= total);
    }

    Ok(ForestModel {
        trees,
        feature_importances: importances,
    })
}
