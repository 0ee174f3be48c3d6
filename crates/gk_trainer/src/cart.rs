//! CART (Classification and Regression Tree) builder
//!
//! Exact-greedy regression tree construction with variance-reduction
//! splits. Candidate thresholds are midpoints between consecutive distinct
//! feature values; equal gains resolve through [`SplitTieBreaker`].

use gk_core::{RegressionTree, TreeNode};
use ndarray::{ArrayView1, ArrayView2};

use crate::deterministic::SplitTieBreaker;

/// Growth limits for a single tree
#[derive(Clone, Debug, PartialEq)]
pub struct TreeConfig {
    /// `None` grows until the other limits stop it
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn beats(&self, current: &SplitCandidate) -> bool {
        self.gain > current.gain
            || (self.gain == current.gain && self.tie_breaker < current.tie_breaker)
    }
}

/// Running target sums for one side of a split
#[derive(Clone, Copy, Debug, Default)]
struct Moments {
    count: usize,
    sum: f64,
}

impl Moments {
    fn push(&mut self, y: f64) {
        self.count += 1;
        self.sum += y;
    }

    /// `sum² / n`; SSE = Σy² − this, so gains only need this term
    fn score(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum * self.sum / self.count as f64
        }
    }
}

/// Build a regression tree over a (possibly repeated) set of sample rows
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: ArrayView2<'a, f64>,
    targets: ArrayView1<'a, f64>,
    importances: Vec<f64>,
}

impl<'a> CartBuilder<'a> {
    pub fn new(features: ArrayView2<'a, f64>, targets: ArrayView1<'a, f64>, config: TreeConfig) -> Self {
        Self {
            importances: vec![0.0; features.ncols()],
            config,
            features,
            targets,
        }
    }

    /// Build a tree from `samples` (row indices, duplicates allowed).
    ///
    /// Returns the tree and the total SSE decrease per feature.
    pub fn build(mut self, samples: &[usize]) -> (RegressionTree, Vec<f64>) {
        let mut nodes = Vec::new();
        self.build_node(samples, 0, &mut nodes);
        (RegressionTree { nodes }, self.importances)
    }

    /// Recursively build tree nodes
    fn build_node(&mut self, samples: &[usize], depth: usize, nodes: &mut Vec<TreeNode>) -> i32 {
        let current_idx = nodes.len();
        let leaf_value = self.mean(samples);

        let depth_reached = self.config.max_depth.is_some_and(|max| depth >= max);
        if depth_reached
            || samples.len() < self.config.min_samples_split
            || samples.len() < 2 * self.config.min_samples_leaf.max(1)
        {
            nodes.push(TreeNode::leaf(leaf_value));
            return current_idx as i32;
        }

        let split = match self.find_best_split(samples) {
            Some(s) => s,
            None => {
                nodes.push(TreeNode::leaf(leaf_value));
                return current_idx as i32;
            }
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&row| self.features[[row, split.feature_idx]] <= split.threshold);

        self.importances[split.feature_idx] += split.gain;

        // Reserve space for current node
        nodes.push(TreeNode::internal(split.feature_idx, split.threshold));

        let left_idx = self.build_node(&left, depth + 1, nodes);
        let right_idx = self.build_node(&right, depth + 1, nodes);

        nodes[current_idx].left = left_idx;
        nodes[current_idx].right = right_idx;

        current_idx as i32
    }

    /// Exact-greedy search over every feature and midpoint threshold
    fn find_best_split(&self, samples: &[usize]) -> Option<SplitCandidate> {
        let mut total = Moments::default();
        for &row in samples {
            total.push(self.targets[row]);
        }
        let parent_score = total.score();

        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut best: Option<SplitCandidate> = None;

        for feature_idx in 0..self.features.ncols() {
            let mut pairs: Vec<(f64, f64)> = samples
                .iter()
                .map(|&row| (self.features[[row, feature_idx]], self.targets[row]))
                .collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = Moments::default();
            let mut rank = 0usize;

            for i in 0..pairs.len() - 1 {
                left.push(pairs[i].1);

                let (value, next) = (pairs[i].0, pairs[i + 1].0);
                if value == next {
                    continue;
                }
                rank += 1;

                let right = Moments {
                    count: total.count - left.count,
                    sum: total.sum - left.sum,
                };
                if left.count < min_leaf || right.count < min_leaf {
                    continue;
                }

                let gain = left.score() + right.score() - parent_score;
                if gain <= 0.0 || !gain.is_finite() {
                    continue;
                }

                let candidate = SplitCandidate {
                    feature_idx,
                    threshold: value + (next - value) / 2.0,
                    gain,
                    tie_breaker: SplitTieBreaker::new(feature_idx, rank),
                };

                best = match best {
                    Some(current) if !candidate.beats(&current) => Some(current),
                    _ => Some(candidate),
                };
            }
        }

        best
    }

    fn mean(&self, samples: &[usize]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().map(|&row| self.targets[row]).sum::<f64>() / samples.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2};

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let features = array![[0.0, 1.0], [1.0, 0.0], [2.0, 1.0], [3.0, 0.0]];
        let targets = array![10.0, 10.0, 30.0, 30.0];
        (features, targets)
    }

    #[test]
    fn test_splits_on_informative_feature() {
        let (x, y) = step_data();
        let (tree, importances) =
            CartBuilder::new(x.view(), y.view(), TreeConfig::default()).build(&[0, 1, 2, 3]);

        assert_eq!(tree.nodes[0].feature_idx, 0);
        assert_eq!(tree.nodes[0].threshold, 1.5);
        assert_eq!(tree.evaluate(&[0.5, 0.0]), Some(10.0));
        assert_eq!(tree.evaluate(&[2.5, 0.0]), Some(30.0));
        assert!(importances[0] > 0.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_leaf_only_tree() {
        let x = array![[1.0]];
        let y = array![5.0];
        let (tree, _) = CartBuilder::new(x.view(), y.view(), TreeConfig::default()).build(&[0]);

        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].leaf, Some(5.0));
    }

    #[test]
    fn test_constant_target_is_leaf() {
        let (x, _) = step_data();
        let y = array![7.0, 7.0, 7.0, 7.0];
        let (tree, importances) =
            CartBuilder::new(x.view(), y.view(), TreeConfig::default()).build(&[0, 1, 2, 3]);

        assert_eq!(tree.nodes.len(), 1);
        assert!(importances.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_depth_limit() {
        let x = Array2::from_shape_fn((16, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(16, |i| (i * i) as f64);
        let config = TreeConfig {
            max_depth: Some(2),
            ..TreeConfig::default()
        };
        let samples: Vec<usize> = (0..16).collect();
        let (tree, _) = CartBuilder::new(x.view(), y.view(), config).build(&samples);

        assert!(tree.depth() <= 2);
        assert_eq!(tree.nodes.iter().filter(|n| n.is_leaf()).count(), 4);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(10, |i| if i == 0 { 100.0 } else { 0.0 });
        let config = TreeConfig {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 3,
        };
        let samples: Vec<usize> = (0..10).collect();
        let (tree, _) = CartBuilder::new(x.view(), y.view(), config).build(&samples);

        // The isolating split at 0.5 is not allowed; the first split must leave 3 rows left
        assert_eq!(tree.nodes[0].threshold, 2.5);
    }

    #[test]
    fn test_tie_breaks_to_lowest_feature() {
        // Two identical columns give identical gains
        let x = array![[0.0, 0.0], [1.0, 1.0]];
        let y = array![1.0, 2.0];
        let (tree, _) = CartBuilder::new(x.view(), y.view(), TreeConfig::default()).build(&[0, 1]);
        assert_eq!(tree.nodes[0].feature_idx, 0);
    }

    #[test]
    fn test_repeated_samples() {
        let (x, y) = step_data();
        let (tree, _) =
            CartBuilder::new(x.view(), y.view(), TreeConfig::default()).build(&[0, 0, 3, 3, 3]);
        assert_eq!(tree.evaluate(&[0.0, 1.0]), Some(10.0));
        assert_eq!(tree.evaluate(&[3.0, 0.0]), Some(30.0));
    }
}
