//! Least-squares regression trees, the base learner of both boosted models

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Hyper-parameters shared by the boosted classifier and regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingConfig {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Fraction of rows drawn (without replacement) for each tree
    pub subsample: f64,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_depth: 5,
            learning_rate: 0.1,
            subsample: 0.8,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Binary tree stored as a flat node list; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grow a tree on `targets` restricted to `indices`
    ///
    /// Splits minimise the summed squared error of `targets`; each leaf value
    /// comes from `leaf_value` over the rows that reach it. Squared-error
    /// reductions are accumulated per feature into `importances`.
    pub fn fit(
        rows: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        config: &BoostingConfig,
        importances: &mut [f64],
        leaf_value: &dyn Fn(&[usize]) -> f64,
    ) -> Self {
        let mut builder = TreeBuilder {
            rows,
            targets,
            max_depth: config.max_depth,
            min_samples_leaf: config.min_samples_leaf.max(1),
            importances,
            leaf_value,
            nodes: Vec::new(),
        };
        builder.grow(indices.to_vec(), 0);
        Self {
            nodes: builder.nodes,
        }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Non-empty, and every child index lies after its parent and inside the node list
    ///
    /// The builder emits children after their parent, so this also rules out cycles.
    pub fn is_well_formed(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(idx, node)| match node {
                Node::Leaf { value } => value.is_finite(),
                Node::Split {
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    !threshold.is_nan()
                        && [*left, *right]
                            .iter()
                            .all(|&child| child > idx && child < self.nodes.len())
                }
            })
    }

    /// Largest feature index referenced by a split
    pub fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    targets: &'a [f64],
    max_depth: usize,
    min_samples_leaf: usize,
    importances: &'a mut [f64],
    leaf_value: &'a dyn Fn(&[usize]) -> f64,
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl TreeBuilder<'_> {
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: 0.0 });

        let split = if depth < self.max_depth && indices.len() >= 2 * self.min_samples_leaf {
            self.best_split(&indices)
        } else {
            None
        };

        match split {
            None => {
                self.nodes[id] = Node::Leaf {
                    value: (self.leaf_value)(&indices[..]),
                };
            }
            Some(split) => {
                self.importances[split.feature] += split.gain;
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| self.rows[i][split.feature] <= split.threshold);
                let left = self.grow(left_idx, depth + 1);
                let right = self.grow(right_idx, depth + 1);
                self.nodes[id] = Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left,
                    right,
                };
            }
        }
        id
    }

    fn best_split(&self, indices: &[usize]) -> Option<SplitCandidate> {
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| self.targets[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.targets[i].powi(2)).sum();
        let parent_sse = total_sq - total_sum * total_sum / n as f64;
        if parent_sse <= 1e-12 {
            return None;
        }

        let n_features = self.rows[indices[0]].len();
        let mut best: Option<SplitCandidate> = None;
        let mut column: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature in 0..n_features {
            column.clear();
            column.extend(indices.iter().map(|&i| (self.rows[i][feature], self.targets[i])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 0..n - 1 {
                let (value, target) = column[k];
                left_sum += target;
                left_sq += target * target;

                let next = column[k + 1].0;
                if value == next {
                    continue;
                }
                let n_left = k + 1;
                let n_right = n - n_left;
                if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / n_left as f64)
                    + (right_sq - right_sum * right_sum / n_right as f64);
                let gain = parent_sse - sse;

                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }
        best
    }
}

/// Draw the row subset for one boosting round, sorted ascending
pub(crate) fn subsample_rows(n: usize, fraction: f64, rng: &mut StdRng) -> Vec<usize> {
    if fraction >= 1.0 || n < 2 {
        return (0..n).collect();
    }
    let k = ((n as f64 * fraction).round() as usize).clamp(1, n);
    let mut picked = rand::seq::index::sample(rng, n, k).into_vec();
    picked.sort_unstable();
    picked
}

/// Scale accumulated gains so they sum to one
pub(crate) fn normalize_importances(importances: &mut [f64]) {
    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        importances.iter_mut().for_each(|v| *v /= total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn mean_leaf(targets: &[f64]) -> impl Fn(&[usize]) -> f64 + '_ {
        move |idx: &[usize]| idx.iter().map(|&i| targets[i]).sum::<f64>() / idx.len() as f64
    }

    #[test]
    fn test_stump_separates_step_function() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 0.0]).collect();
        let targets: Vec<f64> = (0..20).map(|i| if i < 10 { -1.0 } else { 1.0 }).collect();
        let indices: Vec<usize> = (0..20).collect();
        let config = BoostingConfig {
            max_depth: 1,
            ..Default::default()
        };
        let mut importances = vec![0.0; 2];
        let leaf = mean_leaf(&targets);
        let tree = RegressionTree::fit(&rows, &targets, &indices, &config, &mut importances, &leaf);

        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(&[3.0, 0.0]), -1.0);
        assert_eq!(tree.predict(&[12.0, 0.0]), 1.0);
        assert!(tree.predict(&[9.4, 0.0]) < 0.0);
        assert!(tree.predict(&[9.6, 0.0]) > 0.0);
        assert!(importances[0] > 0.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_constant_targets_give_single_leaf() {
        let rows: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64]).collect();
        let targets = vec![2.5; 8];
        let indices: Vec<usize> = (0..8).collect();
        let mut importances = vec![0.0; 1];
        let leaf = mean_leaf(&targets);
        let tree = RegressionTree::fit(
            &rows,
            &targets,
            &indices,
            &BoostingConfig::default(),
            &mut importances,
            &leaf,
        );
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict(&[100.0]), 2.5);
    }

    #[test]
    fn test_depth_limit_respected() {
        let rows: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..64).map(|i| (i as f64).sin()).collect();
        let indices: Vec<usize> = (0..64).collect();
        let config = BoostingConfig {
            max_depth: 3,
            ..Default::default()
        };
        let mut importances = vec![0.0; 1];
        let leaf = mean_leaf(&targets);
        let tree = RegressionTree::fit(&rows, &targets, &indices, &config, &mut importances, &leaf);
        assert!(tree.depth() <= 3);
        assert!(tree.n_leaves() <= 8);
    }

    #[test]
    fn test_subsample_is_seeded() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        let first = subsample_rows(100, 0.8, &mut a);
        assert_eq!(first.len(), 80);
        assert_eq!(first, subsample_rows(100, 0.8, &mut b));
        assert!(first.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(subsample_rows(5, 1.0, &mut a), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_normalize_importances() {
        let mut values = vec![1.0, 3.0, 0.0];
        normalize_importances(&mut values);
        assert_eq!(values, vec![0.25, 0.75, 0.0]);

        let mut zeros = vec![0.0, 0.0];
        normalize_importances(&mut zeros);
        assert_eq!(zeros, vec![0.0, 0.0]);
    }
}
