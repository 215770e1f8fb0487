use super::ModelError;
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 5,
            seed: 42,
        }
    }
}

/// Bagged ensemble of squared-error regression trees. Every split considers all features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    /// Fits `params.n_estimators` trees in parallel. Tree `i` draws its bootstrap sample from
    /// its own RNG seeded with `seed + i`, so the fitted forest does not depend on how rayon
    /// schedules the work.
    pub fn fit(
        params: ForestParams,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> Result<Self, ModelError> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ModelError::InvalidTrainingData(
                "training matrix is empty".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(ModelError::InvalidTrainingData(format!(
                "{} rows but {} targets",
                x.nrows(),
                y.len()
            )));
        }
        if params.n_estimators == 0 || params.max_depth == 0 {
            return Err(ModelError::InvalidTrainingData(
                "n_estimators and max_depth must be >= 1".to_string(),
            ));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(ModelError::InvalidTrainingData(
                "training data contains non-finite values".to_string(),
            ));
        }

        let n = x.nrows();
        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                RegressionTree::fit(x, y, sample, &params)
            })
            .collect();

        Ok(Self {
            params,
            n_features: x.ncols(),
            trees,
        })
    }

    pub fn params(&self) -> ForestParams {
        self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64, ModelError> {
        if row.len() != self.n_features {
            return Err(ModelError::ShapeMismatch {
                expected: self.n_features,
                got: row.len(),
            });
        }
        let total: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        Ok(total / self.trees.len() as f64)
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        if x.ncols() != self.n_features {
            return Err(ModelError::ShapeMismatch {
                expected: self.n_features,
                got: x.ncols(),
            });
        }
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }

    /// Structural check for forests read back from disk; prediction indexes nodes directly.
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Malformed("forest has no trees".to_string()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| ModelError::Malformed(format!("tree {i}: {e}")))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Flat, pre-order tree: children always sit after their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RegressionTree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    fn fit(
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        mut sample: Vec<usize>,
        params: &ForestParams,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, y, &mut sample, 0, params);
        tree
    }

    fn grow(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        sample: &mut [usize],
        depth: usize,
        params: &ForestParams,
    ) -> usize {
        let mean = sample.iter().map(|&i| y[i]).sum::<f64>() / sample.len() as f64;
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean });

        if depth >= params.max_depth || sample.len() < params.min_samples_split.max(2) {
            return id;
        }
        let Some(split) = best_split(x, y, sample) else {
            return id;
        };

        let mid = partition(sample, |i| x[[i, split.feature]] <= split.threshold);
        let (left_sample, right_sample) = sample.split_at_mut(mid);
        let left = self.grow(x, y, left_sample, depth + 1, params);
        let right = self.grow(x, y, right_sample, depth + 1, params);

        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("node {idx} has a non-finite value"));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= n_features {
                        return Err(format!("node {idx} splits on unknown feature {feature}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {idx} has a non-finite threshold"));
                    }
                    for child in [left, right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {idx} has invalid child {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Exhaustive search for the split with the lowest summed squared error. Thresholds sit
/// halfway between adjacent distinct values, so both sides are always non-empty.
fn best_split(x: ArrayView2<f64>, y: ArrayView1<f64>, sample: &[usize]) -> Option<SplitCandidate> {
    let n = sample.len();
    let total_sum: f64 = sample.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = sample.iter().map(|&i| y[i] * y[i]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n as f64;
    if parent_sse <= f64::EPSILON {
        return None;
    }

    let mut best: Option<SplitCandidate> = None;
    let mut order = sample.to_vec();

    for feature in 0..x.ncols() {
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 1..n {
            let yi = y[order[k - 1]];
            left_sum += yi;
            left_sq += yi * yi;

            let lo = x[[order[k - 1], feature]];
            let hi = x[[order[k], feature]];
            if lo >= hi {
                continue;
            }

            let n_left = k as f64;
            let n_right = (n - k) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / n_left)
                + (right_sq - right_sum * right_sum / n_right);

            if best.as_ref().map_or(true, |b| sse < b.sse) {
                let mut threshold = lo / 2.0 + hi / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    sse,
                });
            }
        }
    }

    best.filter(|b| b.sse < parent_sse)
}

fn partition(sample: &mut [usize], mut goes_left: impl FnMut(usize) -> bool) -> usize {
    let mut mid = 0;
    for i in 0..sample.len() {
        if goes_left(sample[i]) {
            sample.swap(i, mid);
            mid += 1;
        }
    }
    mid
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let n = 40;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f64 } else { 7.0 });
        let y = Array1::from_shape_fn(n, |i| if i < 20 { 10.0 } else { 90.0 });
        (x, y)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_estimators: 10,
            max_depth: 4,
            min_samples_split: 2,
            seed: 7,
        }
    }

    #[test]
    fn learns_a_step_function() {
        let (x, y) = step_data();
        let forest = RandomForestRegressor::fit(small_params(), x.view(), y.view()).unwrap();

        let low = forest.predict_row(array![2.0, 7.0].view()).unwrap();
        let high = forest.predict_row(array![37.0, 7.0].view()).unwrap();
        assert!((low - 10.0).abs() < 1e-9, "low={low}");
        assert!((high - 90.0).abs() < 1e-9, "high={high}");
    }

    #[test]
    fn fitting_is_deterministic_for_a_seed() {
        let (x, y) = step_data();
        let a = RandomForestRegressor::fit(small_params(), x.view(), y.view()).unwrap();
        let b = RandomForestRegressor::fit(small_params(), x.view(), y.view()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.params(), small_params());
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn depth_one_trees_are_stumps() {
        let (x, y) = step_data();
        let params = ForestParams {
            max_depth: 1,
            ..small_params()
        };
        let forest = RandomForestRegressor::fit(params, x.view(), y.view()).unwrap();
        assert!(forest.trees.iter().all(|t| t.nodes.len() <= 3));
    }

    #[test]
    fn constant_target_yields_single_leaf() {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let y = Array1::from_elem(10, 5.0);
        let forest = RandomForestRegressor::fit(small_params(), x.view(), y.view()).unwrap();
        assert!(forest.trees.iter().all(|t| t.nodes.len() == 1));
        assert_eq!(forest.predict_row(array![3.0].view()).unwrap(), 5.0);
    }

    #[test]
    fn predict_rejects_wrong_width() {
        let (x, y) = step_data();
        let forest = RandomForestRegressor::fit(small_params(), x.view(), y.view()).unwrap();
        let err = forest.predict_row(array![1.0].view()).unwrap_err();
        assert_eq!(
            err,
            ModelError::ShapeMismatch {
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn fit_rejects_mismatched_targets() {
        let x = Array2::<f64>::zeros((5, 2));
        let y = Array1::<f64>::zeros(4);
        assert!(RandomForestRegressor::fit(small_params(), x.view(), y.view()).is_err());
    }

    #[test]
    fn validate_catches_dangling_children() {
        let (x, y) = step_data();
        let mut forest = RandomForestRegressor::fit(small_params(), x.view(), y.view()).unwrap();
        assert!(forest.validate().is_ok());

        forest.trees[0].nodes = vec![Node::Split {
            feature: 0,
            threshold: 1.0,
            left: 5,
            right: 6,
        }];
        assert!(forest.validate().is_err());
    }
}
