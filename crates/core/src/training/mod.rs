pub mod synthetic;

use crate::artifacts::{ArtifactManifest, ModelArtifacts, ARTIFACT_SCHEMA_VERSION};
use crate::features::{feature_schema_hash, FEATURE_NAMES};
use crate::model::forest::{ForestParams, RandomForestRegressor};
use crate::model::metrics::RegressionMetrics;
use crate::model::scaler::StandardScaler;
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[derive(Debug, Clone)]
pub struct TrainingOptions {
    /// Number of synthetic rows to generate.
    pub samples: usize,

    /// Seed for data generation and the train/test shuffle.
    pub seed: u64,

    /// Share of rows held out for evaluation.
    pub test_fraction: f64,

    pub forest: ForestParams,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            samples: 2000,
            seed: 42,
            test_fraction: 0.2,
            forest: ForestParams::default(),
        }
    }
}

impl TrainingOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("TRAIN_SAMPLES") {
            if let Ok(n) = s.parse::<usize>() {
                out.samples = n;
            }
        }

        if let Ok(s) = std::env::var("TRAIN_SEED") {
            if let Ok(n) = s.parse::<u64>() {
                out.seed = n;
                out.forest.seed = n;
            }
        }

        if let Ok(s) = std::env::var("TRAIN_TREES") {
            if let Ok(n) = s.parse::<usize>() {
                out.forest.n_estimators = n;
            }
        }

        if let Ok(s) = std::env::var("TRAIN_MAX_DEPTH") {
            if let Ok(n) = s.parse::<usize>() {
                out.forest.max_depth = n;
            }
        }

        if let Ok(s) = std::env::var("TRAIN_MIN_SAMPLES_SPLIT") {
            if let Ok(n) = s.parse::<usize>() {
                out.forest.min_samples_split = n;
            }
        }

        out
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.samples >= 10,
            "training sample count must be >= 10 (got {})",
            self.samples
        );
        anyhow::ensure!(
            self.test_fraction > 0.0 && self.test_fraction < 1.0,
            "test fraction must be in (0, 1) (got {})",
            self.test_fraction
        );
        anyhow::ensure!(
            self.forest.n_estimators >= 1,
            "forest must have at least one tree"
        );
        anyhow::ensure!(self.forest.max_depth >= 1, "max depth must be >= 1");
        anyhow::ensure!(
            self.forest.min_samples_split >= 2,
            "min samples split must be >= 2 (got {})",
            self.forest.min_samples_split
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifacts: ModelArtifacts,
    pub metrics: RegressionMetrics,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Generates data, fits scaler and forest on the training split and evaluates on the
/// held-out split. Nothing is written to disk.
pub fn train(opts: &TrainingOptions) -> anyhow::Result<TrainingOutcome> {
    opts.validate()?;

    let data = synthetic::generate(opts.samples, opts.seed)?;
    let (train_idx, test_idx) = split_indices(opts.samples, opts.test_fraction, opts.seed);

    let x_train = data.features.select(Axis(0), &train_idx);
    let y_train = data.target.select(Axis(0), &train_idx);
    let x_test = data.features.select(Axis(0), &test_idx);
    let y_test = data.target.select(Axis(0), &test_idx);

    let scaler = StandardScaler::fit(x_train.view())?;
    let x_train = scaler.transform(x_train.view())?;
    let x_test = scaler.transform(x_test.view())?;

    tracing::debug!(
        train_rows = train_idx.len(),
        test_rows = test_idx.len(),
        trees = opts.forest.n_estimators,
        "fitting random forest"
    );
    let regressor = RandomForestRegressor::fit(opts.forest, x_train.view(), y_train.view())?;

    let predictions = regressor.predict(x_test.view())?;
    let metrics = RegressionMetrics::compute(y_test.view(), predictions.view())?;

    let feature_names: Vec<String> = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
    let manifest = ArtifactManifest {
        schema_version: ARTIFACT_SCHEMA_VERSION,
        feature_schema_hash: feature_schema_hash(&feature_names),
        feature_count: feature_names.len(),
        trained_at: chrono::Utc::now(),
        samples: opts.samples,
        seed: opts.seed,
        forest: regressor.params(),
        metrics,
    };

    Ok(TrainingOutcome {
        artifacts: ModelArtifacts {
            regressor,
            scaler,
            feature_names,
            manifest,
        },
        metrics,
        train_rows: train_idx.len(),
        test_rows: test_idx.len(),
    })
}

/// Shuffled split; the test side gets `ceil(n * test_fraction)` rows.
fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    idx.shuffle(&mut rng);

    let n_test = ((n as f64) * test_fraction).ceil() as usize;
    let n_test = n_test.clamp(1, n.saturating_sub(1));
    let test = idx.split_off(n - n_test);
    (idx, test)
}
