use crate::domain::snapshot::RawStockSnapshot;
use crate::features::{derive_features_with_baseline, project, FEATURE_NAMES};
use crate::model::ModelError;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, LogNormal, Normal};

/// Labeled rows in [`FEATURE_NAMES`] order, targets normalized to `[0, 100]`.
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub features: Array2<f64>,
    pub target: Array1<f64>,
}

/// Draws `samples` raw snapshots, derives features through the same code path the server
/// uses and labels them with a fixed risk formula:
///
/// `volatility * 10 + (max_cap / cap) * 30 + price_change_ratio * 2000 + 20 / (volume_ratio + 0.1)`
pub fn generate(samples: usize, seed: u64) -> Result<SyntheticDataset, ModelError> {
    if samples == 0 {
        return Err(ModelError::InvalidTrainingData(
            "sample count must be >= 1".to_string(),
        ));
    }

    let snapshots = draw_snapshots(samples, seed)?;

    let mean_volume = snapshots.iter().filter_map(|s| s.volume).sum::<f64>() / samples as f64;
    let names: Vec<String> = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();

    let mut features = Array2::<f64>::zeros((samples, names.len()));
    let mut raw_scores = Vec::with_capacity(samples);
    let derived: Vec<_> = snapshots
        .iter()
        .map(|s| derive_features_with_baseline(s, Some(mean_volume)))
        .collect();

    let max_market_cap = derived
        .iter()
        .map(|f| f.market_cap)
        .fold(f64::MIN, f64::max);

    for (i, f) in derived.iter().enumerate() {
        for (j, v) in project(f, &names).into_iter().enumerate() {
            features[[i, j]] = v;
        }

        raw_scores.push(
            f.price_volatility * 10.0
                + (max_market_cap / f.market_cap) * 30.0
                + f.price_change_ratio * 100.0 * 20.0
                + (1.0 / (f.volume_ratio + 0.1)) * 20.0,
        );
    }

    Ok(SyntheticDataset {
        features,
        target: min_max_scale(&raw_scores, 100.0),
    })
}

fn draw_snapshots(samples: usize, seed: u64) -> Result<Vec<RawStockSnapshot>, ModelError> {
    let bad = |e: rand_distr::NormalError| ModelError::InvalidTrainingData(e.to_string());
    let day_change = Normal::<f64>::new(0.0, 3.0).map_err(bad)?;
    let volume = LogNormal::<f64>::new(15.0, 1.0).map_err(bad)?;
    let market_cap = LogNormal::<f64>::new(20.0, 2.0).map_err(bad)?;
    let price = LogNormal::<f64>::new(4.0, 1.0).map_err(bad)?;

    let mut rng = StdRng::seed_from_u64(seed);

    let day_changes = draw(&day_change, &mut rng, samples);
    let volumes = draw(&volume, &mut rng, samples);
    let market_caps = draw(&market_cap, &mut rng, samples);
    let current_prices = draw(&price, &mut rng, samples);
    let previous_closes = draw(&price, &mut rng, samples);

    Ok((0..samples)
        .map(|i| RawStockSnapshot {
            symbol: None,
            day_change_percent: Some(day_changes[i]),
            volume: Some(volumes[i]),
            market_cap: Some(market_caps[i]),
            current_price: Some(current_prices[i]),
            previous_close: Some(previous_closes[i]),
        })
        .collect())
}

fn draw<D: Distribution<f64>>(dist: &D, rng: &mut StdRng, n: usize) -> Vec<f64> {
    (0..n).map(|_| dist.sample(&mut *rng)).collect()
}

fn min_max_scale(values: &[f64], upper: f64) -> Array1<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return Array1::zeros(values.len());
    }
    values.iter().map(|v| (v - min) / range * upper).collect()
}
