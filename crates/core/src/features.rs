use crate::domain::snapshot::{DerivedFeatureSet, RawStockSnapshot};

/// Canonical feature order. The trainer records exactly this list and the server refuses
/// artifacts whose recorded list fingerprints differently.
pub const FEATURE_NAMES: [&str; 7] = [
    "day_change_percent",
    "volume",
    "market_cap",
    "current_price",
    "price_volatility",
    "volume_ratio",
    "price_change_ratio",
];

/// Placeholder until a historical volume baseline is available at inference time.
pub const DEFAULT_VOLUME_RATIO: f64 = 1.0;

/// Derives model features for an online request. Total: missing or non-positive inputs are
/// coerced instead of rejected.
pub fn derive_features(snapshot: &RawStockSnapshot) -> DerivedFeatureSet {
    derive_features_with_baseline(snapshot, None)
}

/// Same derivation as [`derive_features`], with `volume_ratio` computed against an average
/// volume when one is known (the trainer passes the population mean).
pub fn derive_features_with_baseline(
    snapshot: &RawStockSnapshot,
    volume_baseline: Option<f64>,
) -> DerivedFeatureSet {
    let day_change_percent = snapshot.day_change_percent.unwrap_or(0.0);
    let volume = floor_to_one(snapshot.volume.unwrap_or(0.0));
    let market_cap = floor_to_one(snapshot.market_cap.unwrap_or(0.0));
    let raw_price = snapshot.current_price.unwrap_or(0.0);
    let previous_close = snapshot.previous_close.unwrap_or(raw_price);

    let volume_ratio = match volume_baseline {
        Some(avg) if avg > 0.0 => volume / avg,
        _ => DEFAULT_VOLUME_RATIO,
    };

    let price_change_ratio = if previous_close > 0.0 {
        (raw_price - previous_close).abs() / previous_close
    } else {
        0.0
    };

    DerivedFeatureSet {
        day_change_percent,
        volume,
        market_cap,
        current_price: floor_to_one(raw_price),
        price_volatility: day_change_percent.abs(),
        volume_ratio,
        price_change_ratio,
    }
}

/// Lays features out in the order recorded at training time. Unknown names read as 0.
pub fn project(features: &DerivedFeatureSet, feature_names: &[String]) -> Vec<f64> {
    feature_names
        .iter()
        .map(|name| features.get(name).unwrap_or(0.0))
        .collect()
}

/// md5 fingerprint of an ordered feature-name list.
pub fn feature_schema_hash<S: AsRef<str>>(feature_names: &[S]) -> String {
    let joined = feature_names
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    format!("{:x}", md5::compute(joined.as_bytes()))
}

fn floor_to_one(v: f64) -> f64 {
    if v > 0.0 {
        v
    } else {
        1.0
    }
}
