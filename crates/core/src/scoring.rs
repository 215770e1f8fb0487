use crate::artifacts::ModelArtifacts;
use crate::domain::score::{BatchEntry, ScoredResult};
use crate::domain::snapshot::{DerivedFeatureSet, RawStockSnapshot};
use crate::error::ScoringError;
use crate::features::{derive_features, project};
use ndarray::Array2;
use serde_json::Value;

pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// Scores one derived feature set against the loaded bundle.
pub fn score(
    features: &DerivedFeatureSet,
    artifacts: Option<&ModelArtifacts>,
) -> Result<ScoredResult, ScoringError> {
    let artifacts = artifacts.ok_or(ScoringError::ModelNotLoaded)?;

    let vector = project(features, &artifacts.feature_names);
    let row = Array2::from_shape_vec((1, vector.len()), vector)
        .map_err(|e| ScoringError::Inference(e.to_string()))?;

    let scaled = artifacts
        .scaler
        .transform(row.view())
        .map_err(|e| ScoringError::Inference(e.to_string()))?;
    let raw = artifacts
        .regressor
        .predict_row(scaled.row(0))
        .map_err(|e| ScoringError::Inference(e.to_string()))?;

    if !raw.is_finite() {
        return Err(ScoringError::Inference(format!(
            "model produced a non-finite score ({raw})"
        )));
    }

    Ok(ScoredResult::from_raw(raw))
}

/// One batch input: the symbol to echo back and the snapshot, or the reason it could not be
/// read. A `None` or JSON `null` symbol is echoed as [`UNKNOWN_SYMBOL`].
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub symbol: Option<Value>,
    pub snapshot: Result<RawStockSnapshot, String>,
}

impl From<RawStockSnapshot> for BatchItem {
    fn from(snapshot: RawStockSnapshot) -> Self {
        Self {
            symbol: snapshot.symbol.clone().map(Value::String),
            snapshot: Ok(snapshot),
        }
    }
}

/// Scores every item independently. Returns exactly one entry per input, in input order;
/// per-item failures become [`BatchEntry::Failed`].
pub fn score_batch(
    items: Vec<BatchItem>,
    artifacts: Option<&ModelArtifacts>,
) -> Result<Vec<BatchEntry>, ScoringError> {
    let artifacts = artifacts.ok_or(ScoringError::ModelNotLoaded)?;
    if items.is_empty() {
        return Err(ScoringError::InvalidInput("No stocks provided".to_string()));
    }

    let entries = items
        .into_iter()
        .map(|item| {
            let symbol = item
                .symbol
                .filter(|v| !v.is_null())
                .unwrap_or_else(|| Value::String(UNKNOWN_SYMBOL.to_string()));
            let result = item
                .snapshot
                .map_err(ScoringError::Inference)
                .and_then(|snapshot| score(&derive_features(&snapshot), Some(artifacts)));

            match result {
                Ok(scored) => BatchEntry::Scored {
                    symbol,
                    risk_score: scored.risk_score,
                    risk_level: scored.risk_level,
                },
                Err(err) => {
                    tracing::warn!(%symbol, error = %err, "batch item failed");
                    BatchEntry::Failed {
                        symbol,
                        error: err.to_string(),
                    }
                }
            }
        })
        .collect();

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::score::RiskLevel;
    use crate::model::forest::ForestParams;
    use crate::training::{train, TrainingOptions};
    use serde_json::json;

    fn artifacts() -> ModelArtifacts {
        let opts = TrainingOptions {
            samples: 300,
            forest: ForestParams {
                n_estimators: 6,
                max_depth: 6,
                ..ForestParams::default()
            },
            ..TrainingOptions::default()
        };
        train(&opts).unwrap().artifacts
    }

    fn snap(symbol: &str, day_change: f64) -> RawStockSnapshot {
        RawStockSnapshot {
            symbol: Some(symbol.to_string()),
            day_change_percent: Some(day_change),
            volume: Some(2_000_000.0),
            market_cap: Some(8.0e9),
            current_price: Some(55.0),
            previous_close: Some(54.0),
        }
    }

    #[test]
    fn score_requires_loaded_model() {
        let f = derive_features(&RawStockSnapshot::default());
        assert_eq!(score(&f, None), Err(ScoringError::ModelNotLoaded));
    }

    #[test]
    fn scores_are_bounded_and_bucketed() {
        let artifacts = artifacts();
        for dc in [-40.0, -3.0, 0.0, 1.5, 12.0, 90.0] {
            let r = score(&derive_features(&snap("X", dc)), Some(&artifacts)).unwrap();
            assert!((0.0..=100.0).contains(&r.risk_score));
            assert_eq!(r.risk_level, RiskLevel::from_score(r.risk_score));
            assert_eq!((r.risk_score * 100.0).round() / 100.0, r.risk_score);
        }
    }

    #[test]
    fn truncated_feature_list_is_an_inference_error() {
        let mut artifacts = artifacts();
        artifacts.feature_names.pop();

        let err = score(&derive_features(&snap("X", 1.0)), Some(&artifacts)).unwrap_err();
        assert!(matches!(err, ScoringError::Inference(_)), "{err:?}");
    }

    #[test]
    fn batch_preserves_order_and_isolates_failures() {
        let artifacts = artifacts();
        let items = vec![
            BatchItem::from(snap("AAPL", 1.0)),
            BatchItem {
                symbol: Some(Value::String("BAD".to_string())),
                snapshot: Err("invalid type: string \"x\", expected f64".to_string()),
            },
            BatchItem::from(RawStockSnapshot {
                current_price: Some(10.0),
                ..Default::default()
            }),
            BatchItem::from(snap("MSFT", -2.0)),
        ];

        let out = score_batch(items, Some(&artifacts)).unwrap();
        assert_eq!(out.len(), 4);
        let symbols: Vec<&str> = out.iter().filter_map(|e| e.symbol().as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "BAD", UNKNOWN_SYMBOL, "MSFT"]);

        assert!(matches!(out[0], BatchEntry::Scored { .. }));
        assert!(matches!(
            &out[1],
            BatchEntry::Failed { error, .. } if error.contains("invalid type")
        ));
        assert!(matches!(out[2], BatchEntry::Scored { .. }));
        assert!(matches!(out[3], BatchEntry::Scored { .. }));
    }

    #[test]
    fn batch_echoes_non_string_symbols_unchanged() {
        let artifacts = artifacts();
        let items = vec![
            BatchItem {
                symbol: Some(json!(123)),
                snapshot: Ok(snap("ignored", 1.0)),
            },
            BatchItem {
                symbol: Some(json!({"crm_id": 7})),
                snapshot: Err("bad row".to_string()),
            },
            BatchItem {
                symbol: Some(Value::Null),
                snapshot: Ok(RawStockSnapshot::default()),
            },
        ];

        let out = score_batch(items, Some(&artifacts)).unwrap();
        assert_eq!(out[0].symbol(), &json!(123));
        assert!(matches!(out[0], BatchEntry::Scored { .. }));
        assert_eq!(out[1].symbol(), &json!({"crm_id": 7}));
        assert_eq!(out[2].symbol(), &json!(UNKNOWN_SYMBOL));
    }

    #[test]
    fn batch_with_every_item_failing_still_returns_all_entries() {
        let mut artifacts = artifacts();
        artifacts.feature_names.push("extra".to_string());

        let items: Vec<BatchItem> = (0..5).map(|i| snap(&format!("S{i}"), 1.0).into()).collect();
        let out = score_batch(items, Some(&artifacts)).unwrap();
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|e| matches!(e, BatchEntry::Failed { .. })));
    }

    #[test]
    fn empty_batch_is_invalid_input() {
        let artifacts = artifacts();
        assert!(matches!(
            score_batch(Vec::new(), Some(&artifacts)),
            Err(ScoringError::InvalidInput(_))
        ));
    }

    #[test]
    fn batch_requires_loaded_model() {
        let items = vec![BatchItem::from(snap("AAPL", 1.0))];
        assert_eq!(score_batch(items, None), Err(ScoringError::ModelNotLoaded));
    }
}
