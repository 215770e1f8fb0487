use serde::{Deserialize, Serialize};

/// Raw market fields as sent by the CRM integration. Every field is optional at the boundary;
/// defaults are applied by [`crate::features::derive_features`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStockSnapshot {
    pub symbol: Option<String>,
    pub day_change_percent: Option<f64>,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub current_price: Option<f64>,
    pub previous_close: Option<f64>,
}

/// Named model inputs derived from a [`RawStockSnapshot`].
///
/// Field order matches [`crate::features::FEATURE_NAMES`], so the serialized object lists
/// features in training order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatureSet {
    pub day_change_percent: f64,
    pub volume: f64,
    pub market_cap: f64,
    pub current_price: f64,
    pub price_volatility: f64,
    pub volume_ratio: f64,
    pub price_change_ratio: f64,
}

impl DerivedFeatureSet {
    pub fn get(&self, name: &str) -> Option<f64> {
        let v = match name {
            "day_change_percent" => self.day_change_percent,
            "volume" => self.volume,
            "market_cap" => self.market_cap,
            "current_price" => self.current_price,
            "price_volatility" => self.price_volatility,
            "volume_ratio" => self.volume_ratio,
            "price_change_ratio" => self.price_change_ratio,
            _ => return None,
        };
        Some(v)
    }
}
