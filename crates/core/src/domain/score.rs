use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const LOW_RISK_CEILING: f64 = 30.0;
pub const MEDIUM_RISK_CEILING: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score < LOW_RISK_CEILING {
            RiskLevel::Low
        } else if score < MEDIUM_RISK_CEILING {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
}

impl ScoredResult {
    /// Clamps a raw model output to `[0, 100]`, rounds it to two decimals (ties to even) and
    /// buckets the rounded value, so the reported score and level always agree.
    pub fn from_raw(raw: f64) -> Self {
        let clamped = raw.clamp(0.0, 100.0);
        let risk_score = (clamped * 100.0).round_ties_even() / 100.0;
        Self {
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
        }
    }
}

/// One entry of a batch response. Failed items keep their slot and carry the message instead
/// of a score. `symbol` is the caller's value echoed as sent, whatever its JSON type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Scored {
        symbol: Value,
        risk_score: f64,
        risk_level: RiskLevel,
    },
    Failed {
        symbol: Value,
        error: String,
    },
}

impl BatchEntry {
    pub fn symbol(&self) -> &Value {
        match self {
            BatchEntry::Scored { symbol, .. } | BatchEntry::Failed { symbol, .. } => symbol,
        }
    }
}
