use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use stockrisk_core::artifacts::ModelArtifacts;
use stockrisk_core::domain::score::{BatchEntry, RiskLevel};
use stockrisk_core::domain::snapshot::{DerivedFeatureSet, RawStockSnapshot};
use stockrisk_core::error::{ArtifactError, ScoringError};
use stockrisk_core::features::derive_features;
use stockrisk_core::scoring::{score, score_batch, BatchItem};

#[derive(Debug, Clone, Default)]
pub struct AppState {
    model: Option<Arc<ModelArtifacts>>,
}

impl AppState {
    pub fn with_model(model: ModelArtifacts) -> Self {
        Self {
            model: Some(Arc::new(model)),
        }
    }

    /// Loads the artifact bundle once. Any failure leaves the state without a model so the
    /// server still starts and reports `model_loaded: false`.
    pub fn load(model_dir: &Path) -> Self {
        match ModelArtifacts::load(model_dir) {
            Ok(model) => {
                tracing::info!(
                    model_dir = %model_dir.display(),
                    trained_at = %model.manifest.trained_at,
                    feature_schema_hash = %model.manifest.feature_schema_hash,
                    "model loaded"
                );
                Self::with_model(model)
            }
            Err(e) => {
                if matches!(e, ArtifactError::SchemaMismatch(_)) {
                    tracing::error!(
                        model_dir = %model_dir.display(),
                        error = %e,
                        "artifact schema mismatch; retrain the model. starting API in degraded mode"
                    );
                } else {
                    tracing::error!(
                        model_dir = %model_dir.display(),
                        error = %e,
                        "model load failed; starting API in degraded mode"
                    );
                }
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                Self::default()
            }
        }
    }

    fn model(&self) -> Option<&ModelArtifacts> {
        self.model.as_deref()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/predict/batch", post(predict_batch))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn from_scoring(err: ScoringError, context: &str) -> Self {
        match err {
            ScoringError::ModelNotLoaded => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: err.to_string(),
            },
            ScoringError::InvalidInput(message) => Self {
                status: StatusCode::BAD_REQUEST,
                message,
            },
            ScoringError::Inference(detail) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("{context}: {detail}"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "request failed");
        } else {
            tracing::debug!(status = %self.status, error = %self.message, "request rejected");
        }
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_loaded: state.model.is_some(),
    })
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    risk_score: f64,
    risk_level: RiskLevel,
    features_used: DerivedFeatureSet,
}

async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictResponse>, ApiError> {
    const CONTEXT: &str = "Prediction error";

    let model = state
        .model()
        .ok_or_else(|| ApiError::from_scoring(ScoringError::ModelNotLoaded, CONTEXT))?;

    let snapshot = parse_snapshot(&body).map_err(|e| ApiError::from_scoring(e, CONTEXT))?;
    let features = derive_features(&snapshot);
    let scored = score(&features, Some(model)).map_err(|e| ApiError::from_scoring(e, CONTEXT))?;

    Ok(Json(PredictResponse {
        risk_score: scored.risk_score,
        risk_level: scored.risk_level,
        features_used: features,
    }))
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    results: Vec<BatchEntry>,
    count: usize,
}

async fn predict_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BatchResponse>, ApiError> {
    const CONTEXT: &str = "Batch prediction error";

    let model = state
        .model()
        .ok_or_else(|| ApiError::from_scoring(ScoringError::ModelNotLoaded, CONTEXT))?;

    let stocks = parse_stocks(&body).map_err(|e| ApiError::from_scoring(e, CONTEXT))?;
    let items: Vec<BatchItem> = stocks.into_iter().map(to_batch_item).collect();

    let results =
        score_batch(items, Some(model)).map_err(|e| ApiError::from_scoring(e, CONTEXT))?;
    Ok(Json(BatchResponse {
        count: results.len(),
        results,
    }))
}

fn parse_object(
    body: &[u8],
    empty_message: &str,
) -> Result<serde_json::Map<String, Value>, ScoringError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ScoringError::InvalidInput(empty_message.to_string()));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ScoringError::InvalidInput(format!("Invalid JSON body: {e}")))?;

    match value {
        Value::Object(map) if !map.is_empty() => Ok(map),
        Value::Object(_) | Value::Null => {
            Err(ScoringError::InvalidInput(empty_message.to_string()))
        }
        _ => Err(ScoringError::InvalidInput(
            "Request body must be a JSON object".to_string(),
        )),
    }
}

fn parse_snapshot(body: &[u8]) -> Result<RawStockSnapshot, ScoringError> {
    let mut map = parse_object(body, "No data provided")?;
    // Scoring never reads the symbol; any JSON type is accepted.
    map.remove("symbol");
    serde_json::from_value(Value::Object(map))
        .map_err(|e| ScoringError::InvalidInput(format!("Invalid stock data: {e}")))
}

fn parse_stocks(body: &[u8]) -> Result<Vec<Value>, ScoringError> {
    const NO_STOCKS: &str = "No stocks provided";

    let mut map = parse_object(body, NO_STOCKS)?;
    match map.remove("stocks") {
        Some(Value::Array(stocks)) => Ok(stocks),
        None | Some(Value::Null) => Err(ScoringError::InvalidInput(NO_STOCKS.to_string())),
        Some(_) => Err(ScoringError::InvalidInput(
            "stocks must be a JSON array".to_string(),
        )),
    }
}

/// Splits the caller's `symbol` off before reading the numeric fields so it is echoed as sent,
/// and a non-string symbol cannot fail the item.
fn to_batch_item(value: Value) -> BatchItem {
    match value {
        Value::Object(mut map) => {
            let symbol = map.remove("symbol");
            let snapshot = serde_json::from_value::<RawStockSnapshot>(Value::Object(map))
                .map_err(|e| e.to_string());
            BatchItem { symbol, snapshot }
        }
        other => BatchItem {
            symbol: None,
            snapshot: serde_json::from_value::<RawStockSnapshot>(other).map_err(|e| e.to_string()),
        },
    }
}
