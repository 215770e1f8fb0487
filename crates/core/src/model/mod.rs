pub mod forest;
pub mod metrics;
pub mod scaler;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("X has {got} features, but the model expects {expected} features")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("invalid training data: {0}")]
    InvalidTrainingData(String),

    #[error("malformed model: {0}")]
    Malformed(String),
}
