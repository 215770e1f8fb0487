use crate::model::ModelError;
use thiserror::Error;

/// Failure kinds surfaced by the scoring endpoints.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("Model not loaded. Please train the model first.")]
    ModelNotLoaded,

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Inference(String),
}

/// Failures while reading the artifact bundle from disk.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse artifact {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("artifact schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("invalid model artifact: {0}")]
    Invalid(#[from] ModelError),
}
