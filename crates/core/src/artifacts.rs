use crate::error::ArtifactError;
use crate::features::{feature_schema_hash, FEATURE_NAMES};
use crate::model::forest::{ForestParams, RandomForestRegressor};
use crate::model::metrics::RegressionMetrics;
use crate::model::scaler::StandardScaler;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bumped whenever the on-disk layout of any artifact file changes.
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

pub const MODEL_FILE: &str = "risk_model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const FEATURE_NAMES_FILE: &str = "feature_names.json";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub schema_version: u32,
    pub feature_schema_hash: String,
    pub feature_count: usize,
    pub trained_at: DateTime<Utc>,
    pub samples: usize,
    pub seed: u64,
    pub forest: ForestParams,
    pub metrics: RegressionMetrics,
}

/// Everything inference needs: regressor, scaler and the feature order they were fit on.
/// Built once (by the trainer or [`ModelArtifacts::load`]) and never mutated.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub regressor: RandomForestRegressor,
    pub scaler: StandardScaler,
    pub feature_names: Vec<String>,
    pub manifest: ArtifactManifest,
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub feature_names: PathBuf,
    pub manifest: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            model: dir.join(MODEL_FILE),
            scaler: dir.join(SCALER_FILE),
            feature_names: dir.join(FEATURE_NAMES_FILE),
            manifest: dir.join(MANIFEST_FILE),
        }
    }
}

impl ModelArtifacts {
    pub fn save(&self, dir: &Path) -> anyhow::Result<ArtifactPaths> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create artifact dir {}", dir.display()))?;

        let paths = ArtifactPaths::in_dir(dir);
        write_json(&paths.model, &self.regressor, false)?;
        write_json(&paths.scaler, &self.scaler, false)?;
        write_json(&paths.feature_names, &self.feature_names, true)?;
        write_json(&paths.manifest, &self.manifest, true)?;
        Ok(paths)
    }

    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let paths = ArtifactPaths::in_dir(dir);
        let artifacts = Self {
            manifest: read_json(&paths.manifest)?,
            feature_names: read_json(&paths.feature_names)?,
            scaler: read_json(&paths.scaler)?,
            regressor: read_json(&paths.model)?,
        };
        artifacts.validate()?;
        Ok(artifacts)
    }

    /// Rejects bundles whose feature list, manifest and fitted shapes disagree with each
    /// other or with the features this build derives.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.manifest.schema_version != ARTIFACT_SCHEMA_VERSION {
            return Err(ArtifactError::SchemaMismatch(format!(
                "artifact schema version {} is not supported (expected {ARTIFACT_SCHEMA_VERSION})",
                self.manifest.schema_version
            )));
        }

        let recorded = feature_schema_hash(&self.feature_names);
        if recorded != self.manifest.feature_schema_hash {
            return Err(ArtifactError::SchemaMismatch(format!(
                "feature_names.json fingerprint {recorded} does not match manifest {}",
                self.manifest.feature_schema_hash
            )));
        }

        let expected = feature_schema_hash(&FEATURE_NAMES[..]);
        if recorded != expected {
            return Err(ArtifactError::SchemaMismatch(format!(
                "trained feature order {:?} does not match served order {:?}",
                self.feature_names, FEATURE_NAMES
            )));
        }

        let widths = [
            ("feature_names", self.feature_names.len()),
            ("manifest", self.manifest.feature_count),
            ("scaler", self.scaler.n_features()),
            ("regressor", self.regressor.n_features()),
        ];
        if widths.iter().any(|(_, w)| *w != FEATURE_NAMES.len()) {
            return Err(ArtifactError::SchemaMismatch(format!(
                "feature counts disagree: {widths:?}"
            )));
        }

        self.scaler.validate()?;
        self.regressor.validate()?;
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> anyhow::Result<()> {
    let bytes = (if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    })
    .with_context(|| format!("failed to serialize {}", path.display()))?;
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
        path: path.display().to_string(),
        source,
    })
}
