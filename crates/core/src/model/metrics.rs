use super::ModelError;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Held-out regression quality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub r2: f64,
    pub rmse: f64,
}

impl RegressionMetrics {
    pub fn compute(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<Self, ModelError> {
        if y_true.len() != y_pred.len() {
            return Err(ModelError::ShapeMismatch {
                expected: y_true.len(),
                got: y_pred.len(),
            });
        }
        if y_true.is_empty() {
            return Err(ModelError::InvalidTrainingData(
                "cannot evaluate on an empty split".to_string(),
            ));
        }

        let n = y_true.len() as f64;
        let mean = y_true.sum() / n;
        let ss_res: f64 = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p).powi(2))
            .sum();
        let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

        let mse = ss_res / n;
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Ok(Self {
            mse,
            r2,
            rmse: mse.sqrt(),
        })
    }
}
