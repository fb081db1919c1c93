//! Model trait and evaluation metrics

use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Regression metrics on a held-out split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2_score: f64,
    pub mse: f64,
    pub mae: f64,
    pub rmse: f64,
}

impl RegressionMetrics {
    /// Compute regression metrics.
    ///
    /// R² is 0 when `y_true` has zero variance.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len() as f64;
        if y_true.is_empty() {
            return Self {
                r2_score: 0.0,
                mse: 0.0,
                mae: 0.0,
                rmse: 0.0,
            };
        }

        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean: f64 = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();

        let r2_score = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Self {
            r2_score,
            mse,
            mae,
            rmse: mse.sqrt(),
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.r2_score, self.mse, self.mae, self.rmse]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// R² of `y_pred` against `y_true`
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    RegressionMetrics::compute(y_true, y_pred).r2_score
}

/// Trait for regression estimators
pub trait Model: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Built-in importance scores, one per input column (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Linear coefficients, one per input column (if available)
    fn coefficients(&self) -> Option<Array1<f64>> {
        None
    }

    fn intercept(&self) -> Option<f64> {
        None
    }
}
