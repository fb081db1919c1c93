//! Feature importance: native scores, coefficient magnitudes, or permutation

use crate::error::{ComparatorError, Result};
use crate::preprocessing::Frame;
use crate::training::{r2_score, FittedPipeline, Model};
use ndarray::Array1;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Strategy used to score features, chosen from estimator capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportanceMethod {
    /// Built-in importances of tree ensembles
    #[serde(rename = "feature_importances_")]
    FeatureImportances,
    /// Normalized absolute linear coefficients
    #[serde(rename = "coefficients")]
    Coefficients,
    #[serde(rename = "permutation")]
    Permutation,
    #[serde(rename = "none")]
    Unavailable,
}

impl ImportanceMethod {
    /// Native importances win over coefficients, which win over permutation
    pub fn for_model<M: Model + ?Sized>(model: &M) -> Self {
        if model.feature_importances().is_some() {
            ImportanceMethod::FeatureImportances
        } else if model.coefficients().is_some() {
            ImportanceMethod::Coefficients
        } else {
            ImportanceMethod::Permutation
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportanceMethod::FeatureImportances => "feature_importances_",
            ImportanceMethod::Coefficients => "coefficients",
            ImportanceMethod::Permutation => "permutation",
            ImportanceMethod::Unavailable => "none",
        }
    }
}

/// Result of permutation importance computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceResult {
    pub feature_names: Vec<String>,
    /// Mean drop in score over the repeats
    pub importances_mean: Vec<f64>,
    pub importances_std: Vec<f64>,
}

/// Permutation importance over the raw columns of a [`Frame`].
///
/// Each column is shuffled in turn and the whole prediction function is
/// re-applied, so categorical columns are scored as a single feature.
pub struct PermutationImportance<F>
where
    F: Fn(&Frame) -> Result<Array1<f64>> + Sync,
{
    predict_fn: F,
    n_repeats: usize,
    seed: u64,
}

impl<F> PermutationImportance<F>
where
    F: Fn(&Frame) -> Result<Array1<f64>> + Sync,
{
    pub fn new(predict_fn: F) -> Self {
        Self {
            predict_fn,
            n_repeats: 10,
            seed: 42,
        }
    }

    pub fn with_n_repeats(mut self, n_repeats: usize) -> Self {
        self.n_repeats = n_repeats.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Score each column by the R² lost when it is shuffled
    pub fn compute(&self, frame: &Frame, y: &Array1<f64>) -> Result<ImportanceResult> {
        let baseline = r2_score(y, &(self.predict_fn)(frame)?);
        let n_rows = frame.n_rows();

        let per_column: Vec<Vec<f64>> = (0..frame.n_columns())
            .into_par_iter()
            .map(|idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(idx as u64));
                let values = &frame.columns()[idx].values;
                let mut order: Vec<usize> = (0..n_rows).collect();

                (0..self.n_repeats)
                    .map(|_| {
                        order.shuffle(&mut rng);
                        let permuted = frame.with_values(idx, values.take(&order))?;
                        let score = r2_score(y, &(self.predict_fn)(&permuted)?);
                        Ok(baseline - score)
                    })
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<_>>()?;

        let importances_mean: Vec<f64> = per_column
            .iter()
            .map(|scores| scores.iter().sum::<f64>() / scores.len() as f64)
            .collect();
        let importances_std: Vec<f64> = per_column
            .iter()
            .zip(&importances_mean)
            .map(|(scores, mean)| {
                let variance =
                    scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
                variance.sqrt()
            })
            .collect();

        Ok(ImportanceResult {
            feature_names: frame.column_names(),
            importances_mean,
            importances_std,
        })
    }
}

/// Feature importance mapping for a fitted pipeline.
///
/// Any failure (length mismatch, zero or non-finite total, prediction
/// error) degrades to an empty mapping.
pub fn extract_importance(
    pipeline: &FittedPipeline,
    x_test: &Frame,
    y_test: &Array1<f64>,
    n_repeats: usize,
    seed: u64,
) -> BTreeMap<String, f64> {
    let method = ImportanceMethod::for_model(&pipeline.estimator);
    match try_extract(method, pipeline, x_test, y_test, n_repeats, seed) {
        Ok(importance) => {
            debug!(method = method.as_str(), n_features = importance.len(), "Computed feature importance");
            importance
        }
        Err(e) => {
            warn!(method = method.as_str(), error = %e, "No feature importance calculated");
            BTreeMap::new()
        }
    }
}

fn try_extract(
    method: ImportanceMethod,
    pipeline: &FittedPipeline,
    x_test: &Frame,
    y_test: &Array1<f64>,
    n_repeats: usize,
    seed: u64,
) -> Result<BTreeMap<String, f64>> {
    let estimator = &pipeline.estimator;
    match method {
        ImportanceMethod::FeatureImportances => {
            let values = estimator.feature_importances().unwrap_or_default();
            zip_normalized(pipeline.feature_names_out(), values.to_vec())
        }
        ImportanceMethod::Coefficients => {
            let values = estimator.coefficients().unwrap_or_default();
            let mut importance = zip_normalized(pipeline.feature_names_out(), values.to_vec())?;
            if let Some(intercept) = estimator.intercept() {
                importance.insert("intercept".to_string(), intercept.abs());
            }
            Ok(importance)
        }
        ImportanceMethod::Permutation => {
            let result = PermutationImportance::new(|frame: &Frame| pipeline.predict_frame(frame))
                .with_n_repeats(n_repeats)
                .with_seed(seed)
                .compute(x_test, y_test)?;
            zip_normalized(result.feature_names, result.importances_mean)
        }
        ImportanceMethod::Unavailable => Ok(BTreeMap::new()),
    }
}

/// Pair names with absolute values scaled to sum to 1
fn zip_normalized(names: Vec<String>, values: Vec<f64>) -> Result<BTreeMap<String, f64>> {
    if names.len() != values.len() {
        return Err(ComparatorError::Shape {
            expected: format!("{} importance values", names.len()),
            actual: format!("{} importance values", values.len()),
        });
    }

    let total: f64 = values.iter().map(|v| v.abs()).sum();
    if !(total > 0.0 && total.is_finite()) {
        return Err(ComparatorError::Training(format!(
            "Importance values cannot be normalized (sum = {})",
            total
        )));
    }

    Ok(names
        .into_iter()
        .zip(values)
        .map(|(name, v)| (name, v.abs() / total))
        .collect())
}
