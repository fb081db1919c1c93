//! Model type registry, hyperparameter allow-lists and orchestration settings

use crate::error::{ComparatorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Supported regression model types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    LinearRegression,
    RandomForest,
    Knn,
    Svr,
    Xgboost,
}

impl ModelType {
    pub const ALL: [ModelType; 5] = [
        ModelType::LinearRegression,
        ModelType::RandomForest,
        ModelType::Knn,
        ModelType::Svr,
        ModelType::Xgboost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::LinearRegression => "linear_regression",
            ModelType::RandomForest => "random_forest",
            ModelType::Knn => "knn",
            ModelType::Svr => "svr",
            ModelType::Xgboost => "xgboost",
        }
    }

    /// Hyperparameter names accepted for this model type
    pub fn allowed_hyperparameters(&self) -> &'static [&'static str] {
        match self {
            ModelType::LinearRegression => &["fit_intercept", "normalize", "n_jobs"],
            ModelType::RandomForest => &[
                "n_estimators",
                "max_depth",
                "min_samples_split",
                "min_samples_leaf",
                "max_features",
                "random_state",
                "n_jobs",
            ],
            ModelType::Knn => &["n_neighbors", "weights", "algorithm", "leaf_size"],
            ModelType::Svr => &["kernel", "C", "epsilon", "gamma"],
            ModelType::Xgboost => &[
                "n_estimators",
                "max_depth",
                "learning_rate",
                "subsample",
                "colsample_bytree",
            ],
        }
    }

    /// Reject any key outside the allow-list
    pub fn validate_hyperparameters(&self, params: &Map<String, Value>) -> Result<()> {
        let allowed = self.allowed_hyperparameters();
        match params.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(ComparatorError::Validation(format!(
                "Invalid hyperparameter '{}' for model type '{}'",
                key, self
            ))),
            None => Ok(()),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = ComparatorError;

    fn from_str(s: &str) -> Result<Self> {
        ModelType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ComparatorError::Config(format!("Unsupported model type: {}", s)))
    }
}

/// Settings for a train-and-evaluate run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Rows with a usable target required before training
    pub min_rows: usize,
    /// Fraction of rows held out for evaluation
    pub test_size: f64,
    /// Seed for the split and permutation importance
    pub random_state: u64,
    pub permutation_repeats: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            min_rows: 50,
            test_size: 0.2,
            random_state: 42,
            permutation_repeats: 10,
        }
    }
}

impl TrainerConfig {
    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows;
        self
    }

    pub fn with_permutation_repeats(mut self, repeats: usize) -> Self {
        self.permutation_repeats = repeats.max(1);
        self
    }
}

/// Typed accessors over a hyperparameter mapping.
///
/// A missing key and an explicit `null` both read as `None`.
pub(crate) struct HyperParams<'a> {
    model_type: ModelType,
    params: &'a Map<String, Value>,
}

impl<'a> HyperParams<'a> {
    pub(crate) fn new(model_type: ModelType, params: &'a Map<String, Value>) -> Self {
        Self { model_type, params }
    }

    pub(crate) fn raw(&self, key: &str) -> Option<&'a Value> {
        self.params.get(key).filter(|v| !v.is_null())
    }

    pub(crate) fn invalid(&self, key: &str, expected: &str) -> ComparatorError {
        let got = self.params.get(key).map(Value::to_string).unwrap_or_default();
        ComparatorError::Validation(format!(
            "Invalid value for hyperparameter '{}' of model type '{}': expected {}, got {}",
            key, self.model_type, expected, got
        ))
    }

    pub(crate) fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.raw(key)
            .map(|v| v.as_bool().ok_or_else(|| self.invalid(key, "a boolean")))
            .transpose()
    }

    pub(crate) fn get_usize(&self, key: &str) -> Result<Option<usize>> {
        self.raw(key)
            .map(|v| {
                v.as_u64()
                    .map(|n| n as usize)
                    .ok_or_else(|| self.invalid(key, "a non-negative integer"))
            })
            .transpose()
    }

    /// Integer of at least `min`
    pub(crate) fn usize_at_least(&self, key: &str, min: usize) -> Result<Option<usize>> {
        match self.get_usize(key)? {
            Some(n) if n < min => Err(self.invalid(key, &format!("an integer >= {}", min))),
            other => Ok(other),
        }
    }

    pub(crate) fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        self.raw(key)
            .map(|v| v.as_f64().ok_or_else(|| self.invalid(key, "a number")))
            .transpose()
    }

    pub(crate) fn positive_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.get_f64(key)? {
            Some(v) if !(v > 0.0 && v.is_finite()) => Err(self.invalid(key, "a positive number")),
            other => Ok(other),
        }
    }

    /// Number in (0, 1]
    pub(crate) fn fraction(&self, key: &str) -> Result<Option<f64>> {
        match self.get_f64(key)? {
            Some(v) if !(v > 0.0 && v <= 1.0) => Err(self.invalid(key, "a number in (0, 1]")),
            other => Ok(other),
        }
    }

    /// One of `choices`, case-insensitive
    pub(crate) fn choice(&self, key: &str, choices: &[&'static str]) -> Result<Option<&'static str>> {
        let Some(value) = self.raw(key) else {
            return Ok(None);
        };
        let expected = || self.invalid(key, &format!("one of {}", choices.join(", ")));
        let s = value.as_str().ok_or_else(expected)?;
        choices
            .iter()
            .find(|c| c.eq_ignore_ascii_case(s))
            .copied()
            .map(Some)
            .ok_or_else(expected)
    }

    /// Worker count: positive → that many threads; negative or null → default pool
    pub(crate) fn n_jobs(&self, key: &str) -> Result<Option<usize>> {
        let Some(value) = self.raw(key) else {
            return Ok(None);
        };
        match value.as_i64() {
            Some(n) if n > 0 => Ok(Some(n as usize)),
            Some(n) if n < 0 => Ok(None),
            _ => Err(self.invalid(key, "a non-zero integer")),
        }
    }
}
