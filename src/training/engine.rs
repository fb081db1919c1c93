//! Train-and-evaluate orchestration

use super::config::{ModelType, TrainerConfig};
use super::estimator::Estimator;
use super::models::{Model, RegressionMetrics};
use crate::error::{ComparatorError, Result};
use crate::explainability::{extract_importance, ImportanceMethod};
use crate::preprocessing::{numeric_values, DataPreprocessor, Frame};
use crate::utils::{is_numeric_dtype, load_csv_path, missing_values};
use ndarray::Array1;
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Preprocessing stage and estimator fitted together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub model_type: ModelType,
    pub target_column: String,
    /// Raw feature columns in training order
    pub feature_columns: Vec<String>,
    pub preprocessor: DataPreprocessor,
    pub estimator: Estimator,
}

impl FittedPipeline {
    /// Predict from raw (unpreprocessed) feature columns
    pub fn predict_frame(&self, frame: &Frame) -> Result<Array1<f64>> {
        let x = self.preprocessor.transform(frame)?;
        self.estimator.predict(&x)
    }

    /// Predict for every row of a polars frame holding the training feature columns
    pub fn predict_dataframe(&self, df: &DataFrame) -> Result<Array1<f64>> {
        if let Some(missing) = self
            .feature_columns
            .iter()
            .find(|name| df.column(name.as_str()).is_err())
        {
            return Err(ComparatorError::Validation(format!(
                "Feature column '{}' not found in input",
                missing
            )));
        }
        let (frame, _) = Frame::from_dataframe(df, &[self.target_column.as_str()])?;
        self.predict_frame(&frame)
    }

    /// Expanded feature names produced by the preprocessing stage
    pub fn feature_names_out(&self) -> Vec<String> {
        self.preprocessor.feature_names_out()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let pipeline: Self = serde_json::from_str(&json)?;
        Ok(pipeline)
    }
}

/// Held-out targets and their predictions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScatterData {
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
}

/// Metadata describing a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Raw feature columns used
    pub n_features: usize,
    /// Columns after one-hot expansion
    pub n_features_expanded: usize,
    pub n_samples_train: usize,
    pub n_samples_test: usize,
    pub feature_names: Vec<String>,
    pub numeric_features: Vec<String>,
    pub categorical_features: Vec<String>,
    /// Columns skipped because of their storage type
    pub ignored_features: Vec<String>,
    pub total_samples: usize,
    pub samples_after_cleaning: usize,
    pub dropped_samples: usize,
    pub missing_values_before_cleaning: BTreeMap<String, usize>,
    pub missing_values_after_cleaning: BTreeMap<String, usize>,
    pub feature_importance_method: ImportanceMethod,
    pub has_coef: bool,
    pub has_feature_importances: bool,
    pub has_predict: bool,
    pub model_type: ModelType,
    pub training_time_secs: f64,
}

/// Everything produced by one train-and-evaluate run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub pipeline: FittedPipeline,
    pub metrics: RegressionMetrics,
    pub feature_importance: BTreeMap<String, f64>,
    pub scatter_data: ScatterData,
    pub model_info: ModelInfo,
}

/// Builds, fits and evaluates preprocessing + estimator pipelines
#[derive(Debug, Clone, Default)]
pub struct TrainEngine {
    config: TrainerConfig,
}

impl TrainEngine {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Load a CSV from disk and run [`TrainEngine::train_and_evaluate`]
    pub fn train_csv(
        &self,
        path: impl AsRef<Path>,
        target_column: &str,
        model_type: ModelType,
        hyperparameters: &Map<String, Value>,
    ) -> Result<TrainingOutcome> {
        let df = load_csv_path(path)?;
        self.train_and_evaluate(&df, target_column, model_type, hyperparameters)
    }

    /// Number of usable (non-missing, finite) target values.
    ///
    /// Fails if the column is absent or not numeric.
    pub fn usable_target_rows(&self, df: &DataFrame, target_column: &str) -> Result<usize> {
        Ok(target_values(df, target_column)?
            .iter()
            .filter(|v| v.is_some())
            .count())
    }

    pub fn train_and_evaluate(
        &self,
        df: &DataFrame,
        target_column: &str,
        model_type: ModelType,
        hyperparameters: &Map<String, Value>,
    ) -> Result<TrainingOutcome> {
        let start = Instant::now();
        info!(
            model_type = %model_type,
            target = target_column,
            rows = df.height(),
            "Starting training run"
        );

        // Build the estimator first so configuration errors surface before any work
        let mut estimator = Estimator::from_hyperparameters(model_type, hyperparameters)?;

        let target = target_values(df, target_column)?;
        let missing_before = missing_values(df);

        let mask: BooleanChunked = target.iter().map(Option::is_some).collect();
        let cleaned = df.filter(&mask)?;
        let y: Array1<f64> = target.into_iter().flatten().collect();

        debug!(
            kept = cleaned.height(),
            dropped = df.height() - cleaned.height(),
            "Dropped rows with missing target"
        );

        if cleaned.height() < self.config.min_rows {
            return Err(ComparatorError::InsufficientData {
                available: cleaned.height(),
                required: self.config.min_rows,
            });
        }

        let (frame, ignored) = Frame::from_dataframe(&cleaned, &[target_column])?;
        if frame.n_columns() == 0 {
            return Err(ComparatorError::Training(
                "No numeric or categorical feature columns available".to_string(),
            ));
        }

        let (train_idx, test_idx) = self.split_indices(frame.n_rows());
        let x_train_raw = frame.take(&train_idx);
        let x_test_raw = frame.take(&test_idx);
        let y_train: Array1<f64> = train_idx.iter().map(|&i| y[i]).collect();
        let y_test: Array1<f64> = test_idx.iter().map(|&i| y[i]).collect();

        let mut preprocessor = DataPreprocessor::new();
        let x_train = preprocessor
            .fit_transform(&x_train_raw)
            .map_err(ComparatorError::into_training)?;
        estimator
            .fit(&x_train, &y_train)
            .map_err(ComparatorError::into_training)?;

        let pipeline = FittedPipeline {
            model_type,
            target_column: target_column.to_string(),
            feature_columns: frame.column_names(),
            preprocessor,
            estimator,
        };

        let y_pred = pipeline
            .predict_frame(&x_test_raw)
            .map_err(ComparatorError::into_training)?;
        let metrics = RegressionMetrics::compute(&y_test, &y_pred);
        if !metrics.is_finite() {
            return Err(ComparatorError::Training(
                "Model produced non-finite predictions".to_string(),
            ));
        }

        let method = ImportanceMethod::for_model(&pipeline.estimator);
        let feature_importance = extract_importance(
            &pipeline,
            &x_test_raw,
            &y_test,
            self.config.permutation_repeats,
            self.config.random_state,
        );

        let model_info = ModelInfo {
            n_features: frame.n_columns(),
            n_features_expanded: pipeline.preprocessor.n_features_out(),
            n_samples_train: train_idx.len(),
            n_samples_test: test_idx.len(),
            feature_names: frame.column_names(),
            numeric_features: frame.numeric_names(),
            categorical_features: frame.categorical_names(),
            ignored_features: ignored,
            total_samples: df.height(),
            samples_after_cleaning: cleaned.height(),
            dropped_samples: df.height() - cleaned.height(),
            missing_values_before_cleaning: missing_before,
            missing_values_after_cleaning: missing_values(&cleaned),
            feature_importance_method: method,
            has_coef: pipeline.estimator.coefficients().is_some(),
            has_feature_importances: pipeline.estimator.feature_importances().is_some(),
            has_predict: true,
            model_type,
            training_time_secs: start.elapsed().as_secs_f64(),
        };

        info!(
            model_type = %model_type,
            r2_score = metrics.r2_score,
            rmse = metrics.rmse,
            importance_method = method.as_str(),
            elapsed_secs = model_info.training_time_secs,
            "Training run finished"
        );

        Ok(TrainingOutcome {
            pipeline,
            metrics,
            feature_importance,
            scatter_data: ScatterData {
                actual: y_test.to_vec(),
                predicted: y_pred.to_vec(),
            },
            model_info,
        })
    }

    /// Seeded shuffle; the first ceil(test_size * n) rows form the test split
    fn split_indices(&self, n: usize) -> (Vec<usize>, Vec<usize>) {
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
        indices.shuffle(&mut rng);

        let n_test = ((n as f64 * self.config.test_size).ceil() as usize).clamp(1, n.saturating_sub(1).max(1));
        let train = indices.split_off(n_test);
        (train, indices)
    }
}

/// Target column as `f64`, with missing and non-finite values as `None`
fn target_values(df: &DataFrame, target_column: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(target_column).map_err(|_| {
        ComparatorError::Validation(format!(
            "Target column '{}' not found in dataset",
            target_column
        ))
    })?;
    if !is_numeric_dtype(column.dtype()) {
        return Err(ComparatorError::Validation(format!(
            "Target column '{}' must be numeric",
            target_column
        )));
    }
    Ok(numeric_values(column)?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}
