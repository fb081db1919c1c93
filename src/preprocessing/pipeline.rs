//! Column-wise preprocessing stage
//!
//! Numeric columns are mean-imputed then standardized; categorical columns
//! are filled with a constant then one-hot encoded. The output matrix holds
//! the numeric block first, followed by the indicator block.

use super::{
    config::PreprocessingConfig,
    encoder::Encoder,
    frame::{ColumnValues, Frame},
    imputer::Imputer,
    scaler::Scaler,
};
use crate::error::{ComparatorError, Result};
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPreprocessor {
    config: PreprocessingConfig,
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    numeric_imputer: Imputer,
    categorical_imputer: Imputer,
    scaler: Scaler,
    encoder: Encoder,
    is_fitted: bool,
}

impl Default for DataPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DataPreprocessor {
    /// Create a new preprocessor with default configuration
    pub fn new() -> Self {
        Self::with_config(PreprocessingConfig::default())
    }

    pub fn with_config(config: PreprocessingConfig) -> Self {
        Self {
            numeric_imputer: Imputer::new(config.numeric_impute_strategy.clone()),
            categorical_imputer: Imputer::new(config.categorical_impute_strategy.clone()),
            scaler: Scaler::new(config.scaler_type.clone()),
            encoder: Encoder::new(config.drop_first_category),
            numeric_columns: Vec::new(),
            categorical_columns: Vec::new(),
            config,
            is_fitted: false,
        }
    }

    /// Fit every stage on the training frame
    pub fn fit(&mut self, frame: &Frame) -> Result<&mut Self> {
        self.numeric_columns = frame.numeric_names();
        self.categorical_columns = frame.categorical_names();

        let filled = self.numeric_imputer.fit_transform(frame, &self.numeric_columns)?;
        self.scaler.fit(&filled, &self.numeric_columns)?;

        let filled = self
            .categorical_imputer
            .fit_transform(frame, &self.categorical_columns)?;
        self.encoder.fit(&filled, &self.categorical_columns)?;

        self.is_fitted = true;
        debug!(
            numeric = self.numeric_columns.len(),
            categorical = self.categorical_columns.len(),
            outputs = self.n_features_out(),
            "Preprocessor fitted"
        );
        Ok(self)
    }

    /// Apply the fitted stages and assemble the model matrix
    pub fn transform(&self, frame: &Frame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ComparatorError::ModelNotFitted);
        }

        let n_numeric = self.numeric_columns.len();
        let mut out = Array2::zeros((frame.n_rows(), self.n_features_out()));

        let numeric = self.scaler.transform(&self.numeric_imputer.transform(frame)?)?;
        for (j, name) in self.numeric_columns.iter().enumerate() {
            let column = numeric
                .column(name)
                .ok_or_else(|| ComparatorError::Data(format!("Feature not found: {}", name)))?;
            let ColumnValues::Numeric(values) = &column.values else {
                return Err(ComparatorError::Data(format!(
                    "Column '{}' is no longer numeric",
                    name
                )));
            };
            for (i, v) in values.iter().enumerate() {
                out[[i, j]] = v.unwrap_or(0.0);
            }
        }

        let categorical = self.categorical_imputer.transform(frame)?;
        let encoded = self.encoder.transform(&categorical)?;
        out.slice_mut(s![.., n_numeric..]).assign(&encoded);

        Ok(out)
    }

    pub fn fit_transform(&mut self, frame: &Frame) -> Result<Array2<f64>> {
        self.fit(frame)?;
        self.transform(frame)
    }

    /// Output column names: numeric names unchanged, then `<column>_<category>`
    pub fn feature_names_out(&self) -> Vec<String> {
        let mut names = self.numeric_columns.clone();
        names.extend(self.encoder.feature_names_out());
        names
    }

    pub fn n_features_out(&self) -> usize {
        self.numeric_columns.len() + self.encoder.n_outputs()
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
