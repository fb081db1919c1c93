//! Missing value imputation strategies

use super::frame::{ColumnValues, Frame};
use crate::error::{ComparatorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Strategy for imputing missing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with the training mean (numeric only)
    Mean,
    /// Replace with a constant string (categorical only)
    ConstantString(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum ImputeValue {
    Numeric(f64),
    String(String),
}

/// Imputer for handling missing values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: HashMap<String, ImputeValue>,
    is_fitted: bool,
}

impl Imputer {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Learn one fill value per column
    pub fn fit(&mut self, frame: &Frame, columns: &[String]) -> Result<&mut Self> {
        self.fill_values.clear();
        for name in columns {
            let column = frame
                .column(name)
                .ok_or_else(|| ComparatorError::Data(format!("Feature not found: {}", name)))?;
            let fill_value = self.compute_fill_value(name, &column.values)?;
            self.fill_values.insert(name.clone(), fill_value);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace missing entries in the fitted columns; other columns pass through
    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        if !self.is_fitted {
            return Err(ComparatorError::ModelNotFitted);
        }

        let mut result = frame.clone();
        for (idx, column) in frame.columns().iter().enumerate() {
            let Some(fill_value) = self.fill_values.get(&column.name) else {
                continue;
            };
            let filled = match (&column.values, fill_value) {
                (ColumnValues::Numeric(values), ImputeValue::Numeric(fill)) => ColumnValues::Numeric(
                    values.iter().map(|v| Some(v.unwrap_or(*fill))).collect(),
                ),
                (ColumnValues::Categorical(values), ImputeValue::String(fill)) => {
                    ColumnValues::Categorical(
                        values
                            .iter()
                            .map(|v| Some(v.clone().unwrap_or_else(|| fill.clone())))
                            .collect(),
                    )
                }
                _ => {
                    return Err(ComparatorError::Data(format!(
                        "Column '{}' changed type since the imputer was fitted",
                        column.name
                    )))
                }
            };
            result = result.with_values(idx, filled)?;
        }

        Ok(result)
    }

    pub fn fit_transform(&mut self, frame: &Frame, columns: &[String]) -> Result<Frame> {
        self.fit(frame, columns)?;
        self.transform(frame)
    }

    fn compute_fill_value(&self, name: &str, values: &ColumnValues) -> Result<ImputeValue> {
        match (&self.strategy, values) {
            (ImputeStrategy::Mean, ColumnValues::Numeric(values)) => {
                let present: Vec<f64> = values.iter().flatten().copied().collect();
                // An all-missing column imputes to zero
                let mean = if present.is_empty() {
                    0.0
                } else {
                    present.iter().sum::<f64>() / present.len() as f64
                };
                Ok(ImputeValue::Numeric(mean))
            }
            (ImputeStrategy::ConstantString(fill), ColumnValues::Categorical(_)) => {
                Ok(ImputeValue::String(fill.clone()))
            }
            (strategy, _) => Err(ComparatorError::Data(format!(
                "Imputation strategy {:?} does not apply to column '{}'",
                strategy, name
            ))),
        }
    }
}
