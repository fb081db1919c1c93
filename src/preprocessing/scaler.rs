//! Feature scaling

use super::frame::{ColumnValues, Frame};
use crate::error::{ComparatorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Type of scaler to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// No scaling
    None,
}

/// Parameters for a fitted scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    center: f64,
    scale: f64,
}

/// Feature scaler over numeric frame columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: HashMap<String, ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Fit the scaler on already imputed numeric columns
    pub fn fit(&mut self, frame: &Frame, columns: &[String]) -> Result<&mut Self> {
        self.params.clear();
        for name in columns {
            let column = frame
                .column(name)
                .ok_or_else(|| ComparatorError::Data(format!("Feature not found: {}", name)))?;
            let ColumnValues::Numeric(values) = &column.values else {
                return Err(ComparatorError::Data(format!(
                    "Cannot scale non-numeric column '{}'",
                    name
                )));
            };

            let params = self.compute_params(values);
            self.params.insert(name.clone(), params);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Scale the fitted columns; missing entries stay missing
    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        if !self.is_fitted {
            return Err(ComparatorError::ModelNotFitted);
        }

        let mut result = frame.clone();
        for (idx, column) in frame.columns().iter().enumerate() {
            let (Some(params), ColumnValues::Numeric(values)) =
                (self.params.get(&column.name), &column.values)
            else {
                continue;
            };
            let scaled = values
                .iter()
                .map(|v| v.map(|x| (x - params.center) / params.scale))
                .collect();
            result = result.with_values(idx, ColumnValues::Numeric(scaled))?;
        }

        Ok(result)
    }

    pub fn fit_transform(&mut self, frame: &Frame, columns: &[String]) -> Result<Frame> {
        self.fit(frame, columns)?;
        self.transform(frame)
    }

    fn compute_params(&self, values: &[Option<f64>]) -> ScalerParams {
        match self.scaler_type {
            ScalerType::Standard => {
                let present: Vec<f64> = values.iter().flatten().copied().collect();
                if present.is_empty() {
                    return ScalerParams { center: 0.0, scale: 1.0 };
                }
                let n = present.len() as f64;
                let mean = present.iter().sum::<f64>() / n;
                // Population standard deviation
                let var = present.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                ScalerParams {
                    center: mean,
                    scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
                }
            }
            ScalerType::None => ScalerParams { center: 0.0, scale: 1.0 },
        }
    }
}
