//! Data preprocessing module
//!
//! Converts a polars frame into a typed [`Frame`] and fits the column-wise
//! preprocessing stage that feeds every estimator:
//! - Missing value imputation (mean / constant)
//! - Standard scaling of numeric features
//! - One-hot encoding of categorical features

mod config;
mod encoder;
mod frame;
mod imputer;
mod pipeline;
mod scaler;

pub use config::PreprocessingConfig;
pub use encoder::Encoder;
pub use frame::{numeric_values, ColumnValues, Frame, FrameColumn};
pub use imputer::{ImputeStrategy, Imputer};
pub use pipeline::DataPreprocessor;
pub use scaler::{Scaler, ScalerType};
