//! Model Comparator - regression model comparison backend
//!
//! Upload a CSV dataset, configure regression models, train them on a chosen
//! target column and compare their metrics and feature importances.
//!
//! # Modules
//!
//! - [`utils`] - CSV ingestion and dataset summaries
//! - [`preprocessing`] - Imputation, scaling and one-hot encoding
//! - [`training`] - Regression estimators and the train-and-evaluate engine
//! - [`explainability`] - Feature importance extraction
//! - [`store`] - Persistent record store
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core ML modules
pub mod preprocessing;
pub mod training;
pub mod explainability;

// Records
pub mod store;

// Utilities
pub mod utils;

// Services
pub mod server;
pub mod cli;

pub use error::{ComparatorError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ComparatorError, Result};

    // Preprocessing
    pub use crate::preprocessing::{DataPreprocessor, Frame, PreprocessingConfig};

    // Training
    pub use crate::training::{
        FittedPipeline, ModelType, RegressionMetrics, TrainEngine, TrainerConfig, TrainingOutcome,
    };

    // Explainability
    pub use crate::explainability::{extract_importance, ImportanceMethod, PermutationImportance};

    // Store
    pub use crate::store::{DatasetRecord, ModelConfigRecord, ResultStore, TrainingResultRecord};

    // Data loading
    pub use crate::utils::{load_csv_bytes, load_csv_path, DatasetSummary};
}
