//! Model training module
//!
//! Provides the regression estimators compared by the service:
//! - Linear regression (ordinary least squares)
//! - Random Forest over MSE regression trees
//! - K-Nearest Neighbors
//! - Epsilon-insensitive Support Vector Regression
//! - XGBoost-style second-order gradient boosting
//!
//! and the engine that fits a preprocessing + estimator pipeline and
//! evaluates it on a held-out split.

mod config;
mod engine;
mod estimator;
mod models;
pub mod decision_tree;
pub mod knn;
pub mod linear_models;
pub mod random_forest;
pub mod svm;
pub mod xgboost;

pub use config::{ModelType, TrainerConfig};
pub use engine::{FittedPipeline, ModelInfo, ScatterData, TrainEngine, TrainingOutcome};
pub use estimator::Estimator;
pub use models::{r2_score, Model, RegressionMetrics};
pub use decision_tree::{DecisionTree, TreeNode};
pub use knn::{KNNConfig, KNNRegressor, SearchAlgorithm, WeightScheme};
pub use linear_models::LinearRegression;
pub use random_forest::{MaxFeatures, RandomForest};
pub use svm::{Gamma, KernelType, SVMConfig, SVMRegressor};
pub use xgboost::{XGBoostConfig, XGBoostRegressor};
