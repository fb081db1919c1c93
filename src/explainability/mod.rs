//! Model explainability module
//!
//! Scores input features of a fitted pipeline using, in priority order:
//! - Native importances of tree ensembles
//! - Normalized coefficient magnitudes of linear estimators
//! - Permutation feature importance over the raw columns

mod importance;

pub use importance::{extract_importance, ImportanceMethod, ImportanceResult, PermutationImportance};
