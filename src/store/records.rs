//! Persisted record types

use crate::training::{ModelType, RegressionMetrics};
use crate::utils::DatasetSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// An uploaded CSV file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: Uuid,
    pub name: String,
    pub file_path: PathBuf,
    pub uploaded_at: DateTime<Utc>,
    pub row_count: usize,
    pub columns: Vec<String>,
}

impl DatasetRecord {
    pub fn new(name: impl Into<String>, file_path: PathBuf, summary: DatasetSummary) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            file_path,
            uploaded_at: Utc::now(),
            row_count: summary.row_count,
            columns: summary.columns,
        }
    }
}

/// A named model type with its hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfigRecord {
    pub id: Uuid,
    pub name: String,
    pub model_type: ModelType,
    pub hyperparameters: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of training one model configuration on one dataset and target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResultRecord {
    pub id: Uuid,
    pub dataset_id: Uuid,
    pub model_id: Uuid,
    pub target_column: String,
    pub metrics: RegressionMetrics,
    pub feature_importance: BTreeMap<String, f64>,
    /// Serialized fitted pipeline, if it was written
    pub model_file: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl TrainingResultRecord {
    pub fn new(
        dataset_id: Uuid,
        model_id: Uuid,
        target_column: impl Into<String>,
        metrics: RegressionMetrics,
        feature_importance: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            dataset_id,
            model_id,
            target_column: target_column.into(),
            metrics,
            feature_importance,
            model_file: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_model_file(mut self, path: PathBuf) -> Self {
        self.model_file = Some(path);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// A multi-model training request on the job-tracking surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingJobRecord {
    pub id: Uuid,
    pub name: String,
    pub target_column: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrainingJobRecord {
    pub fn new(name: impl Into<String>, target_column: impl Into<String>, status: JobStatus) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            target_column: target_column.into(),
            status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A model trained within a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModelRecord {
    pub id: Uuid,
    #[serde(rename = "training_job")]
    pub training_job_id: Uuid,
    pub model_type: ModelType,
    /// Target column the model predicts
    pub feature: String,
    pub hyperparameters: Map<String, Value>,
    pub metrics: RegressionMetrics,
    pub created_at: DateTime<Utc>,
}

/// Optional filters for listing trained models.
///
/// Values are compared as strings, so an unknown model type or a malformed
/// job id simply matches nothing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrainedModelFilter {
    pub feature: Option<String>,
    pub training_job: Option<String>,
    pub model_type: Option<String>,
}

impl TrainedModelFilter {
    pub fn matches(&self, record: &TrainedModelRecord) -> bool {
        self.feature.as_deref().map_or(true, |f| record.feature == f)
            && self
                .training_job
                .as_deref()
                .map_or(true, |j| record.training_job_id.to_string() == j)
            && self
                .model_type
                .as_deref()
                .map_or(true, |t| record.model_type.as_str() == t)
    }
}
