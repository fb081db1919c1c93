//! Result store
//!
//! Datasets, model configurations, training results, training jobs and
//! trained models are kept in memory behind a [`RwLock`] and written to a
//! JSON snapshot after every mutating call.

mod records;

pub use records::{
    DatasetRecord, JobStatus, ModelConfigRecord, TrainedModelFilter, TrainedModelRecord,
    TrainingJobRecord, TrainingResultRecord,
};

use crate::error::{ComparatorError, Result};
use crate::training::{Estimator, ModelType, RegressionMetrics};
use crate::utils::sanitize_file_component;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SNAPSHOT_FILE: &str = "store.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    datasets: Vec<DatasetRecord>,
    models: Vec<ModelConfigRecord>,
    results: Vec<TrainingResultRecord>,
    jobs: Vec<TrainingJobRecord>,
    trained_models: Vec<TrainedModelRecord>,
}

/// Shared record store. Collections are held in insertion order and listed
/// newest first.
#[derive(Debug)]
pub struct ResultStore {
    snapshot_path: Option<PathBuf>,
    inner: RwLock<Snapshot>,
}

impl ResultStore {
    /// Store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            snapshot_path: None,
            inner: RwLock::new(Snapshot::default()),
        }
    }

    /// Open the store in `data_dir`, loading an existing snapshot if present
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(SNAPSHOT_FILE);

        let snapshot = if path.exists() {
            let json = std::fs::read_to_string(&path)?;
            let snapshot: Snapshot = serde_json::from_str(&json)?;
            info!(
                path = %path.display(),
                datasets = snapshot.datasets.len(),
                models = snapshot.models.len(),
                results = snapshot.results.len(),
                "Loaded store snapshot"
            );
            snapshot
        } else {
            Snapshot::default()
        };

        Ok(Self {
            snapshot_path: Some(path),
            inner: RwLock::new(snapshot),
        })
    }

    /// Apply `change` to a copy of the snapshot, write the copy and only then
    /// make it visible. A failed write leaves the store unchanged.
    async fn commit<T>(&self, change: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T> {
        let mut inner = self.inner.write().await;
        let mut next = inner.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *inner = next;
        Ok(out)
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), "Persisted store snapshot");
        Ok(())
    }

    // Datasets

    pub async fn insert_dataset(&self, record: DatasetRecord) -> Result<DatasetRecord> {
        self.commit(|snapshot| {
            snapshot.datasets.push(record.clone());
            Ok(())
        })
        .await?;
        Ok(record)
    }

    pub async fn get_dataset(&self, id: Uuid) -> Result<DatasetRecord> {
        self.inner
            .read()
            .await
            .datasets
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| ComparatorError::NotFound("Dataset not found".to_string()))
    }

    pub async fn list_datasets(&self) -> Vec<DatasetRecord> {
        self.inner.read().await.datasets.iter().rev().cloned().collect()
    }

    /// Delete a dataset with its training results and their pipeline files
    pub async fn delete_dataset(&self, id: Uuid) -> Result<DatasetRecord> {
        let (record, removed) = self
            .commit(|snapshot| {
                let pos = snapshot
                    .datasets
                    .iter()
                    .position(|d| d.id == id)
                    .ok_or_else(|| ComparatorError::NotFound("Dataset not found".to_string()))?;
                let record = snapshot.datasets.remove(pos);
                let removed = drain_results(&mut snapshot.results, |r| r.dataset_id == id);
                Ok((record, removed))
            })
            .await?;

        remove_files(removed.iter().filter_map(|r| r.model_file.as_deref())).await;
        remove_files(std::iter::once(record.file_path.as_path())).await;
        info!(dataset_id = %id, results_removed = removed.len(), "Deleted dataset");
        Ok(record)
    }

    // Model configurations

    /// Validate the hyperparameters by building the estimator, then store the configuration
    pub async fn create_model_config(
        &self,
        name: impl Into<String>,
        model_type: ModelType,
        hyperparameters: Map<String, Value>,
    ) -> Result<ModelConfigRecord> {
        Estimator::from_hyperparameters(model_type, &hyperparameters)?;
        let record = ModelConfigRecord {
            id: Uuid::new_v4(),
            name: name.into(),
            model_type,
            hyperparameters,
            created_at: Utc::now(),
        };

        self.commit(|snapshot| {
            snapshot.models.push(record.clone());
            Ok(())
        })
        .await?;
        Ok(record)
    }

    pub async fn get_model_config(&self, id: Uuid) -> Result<ModelConfigRecord> {
        self.inner
            .read()
            .await
            .models
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| ComparatorError::NotFound("Model not found".to_string()))
    }

    pub async fn list_model_configs(&self) -> Vec<ModelConfigRecord> {
        self.inner.read().await.models.iter().rev().cloned().collect()
    }

    pub async fn delete_model_config(&self, id: Uuid) -> Result<ModelConfigRecord> {
        let (record, removed) = self
            .commit(|snapshot| {
                let pos = snapshot
                    .models
                    .iter()
                    .position(|m| m.id == id)
                    .ok_or_else(|| ComparatorError::NotFound("Model not found".to_string()))?;
                let record = snapshot.models.remove(pos);
                let removed = drain_results(&mut snapshot.results, |r| r.model_id == id);
                Ok((record, removed))
            })
            .await?;

        remove_files(removed.iter().filter_map(|r| r.model_file.as_deref())).await;
        info!(model_id = %id, results_removed = removed.len(), "Deleted model configuration");
        Ok(record)
    }

    // Training results

    pub async fn insert_result(&self, record: TrainingResultRecord) -> Result<TrainingResultRecord> {
        self.commit(|snapshot| {
            if !snapshot.datasets.iter().any(|d| d.id == record.dataset_id) {
                return Err(ComparatorError::NotFound("Dataset not found".to_string()));
            }
            if !snapshot.models.iter().any(|m| m.id == record.model_id) {
                return Err(ComparatorError::NotFound("Model not found".to_string()));
            }
            snapshot.results.push(record.clone());
            Ok(())
        })
        .await?;
        Ok(record)
    }

    pub async fn get_result(&self, id: Uuid) -> Result<TrainingResultRecord> {
        self.inner
            .read()
            .await
            .results
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| ComparatorError::NotFound("Result not found".to_string()))
    }

    pub async fn list_results(&self) -> Vec<TrainingResultRecord> {
        self.inner.read().await.results.iter().rev().cloned().collect()
    }

    // Training jobs

    pub async fn create_job(
        &self,
        name: impl Into<String>,
        target_column: impl Into<String>,
        status: JobStatus,
    ) -> Result<TrainingJobRecord> {
        let record = TrainingJobRecord::new(name, target_column, status);
        self.commit(|snapshot| {
            snapshot.jobs.push(record.clone());
            Ok(())
        })
        .await?;
        Ok(record)
    }

    pub async fn set_job_status(&self, id: Uuid, status: JobStatus) -> Result<TrainingJobRecord> {
        self.commit(|snapshot| {
            let job = snapshot
                .jobs
                .iter_mut()
                .find(|j| j.id == id)
                .ok_or_else(|| ComparatorError::NotFound("Training job not found".to_string()))?;
            job.status = status;
            job.updated_at = Utc::now();
            Ok(job.clone())
        })
        .await
    }

    pub async fn get_job(&self, id: Uuid) -> Result<TrainingJobRecord> {
        self.inner
            .read()
            .await
            .jobs
            .iter()
            .find(|j| j.id == id)
            .cloned()
            .ok_or_else(|| ComparatorError::NotFound("Training job not found".to_string()))
    }

    pub async fn list_jobs(&self) -> Vec<TrainingJobRecord> {
        self.inner.read().await.jobs.iter().rev().cloned().collect()
    }

    /// Delete a job and the models trained within it
    pub async fn delete_job(&self, id: Uuid) -> Result<TrainingJobRecord> {
        self.commit(|snapshot| {
            let pos = snapshot
                .jobs
                .iter()
                .position(|j| j.id == id)
                .ok_or_else(|| ComparatorError::NotFound("Training job not found".to_string()))?;
            let record = snapshot.jobs.remove(pos);
            snapshot.trained_models.retain(|m| m.training_job_id != id);
            Ok(record)
        })
        .await
    }

    // Trained models

    pub async fn create_trained_model(
        &self,
        training_job_id: Uuid,
        model_type: ModelType,
        feature: impl Into<String>,
        hyperparameters: Map<String, Value>,
        metrics: RegressionMetrics,
    ) -> Result<TrainedModelRecord> {
        let record = TrainedModelRecord {
            id: Uuid::new_v4(),
            training_job_id,
            model_type,
            feature: feature.into(),
            hyperparameters,
            metrics,
            created_at: Utc::now(),
        };
        self.commit(|snapshot| {
            if !snapshot.jobs.iter().any(|j| j.id == training_job_id) {
                return Err(ComparatorError::NotFound("Training job not found".to_string()));
            }
            snapshot.trained_models.push(record.clone());
            Ok(())
        })
        .await?;
        Ok(record)
    }

    pub async fn get_trained_model(&self, id: Uuid) -> Result<TrainedModelRecord> {
        self.inner
            .read()
            .await
            .trained_models
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| ComparatorError::NotFound("Model not found".to_string()))
    }

    pub async fn list_trained_models(&self, filter: &TrainedModelFilter) -> Vec<TrainedModelRecord> {
        self.inner
            .read()
            .await
            .trained_models
            .iter()
            .rev()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect()
    }

    /// Distinct target columns across trained models, sorted
    pub async fn distinct_features(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let features: BTreeSet<&str> = inner.trained_models.iter().map(|m| m.feature.as_str()).collect();
        features.into_iter().map(str::to_string).collect()
    }

    /// Distinct model types across trained models, in registry order
    pub async fn distinct_model_types(&self) -> Vec<ModelType> {
        let inner = self.inner.read().await;
        let types: BTreeSet<&'static str> = inner.trained_models.iter().map(|m| m.model_type.as_str()).collect();
        ModelType::ALL
            .into_iter()
            .filter(|t| types.contains(t.as_str()))
            .collect()
    }
}

/// Location of a serialized pipeline: `<model>_<dataset>_<result id>.json`
pub fn pipeline_file_name(model_name: &str, dataset_name: &str, result_id: Uuid) -> String {
    format!(
        "{}_{}_{}.json",
        sanitize_file_component(model_name),
        sanitize_file_component(dataset_name),
        result_id
    )
}

fn drain_results(
    results: &mut Vec<TrainingResultRecord>,
    pred: impl Fn(&TrainingResultRecord) -> bool,
) -> Vec<TrainingResultRecord> {
    let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(results).into_iter().partition(|r| pred(r));
    *results = kept;
    removed
}

async fn remove_files<'a>(paths: impl Iterator<Item = &'a Path>) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove file");
            }
        }
    }
}
