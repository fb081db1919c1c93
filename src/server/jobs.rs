//! Handlers for the job-tracking surface
//!
//! A training job groups several models trained on one uploaded CSV against a
//! single target column. Jobs move from `processing` to `completed`, or to
//! `failed` when any model fails, in which case the request answers 500.
//! A request rejected before its job exists answers 400 and creates nothing.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::{JobStatus, TrainedModelFilter, TrainedModelRecord, TrainingJobRecord};
use crate::training::{ModelType, RegressionMetrics};
use crate::utils::load_csv_bytes;

use super::error::{Result, ServerError};
use super::handlers::{parse_id, train_on_frame, UploadForm};
use super::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: TrainingJobRecord,
    pub models: Vec<TrainedModelRecord>,
}

#[derive(Debug, Deserialize)]
pub struct JobModelSpec {
    pub model_type: String,
    #[serde(default)]
    pub hyperparameters: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct JobRequest {
    pub name: String,
    pub target_column: String,
    pub models: Vec<JobModelSpec>,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub training_id: Uuid,
    pub status: String,
    pub message: String,
}

async fn job_view(state: &AppState, job: TrainingJobRecord) -> JobView {
    let filter = TrainedModelFilter {
        training_job: Some(job.id.to_string()),
        ..Default::default()
    };
    let models = state.store.list_trained_models(&filter).await;
    JobView { job, models }
}

pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<JobView>> {
    let jobs = state.store.list_jobs().await;
    let mut views = Vec::with_capacity(jobs.len());
    for job in jobs {
        views.push(job_view(&state, job).await);
    }
    Json(views)
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobView>> {
    let job = state
        .store
        .get_job(parse_id(&id, "Training job not found")?)
        .await?;
    Ok(Json(job_view(&state, job).await))
}

/// Upload a CSV and train every requested model within a new job
pub async fn train_job(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<JobResponse>> {
    let form = UploadForm::read(multipart).await?;
    if form.file.is_none() {
        return Err(ServerError::BadRequest("No file provided".to_string()));
    }
    let request: JobRequest = form.json_field("data", "{}")?;

    let mut job_id = None;
    match run_job(&state, &form, request, &mut job_id).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            if let Some(id) = job_id {
                warn!(job_id = %id, error = %e, "Training job failed");
                if let Err(mark_err) = state.store.set_job_status(id, JobStatus::Failed).await {
                    warn!(job_id = %id, error = %mark_err, "Could not mark job as failed");
                }
            }
            Err(ServerError::Internal(e.to_string()))
        }
    }
}

async fn run_job(
    state: &AppState,
    form: &UploadForm,
    request: JobRequest,
    job_id: &mut Option<Uuid>,
) -> Result<JobResponse> {
    let job = state
        .store
        .create_job(request.name, request.target_column.clone(), JobStatus::Processing)
        .await?;
    *job_id = Some(job.id);
    info!(job_id = %job.id, name = %job.name, models = request.models.len(), "Training job started");

    let data = form.file.as_ref().map(|f| f.data.clone()).unwrap_or_default();
    let df = Arc::new(load_csv_bytes(&data)?);

    for spec in &request.models {
        let model_type: ModelType = spec.model_type.parse()?;
        let outcome = train_on_frame(
            state,
            Arc::clone(&df),
            request.target_column.clone(),
            model_type,
            spec.hyperparameters.clone(),
        )
        .await?;

        state
            .store
            .create_trained_model(
                job.id,
                model_type,
                request.target_column.clone(),
                spec.hyperparameters.clone(),
                outcome.metrics,
            )
            .await?;
    }

    state.store.set_job_status(job.id, JobStatus::Completed).await?;
    info!(job_id = %job.id, "Training job completed");

    Ok(JobResponse {
        training_id: job.id,
        status: "success".to_string(),
        message: format!("Successfully trained {} models", request.models.len()),
    })
}

pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>> {
    let job = state
        .store
        .get_job(parse_id(&id, "Training job not found")?)
        .await?;
    Ok(Json(JobResponse {
        training_id: job.id,
        status: job.status.as_str().to_string(),
        message: format!("Training job {}", job.status.as_str()),
    }))
}

/// Delete a job together with its trained models
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id, "Training job not found")?;
    state.store.delete_job(id).await?;
    info!(job_id = %id, "Training job deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_trained_models(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TrainedModelFilter>,
) -> Json<Vec<TrainedModelRecord>> {
    // Empty query values mean "no filter"
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
    let filter = TrainedModelFilter {
        feature: non_empty(filter.feature),
        training_job: non_empty(filter.training_job),
        model_type: non_empty(filter.model_type),
    };
    Json(state.store.list_trained_models(&filter).await)
}

pub async fn get_trained_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TrainedModelRecord>> {
    let id = parse_id(&id, "Model not found")?;
    Ok(Json(state.store.get_trained_model(id).await?))
}

pub async fn trained_model_metrics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RegressionMetrics>> {
    let id = parse_id(&id, "Model not found")?;
    Ok(Json(state.store.get_trained_model(id).await?.metrics))
}

pub async fn features(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.store.distinct_features().await)
}

pub async fn model_types(State(state): State<Arc<AppState>>) -> Json<Vec<ModelType>> {
    Json(state.store.distinct_model_types().await)
}
