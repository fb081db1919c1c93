//! HTTP request handlers for the primary API surface

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::{pipeline_file_name, DatasetRecord, ModelConfigRecord, TrainingResultRecord};
use crate::training::{ModelInfo, ModelType, RegressionMetrics, ScatterData, TrainingOutcome};
use crate::utils::{ensure_csv_name, load_csv_bytes, sanitize_file_component, DatasetSummary};

use super::error::{Result, ServerError};
use super::state::AppState;

// ============================================================================
// Shared helpers
// ============================================================================

pub(crate) struct UploadedFile {
    pub name: String,
    pub data: Bytes,
}

/// A multipart form split into its `file` part and its text fields
pub(crate) struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut file = None;
        let mut fields = HashMap::new();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let file_name = field.file_name().unwrap_or("upload.csv").to_string();
                let data = field.bytes().await?;
                info!(file_name = %file_name, bytes = data.len(), "Received file");
                file = Some(UploadedFile { name: file_name, data });
            } else {
                fields.insert(name, field.text().await?);
            }
        }

        Ok(Self { file, fields })
    }

    /// The uploaded CSV file, rejecting missing files and other extensions
    pub fn csv_file(&self) -> Result<&UploadedFile> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;
        ensure_csv_name(&file.name)?;
        Ok(file)
    }

    /// Parse a JSON-encoded text field, using `default` when absent
    pub fn json_field<T: serde::de::DeserializeOwned>(&self, key: &str, default: &str) -> Result<T> {
        let raw = self.fields.get(key).map(String::as_str).unwrap_or(default);
        serde_json::from_str(raw)
            .map_err(|e| ServerError::BadRequest(format!("Invalid JSON in field '{}': {}", key, e)))
    }
}

pub(crate) fn parse_id(raw: &str, not_found: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ServerError::NotFound(not_found.to_string()))
}

/// Write an uploaded CSV under the datasets directory and record it
async fn store_dataset(state: &AppState, file: &UploadedFile, df: &DataFrame) -> Result<DatasetRecord> {
    let dir = state.datasets_dir();
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(format!("{}_{}", Uuid::new_v4(), sanitize_file_component(&file.name)));
    tokio::fs::write(&path, &file.data).await?;

    let record = DatasetRecord::new(file.name.clone(), path.clone(), DatasetSummary::from_frame(df));
    let record = match state.store.insert_dataset(record).await {
        Ok(record) => record,
        Err(e) => {
            if let Err(io) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %io, "Failed to remove uploaded file");
            }
            return Err(e.into());
        }
    };
    info!(
        dataset_id = %record.id,
        name = %record.name,
        rows = record.row_count,
        columns = record.columns.len(),
        "Dataset stored"
    );
    Ok(record)
}

/// Run one train-and-evaluate on the blocking pool
pub(crate) async fn train_on_frame(
    state: &AppState,
    df: Arc<DataFrame>,
    target_column: String,
    model_type: ModelType,
    hyperparameters: Map<String, Value>,
) -> Result<TrainingOutcome> {
    let engine = state.engine.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        engine.train_and_evaluate(&df, &target_column, model_type, &hyperparameters)
    })
    .await??;
    Ok(outcome)
}

// ============================================================================
// Datasets
// ============================================================================

pub async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DatasetRecord>)> {
    let form = UploadForm::read(multipart).await?;
    let file = form.csv_file()?;
    let df = load_csv_bytes(&file.data)?;
    let record = store_dataset(&state, file, &df).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_datasets(State(state): State<Arc<AppState>>) -> Json<Vec<DatasetRecord>> {
    Json(state.store.list_datasets().await)
}

pub async fn get_dataset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DatasetRecord>> {
    let id = parse_id(&id, "Dataset not found")?;
    Ok(Json(state.store.get_dataset(id).await?))
}

pub async fn delete_dataset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id, "Dataset not found")?;
    state.store.delete_dataset(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Model configurations
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateModelRequest {
    pub name: String,
    pub model_type: String,
    #[serde(default)]
    pub hyperparameters: Map<String, Value>,
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Vec<ModelConfigRecord>> {
    Json(state.store.list_model_configs().await)
}

pub async fn create_model(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CreateModelRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ModelConfigRecord>)> {
    let Json(req) = payload?;
    let model_type: ModelType = req.model_type.parse()?;
    let record = state
        .store
        .create_model_config(req.name, model_type, req.hyperparameters)
        .await?;
    info!(model_id = %record.id, model_type = %record.model_type, "Model configuration created");
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ModelConfigRecord>> {
    let id = parse_id(&id, "Model not found")?;
    Ok(Json(state.store.get_model_config(id).await?))
}

pub async fn delete_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id, "Model not found")?;
    state.store.delete_model_config(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Training
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    pub dataset_id: String,
    pub target_column: String,
}

#[derive(Debug, Serialize)]
pub struct TrainResponse {
    pub metrics: RegressionMetrics,
    pub feature_importance: BTreeMap<String, f64>,
    pub scatter_data: ScatterData,
    pub model_info: ModelInfo,
}

/// Train a stored model configuration on a stored dataset
pub async fn train_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<TrainRequest>, JsonRejection>,
) -> Result<Json<TrainResponse>> {
    let Json(req) = payload?;
    let model = state
        .store
        .get_model_config(parse_id(&id, "Model not found")?)
        .await?;
    let dataset = state
        .store
        .get_dataset(parse_id(&req.dataset_id, "Dataset not found")?)
        .await?;

    let engine = state.engine.clone();
    let csv_path = dataset.file_path.clone();
    let target = req.target_column.clone();
    let hyperparameters = model.hyperparameters.clone();
    let model_type = model.model_type;
    let outcome = tokio::task::spawn_blocking(move || {
        engine.train_csv(&csv_path, &target, model_type, &hyperparameters)
    })
    .await??;

    let TrainingOutcome {
        pipeline,
        metrics,
        feature_importance,
        scatter_data,
        model_info,
    } = outcome;

    let record = TrainingResultRecord::new(
        dataset.id,
        model.id,
        req.target_column,
        metrics,
        feature_importance.clone(),
    );

    let models_dir = state.models_dir();
    let artifact: PathBuf = models_dir.join(pipeline_file_name(&model.name, &dataset.name, record.id));
    let save_path = artifact.clone();
    tokio::task::spawn_blocking(move || -> crate::error::Result<()> {
        std::fs::create_dir_all(&models_dir)?;
        pipeline.save(&save_path)
    })
    .await??;

    let record = match state.store.insert_result(record.with_model_file(artifact.clone())).await {
        Ok(record) => record,
        Err(e) => {
            // the pipeline file has no result pointing at it
            if let Err(io) = tokio::fs::remove_file(&artifact).await {
                warn!(path = %artifact.display(), error = %io, "Failed to remove pipeline file");
            }
            return Err(e.into());
        }
    };
    info!(
        result_id = %record.id,
        model = %model.name,
        dataset = %dataset.name,
        r2_score = metrics.r2_score,
        "Training result stored"
    );

    Ok(Json(TrainResponse {
        metrics,
        feature_importance,
        scatter_data,
        model_info,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub model_type: String,
    #[serde(default)]
    pub hyperparameters: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct MultiTrainResult {
    pub id: Uuid,
    pub dataset: String,
    pub model: String,
    pub metrics: RegressionMetrics,
    pub feature_importance: BTreeMap<String, f64>,
    pub model_info: ModelInfo,
}

/// Upload a CSV and train every model configuration on every target column
pub async fn train_multiple_models(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<MultiTrainResult>>)> {
    let form = UploadForm::read(multipart).await?;
    let file = form.csv_file()?;
    let df = Arc::new(load_csv_bytes(&file.data)?);

    let target_columns: Vec<String> = form.json_field("target_columns", "[]")?;
    let missing: Vec<&str> = target_columns
        .iter()
        .map(String::as_str)
        .filter(|col| df.column(col).is_err())
        .collect();
    if !missing.is_empty() {
        return Err(ServerError::BadRequest(format!(
            "Target columns not found in dataset: {:?}",
            missing
        )));
    }

    let min_rows = state.engine.config().min_rows;
    for col in &target_columns {
        let available = state.engine.usable_target_rows(&df, col)?;
        if available < min_rows {
            return Err(ServerError::BadRequest(format!(
                "Insufficient data for target column {}. Only {} non-null values available.",
                col, available
            )));
        }
    }

    let specs: Vec<ModelSpec> = form.json_field("models", "[]")?;
    let dataset = store_dataset(&state, file, &df).await?;

    let mut results = Vec::with_capacity(specs.len() * target_columns.len());
    for spec in specs {
        let model_type: ModelType = spec.model_type.parse()?;
        let model = state
            .store
            .create_model_config(spec.name, model_type, spec.hyperparameters)
            .await
            .map_err(|e| ServerError::BadRequest(format!("Invalid model configuration: {}", e)))?;

        for target in &target_columns {
            let outcome = train_on_frame(
                &state,
                Arc::clone(&df),
                target.clone(),
                model.model_type,
                model.hyperparameters.clone(),
            )
            .await?;

            let record = state
                .store
                .insert_result(TrainingResultRecord::new(
                    dataset.id,
                    model.id,
                    target.clone(),
                    outcome.metrics,
                    outcome.feature_importance.clone(),
                ))
                .await?;

            results.push(MultiTrainResult {
                id: record.id,
                dataset: dataset.name.clone(),
                model: model.name.clone(),
                metrics: outcome.metrics,
                feature_importance: outcome.feature_importance,
                model_info: outcome.model_info,
            });
        }
    }

    info!(dataset_id = %dataset.id, results = results.len(), "Multi-model training finished");
    Ok((StatusCode::CREATED, Json(results)))
}

// ============================================================================
// Results and diagnostics
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ResultView {
    pub id: Uuid,
    pub dataset: String,
    pub model: String,
    pub metrics: RegressionMetrics,
    pub feature_importance: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
}

async fn result_view(state: &AppState, record: TrainingResultRecord) -> ResultView {
    let dataset = state
        .store
        .get_dataset(record.dataset_id)
        .await
        .map(|d| d.name)
        .unwrap_or_default();
    let model = state
        .store
        .get_model_config(record.model_id)
        .await
        .map(|m| m.name)
        .unwrap_or_default();

    ResultView {
        id: record.id,
        dataset,
        model,
        metrics: record.metrics,
        feature_importance: record.feature_importance,
        created_at: record.created_at,
    }
}

pub async fn list_results(State(state): State<Arc<AppState>>) -> Json<Vec<ResultView>> {
    let records = state.store.list_results().await;
    info!(count = records.len(), "Listing training results");
    let mut views = Vec::with_capacity(records.len());
    for record in records {
        views.push(result_view(&state, record).await);
    }
    Json(views)
}

pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ResultView>> {
    let record = state
        .store
        .get_result(parse_id(&id, "Result not found")?)
        .await?;
    Ok(Json(result_view(&state, record).await))
}

/// Summary of every stored record
pub async fn debug_database(State(state): State<Arc<AppState>>) -> Json<Value> {
    let datasets: Vec<Value> = state
        .store
        .list_datasets()
        .await
        .into_iter()
        .map(|d| json!({"id": d.id, "name": d.name, "row_count": d.row_count}))
        .collect();
    let models: Vec<Value> = state
        .store
        .list_model_configs()
        .await
        .into_iter()
        .map(|m| json!({"id": m.id, "name": m.name, "type": m.model_type}))
        .collect();

    let mut results = Vec::new();
    for record in state.store.list_results().await {
        let view = result_view(&state, record).await;
        results.push(json!({
            "id": view.id,
            "dataset": view.dataset,
            "model": view.model,
            "metrics": view.metrics,
        }));
    }

    Json(json!({
        "datasets": datasets,
        "models": models,
        "results": results,
    }))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
