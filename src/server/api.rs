//! API route definitions

use std::sync::Arc;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, jobs, state::AppState, ServerConfig};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found. Visit /api/health to check API status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": "Method not allowed.",
        })),
    )
}

/// Job-tracking routes, nested under `/api/v2`
fn job_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/training/", get(jobs::list_jobs))
        .route("/training/train/", post(jobs::train_job))
        .route("/training/:id/", get(jobs::get_job).delete(jobs::delete_job))
        .route("/training/:id/status/", get(jobs::job_status))
        .route("/models/", get(jobs::list_trained_models))
        .route("/models/features/", get(jobs::features))
        .route("/models/model_types/", get(jobs::model_types))
        .route("/models/:id/", get(jobs::get_trained_model))
        .route("/models/:id/metrics/", get(jobs::trained_model_metrics))
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let api_routes = Router::new()
        // Datasets
        .route("/datasets/", get(handlers::list_datasets))
        .route("/datasets/upload/", post(handlers::upload_dataset))
        .route(
            "/datasets/:id/",
            get(handlers::get_dataset).delete(handlers::delete_dataset),
        )
        // Model configurations
        .route("/models/", get(handlers::list_models).post(handlers::create_model))
        .route(
            "/models/:id/",
            get(handlers::get_model).delete(handlers::delete_model),
        )
        .route("/models/:id/train/", post(handlers::train_model))
        // Multi-model training
        .route("/train/", post(handlers::train_multiple_models))
        // Results
        .route("/results/", get(handlers::list_results))
        .route("/results/:id/", get(handlers::get_result))
        // System
        .route("/debug/", get(handlers::debug_database))
        .route("/health", get(handlers::health_check))
        .nest("/v2", job_routes())
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405);

    let app = Router::new()
        .nest("/api", api_routes)
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state);

    // CORS_ORIGIN unset or "*" allows any origin
    let cors = match config.cors_origin.as_deref() {
        Some(origin) if origin != "*" => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .unwrap_or_else(|_| HeaderValue::from_static("*")),
            )
            .allow_methods(Any)
            .allow_headers(Any),
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    app.layer(DefaultBodyLimit::max(config.max_upload_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
