//! Integration test: Server API endpoints

use axum::body::Body;
use axum::http::{Request, StatusCode};
use model_comparator::server::{create_router, AppState, ServerConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "comparator-test-boundary";

fn test_app() -> (axum::Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig::in_dir(dir.path());
    let state = Arc::new(AppState::new(config.clone()).unwrap());
    (create_router(state, &config), dir)
}

/// `rows` rows of `a, b, target` where target = 3a - 2b + 1 plus a small wobble
fn linear_csv(rows: usize) -> String {
    let mut csv = String::from("a,b,target\n");
    for i in 0..rows {
        let a = i as f64;
        let b = ((i * 7) % 13) as f64;
        let target = 3.0 * a - 2.0 * b + 1.0 + (i % 5) as f64 * 0.1;
        csv.push_str(&format!("{},{},{}\n", a, b, target));
    }
    csv
}

enum Part<'a> {
    File(&'a str, &'a str),
    Text(&'a str, &'a str),
}

fn multipart_request(uri: &str, parts: &[Part]) -> Request<Body> {
    let mut body = String::new();
    for part in parts {
        body.push_str(&format!("--{}\r\n", BOUNDARY));
        match part {
            Part::File(file_name, content) => {
                body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                    file_name
                ));
                body.push_str("Content-Type: text/csv\r\n\r\n");
                body.push_str(content);
            }
            Part::Text(name, value) => {
                body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    name
                ));
                body.push_str(value);
            }
        }
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn upload(app: &axum::Router, rows: usize) -> Value {
    let csv = linear_csv(rows);
    let (status, body) = send(
        app,
        multipart_request("/api/datasets/upload/", &[Part::File("data.csv", &csv)]),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

async fn create_model(app: &axum::Router, name: &str, model_type: &str, hyperparameters: Value) -> Value {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/models/",
            json!({"name": name, "model_type": model_type, "hyperparameters": hyperparameters}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _dir) = test_app();
    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let (app, _dir) = test_app();
    let (status, body) = send(&app, get("/api/nothing/here/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_upload_and_train_linear_regression() {
    let (app, _dir) = test_app();

    let dataset = upload(&app, 60).await;
    assert_eq!(dataset["row_count"], 60);
    assert_eq!(dataset["columns"], json!(["a", "b", "target"]));
    assert_eq!(dataset["name"], "data.csv");

    // "normalize" is accepted and ignored for linear regression
    let model = create_model(&app, "baseline", "linear_regression", json!({"normalize": true})).await;
    assert_eq!(model["model_type"], "linear_regression");

    let uri = format!("/api/models/{}/train/", model["id"].as_str().unwrap());
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &uri,
            json!({"dataset_id": dataset["id"], "target_column": "target"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    for key in ["r2_score", "mse", "mae", "rmse"] {
        assert!(body["metrics"][key].as_f64().unwrap().is_finite(), "{} not finite", key);
    }
    assert!(body["metrics"]["r2_score"].as_f64().unwrap() > 0.9);

    let importance = body["feature_importance"].as_object().unwrap();
    assert!(importance.contains_key("a"));
    assert!(importance.contains_key("b"));
    let total: f64 = importance
        .iter()
        .filter(|(k, _)| k.as_str() != "intercept")
        .map(|(_, v)| v.as_f64().unwrap())
        .sum();
    assert!((total - 1.0).abs() < 1e-6);

    assert_eq!(body["model_info"]["n_samples_test"], 12);
    assert_eq!(body["model_info"]["feature_importance_method"], "coefficients");
    assert_eq!(
        body["scatter_data"]["actual"].as_array().unwrap().len(),
        body["scatter_data"]["predicted"].as_array().unwrap().len()
    );

    let (status, results) = send(&app, get("/api/results/")).await;
    assert_eq!(status, StatusCode::OK);
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["dataset"], "data.csv");
    assert_eq!(results[0]["model"], "baseline");

    let result_uri = format!("/api/results/{}/", results[0]["id"].as_str().unwrap());
    let (status, result) = send(&app, get(&result_uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["metrics"], results[0]["metrics"]);

    let (status, debug) = send(&app, get("/api/debug/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(debug["datasets"][0]["row_count"], 60);
    assert_eq!(debug["models"][0]["type"], "linear_regression");
    assert_eq!(debug["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_requires_csv_file() {
    let (app, _dir) = test_app();

    let (status, body) = send(
        &app,
        multipart_request("/api/datasets/upload/", &[Part::Text("note", "hello")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");

    let (status, body) = send(
        &app,
        multipart_request("/api/datasets/upload/", &[Part::File("data.txt", "a,b\n1,2\n")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only CSV files are supported");
}

#[tokio::test]
async fn test_create_model_rejects_bad_configuration() {
    let (app, _dir) = test_app();

    let (status, _) = send(
        &app,
        json_request("POST", "/api/models/", json!({"name": "l", "model_type": "lasso"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/models/",
            json!({"name": "k", "model_type": "knn", "hyperparameters": {"depth": 3}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid hyperparameter 'depth' for model type 'knn'");
}

#[tokio::test]
async fn test_missing_records_return_404() {
    let (app, _dir) = test_app();

    let (status, body) = send(&app, get(&format!("/api/datasets/{}/", uuid::Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Dataset not found");

    let (status, _) = send(&app, get("/api/models/not-a-uuid/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let dataset = upload(&app, 60).await;
    let uri = format!("/api/models/{}/train/", uuid::Uuid::new_v4());
    let (status, body) = send(
        &app,
        json_request("POST", &uri, json!({"dataset_id": dataset["id"], "target_column": "target"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Model not found");
}

#[tokio::test]
async fn test_train_with_too_few_rows_is_rejected() {
    let (app, _dir) = test_app();
    let dataset = upload(&app, 30).await;
    let model = create_model(&app, "lin", "linear_regression", json!({})).await;

    let uri = format!("/api/models/{}/train/", model["id"].as_str().unwrap());
    let (status, body) = send(
        &app,
        json_request("POST", &uri, json!({"dataset_id": dataset["id"], "target_column": "target"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Only 30 samples available"));

    let (_, results) = send(&app, get("/api/results/")).await;
    assert!(results.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_dataset_cascades_results() {
    let (app, _dir) = test_app();
    let dataset = upload(&app, 60).await;
    let model = create_model(&app, "knn", "knn", json!({"n_neighbors": 3})).await;

    let uri = format!("/api/models/{}/train/", model["id"].as_str().unwrap());
    let (status, _) = send(
        &app,
        json_request("POST", &uri, json!({"dataset_id": dataset["id"], "target_column": "target"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/datasets/{}/", dataset["id"].as_str().unwrap()))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, results) = send(&app, get("/api/results/")).await;
    assert!(results.as_array().unwrap().is_empty());
    let (_, datasets) = send(&app, get("/api/datasets/")).await;
    assert!(datasets.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_train_multiple_models() {
    let (app, _dir) = test_app();
    let csv = linear_csv(60);
    let models = json!([
        {"name": "lin", "model_type": "linear_regression", "hyperparameters": {}},
        {"name": "neighbours", "model_type": "knn", "hyperparameters": {"n_neighbors": 3}}
    ])
    .to_string();

    let (status, body) = send(
        &app,
        multipart_request(
            "/api/train/",
            &[
                Part::File("multi.csv", &csv),
                Part::Text("models", &models),
                Part::Text("target_columns", r#"["target"]"#),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["model"], "lin");
    assert_eq!(results[1]["model"], "neighbours");
    assert_eq!(results[0]["dataset"], "multi.csv");

    let (_, models) = send(&app, get("/api/models/")).await;
    assert_eq!(models.as_array().unwrap().len(), 2);
    let (_, stored) = send(&app, get("/api/results/")).await;
    assert_eq!(stored.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_train_multiple_models_validates_targets() {
    let (app, _dir) = test_app();
    let models = r#"[{"name": "lin", "model_type": "linear_regression"}]"#;

    let csv = linear_csv(60);
    let (status, body) = send(
        &app,
        multipart_request(
            "/api/train/",
            &[
                Part::File("data.csv", &csv),
                Part::Text("models", models),
                Part::Text("target_columns", r#"["target", "missing"]"#),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], r#"Target columns not found in dataset: ["missing"]"#);

    let small = linear_csv(30);
    let (status, body) = send(
        &app,
        multipart_request(
            "/api/train/",
            &[
                Part::File("data.csv", &small),
                Part::Text("models", models),
                Part::Text("target_columns", r#"["target"]"#),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Insufficient data for target column target. Only 30 non-null values available."
    );

    // Nothing is stored when validation fails
    let (_, datasets) = send(&app, get("/api/datasets/")).await;
    assert!(datasets.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_training_job_lifecycle() {
    let (app, _dir) = test_app();
    let csv = linear_csv(60);
    let data = json!({
        "name": "nightly",
        "target_column": "target",
        "models": [
            {"model_type": "linear_regression", "hyperparameters": {}},
            {"model_type": "knn", "hyperparameters": {"n_neighbors": 4}}
        ]
    })
    .to_string();

    let (status, body) = send(
        &app,
        multipart_request(
            "/api/v2/training/train/",
            &[Part::File("data.csv", &csv), Part::Text("data", &data)],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Successfully trained 2 models");
    let job_id = body["training_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, get(&format!("/api/v2/training/{}/status/", job_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["message"], "Training job completed");

    let (_, job) = send(&app, get(&format!("/api/v2/training/{}/", job_id))).await;
    assert_eq!(job["name"], "nightly");
    assert_eq!(job["models"].as_array().unwrap().len(), 2);

    let (_, features) = send(&app, get("/api/v2/models/features/")).await;
    assert_eq!(features, json!(["target"]));
    let (_, types) = send(&app, get("/api/v2/models/model_types/")).await;
    assert_eq!(types, json!(["linear_regression", "knn"]));

    let (_, knn) = send(&app, get("/api/v2/models/?model_type=knn")).await;
    let knn = knn.as_array().unwrap();
    assert_eq!(knn.len(), 1);
    assert_eq!(knn[0]["training_job"], job_id.as_str());

    let (_, none) = send(&app, get("/api/v2/models/?feature=other")).await;
    assert!(none.as_array().unwrap().is_empty());

    let metrics_uri = format!("/api/v2/models/{}/metrics/", knn[0]["id"].as_str().unwrap());
    let (status, metrics) = send(&app, get(&metrics_uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(metrics["r2_score"].as_f64().unwrap().is_finite());

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v2/training/{}/", job_id))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, get(&format!("/api/v2/training/{}/status/", job_id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Training job not found");
    let (_, models) = send(&app, get("/api/v2/models/")).await;
    assert!(models.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_training_job_is_marked_failed() {
    let (app, _dir) = test_app();
    let csv = linear_csv(60);
    let data = json!({
        "name": "broken",
        "target_column": "target",
        "models": [{"model_type": "lasso", "hyperparameters": {}}]
    })
    .to_string();

    let (status, body) = send(
        &app,
        multipart_request(
            "/api/v2/training/train/",
            &[Part::File("data.csv", &csv), Part::Text("data", &data)],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    let (_, jobs) = send(&app, get("/api/v2/training/")).await;
    let jobs = jobs.as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["status"], "failed");

    let (status, body) = send(
        &app,
        multipart_request("/api/v2/training/train/", &[Part::Text("data", &data)]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
}

#[tokio::test]
async fn test_malformed_job_data_creates_no_job() {
    let (app, _dir) = test_app();
    let csv = linear_csv(60);

    for data in ["{not json", r#"{"name": "no target", "models": []}"#] {
        let (status, body) = send(
            &app,
            multipart_request(
                "/api/v2/training/train/",
                &[Part::File("data.csv", &csv), Part::Text("data", data)],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON in field 'data'"));
    }

    let (_, jobs) = send(&app, get("/api/v2/training/")).await;
    assert!(jobs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_json_bodies_missing_fields_are_bad_requests() {
    let (app, _dir) = test_app();

    let (status, body) = send(&app, json_request("POST", "/api/models/", json!({"name": "m"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("model_type"));

    let model = create_model(&app, "lin", "linear_regression", json!({})).await;
    let uri = format!("/api/models/{}/train/", model["id"].as_str().unwrap());
    let (status, body) = send(&app, json_request("POST", &uri, json!({"target_column": "target"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("dataset_id"));

    let not_json = Request::builder()
        .method("POST")
        .uri("/api/models/")
        .header("content-type", "text/plain")
        .body(Body::from("name=m"))
        .unwrap();
    let (status, body) = send(&app, not_json).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (_, models) = send(&app, get("/api/models/")).await;
    assert_eq!(models.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unsaved_result_leaves_no_pipeline_file() {
    let (app, dir) = test_app();
    let dataset = upload(&app, 60).await;
    let model = create_model(&app, "lin", "linear_regression", json!({})).await;

    // a directory in place of the snapshot's temp file makes every store write fail
    std::fs::create_dir(dir.path().join("data").join("store.json.tmp")).unwrap();

    let uri = format!("/api/models/{}/train/", model["id"].as_str().unwrap());
    let (status, body) = send(
        &app,
        json_request("POST", &uri, json!({"dataset_id": dataset["id"], "target_column": "target"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    let pipelines = std::fs::read_dir(dir.path().join("trained_models")).unwrap().count();
    assert_eq!(pipelines, 0);
    let (_, results) = send(&app, get("/api/results/")).await;
    assert!(results.as_array().unwrap().is_empty());

    let csv = linear_csv(60);
    let (status, _) = send(
        &app,
        multipart_request("/api/datasets/upload/", &[Part::File("more.csv", &csv)]),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let uploads = std::fs::read_dir(dir.path().join("data").join("datasets")).unwrap().count();
    assert_eq!(uploads, 1);
}
