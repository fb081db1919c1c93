//! Error types for the server

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::ComparatorError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl From<ComparatorError> for ServerError {
    fn from(err: ComparatorError) -> Self {
        match err {
            ComparatorError::NotFound(msg) => ServerError::NotFound(msg),
            ComparatorError::Io(_) | ComparatorError::Serialization(_) => {
                ServerError::Internal(err.to_string())
            }
            other => ServerError::BadRequest(other.to_string()),
        }
    }
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        ServerError::BadRequest(err.body_text())
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServerError::Internal(format!("Training task failed: {}", err))
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let ServerError::Internal(msg) = &self {
            tracing::error!(detail = %msg, "Internal server error");
        }
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_error_mapping() {
        let cases = [
            (ComparatorError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ComparatorError::Config("x".into()), StatusCode::BAD_REQUEST),
            (
                ComparatorError::InsufficientData { available: 3, required: 50 },
                StatusCode::BAD_REQUEST,
            ),
            (ComparatorError::Training("x".into()), StatusCode::BAD_REQUEST),
            (ComparatorError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ComparatorError::Serialization("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).status(), status);
        }
    }

    #[test]
    fn test_json_rejection_is_bad_request() {
        let rejection = Json::<serde_json::Value>::from_bytes(b"{\"name\":").unwrap_err();
        let err = ServerError::from(rejection);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_message_is_preserved() {
        let err = ServerError::from(ComparatorError::InsufficientData { available: 10, required: 50 });
        assert_eq!(
            err.to_string(),
            "Insufficient data after cleaning. Only 10 samples available (need at least 50)."
        );
    }
}
