//! Error types for the flags endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Flags endpoint error
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("flag {0:?} not found")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),
}

/// Flags endpoint result type
pub type EndpointResult<T> = Result<T, EndpointError>;

impl IntoResponse for EndpointError {
    fn into_response(self) -> Response {
        let status = match &self {
            EndpointError::NotFound(_) => StatusCode::NOT_FOUND,
            EndpointError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
