//! API error type and its mapping to HTTP responses.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use tracing::error;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error("validation failed: {}", .0.join("; "))]
  Validation(Vec<String>),
  #[error("{0} not found")]
  NotFound(String),
  #[error("persistence failure: {0}")]
  Persistence(#[from] StoreError),
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    match self {
      AppError::Validation(details) => (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Validation failed", "details": details })),
      )
        .into_response(),
      AppError::NotFound(what) => (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("{} not found", what) })),
      )
        .into_response(),
      AppError::Persistence(e) => {
        error!(target: "gridwise", error = %e, "Request failed on persistence");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          Json(json!({ "error": "Persistence failure", "details": e.to_string() })),
        )
          .into_response()
      }
    }
  }
}

pub type ApiResult<T> = Result<T, AppError>;
