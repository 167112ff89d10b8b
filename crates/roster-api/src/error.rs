//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("missing or malformed viewer header")]
  MissingViewer,

  #[error(transparent)]
  Directory(#[from] roster_core::Error),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    use roster_core::Error as E;

    let status = match &self {
      ApiError::MissingViewer => StatusCode::UNAUTHORIZED,
      ApiError::Directory(E::Unauthorized { .. }) => StatusCode::FORBIDDEN,
      ApiError::Directory(E::CourseNotFound(_) | E::ContextNotFound(_)) => {
        StatusCode::NOT_FOUND
      }
      ApiError::Directory(E::Configuration(_) | E::Store(_)) => {
        tracing::error!(error = %self, "directory request failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
