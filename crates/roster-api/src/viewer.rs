//! Extractor for the already-authenticated viewer.
//!
//! Session handling belongs to the host platform; its proxy forwards the
//! signed-in person's id in [`VIEWER_HEADER`].

use axum::{extract::FromRequestParts, http::request::Parts};
use roster_core::id::PersonId;

use crate::error::ApiError;

pub const VIEWER_HEADER: &str = "x-roster-viewer";

/// The person on whose behalf a request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer(pub PersonId);

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    parts
      .headers
      .get(VIEWER_HEADER)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.trim().parse::<i64>().ok())
      .filter(|id| *id > 0)
      .map(|id| Viewer(PersonId(id)))
      .ok_or(ApiError::MissingViewer)
  }
}
