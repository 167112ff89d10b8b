//! Error types for `roster-core`.
//!
//! Every variant is fatal for the request that raised it. Empty listings are
//! not errors; see [`crate::directory::EmptyState`].

use thiserror::Error;

use crate::id::{ContextId, CourseId};

#[derive(Debug, Error)]
pub enum Error {
  /// The site is misconfigured: a required role is missing from the catalog
  /// or no directory course has been set.
  #[error("configuration error: {0}")]
  Configuration(String),

  #[error("viewer lacks capability {capability:?} in context {context}")]
  Unauthorized {
    capability: &'static str,
    context:    ContextId,
  },

  #[error("course not found: {0}")]
  CourseNotFound(CourseId),

  #[error("no context registered for course {0}")]
  ContextNotFound(CourseId),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
