//! JSON REST API for the Roster people directory.
//!
//! Exposes an axum [`Router`] backed by a [`Directory`] over any
//! [`DirectoryStore`]. Authentication, TLS and transport concerns are the
//! caller's responsibility; the viewer id arrives in a trusted header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", roster_api::api_router(directory.clone()))
//! ```

pub mod directory;
pub mod error;
pub mod viewer;

use axum::{Router, routing::get};
use roster_core::{Directory, store::DirectoryStore};

pub use error::ApiError;
pub use viewer::{VIEWER_HEADER, Viewer};

/// Build a fully-materialised API router for `directory`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(directory: Directory<S>) -> Router<()>
where
  S: DirectoryStore + 'static,
{
  Router::new()
    .route("/directory", get(directory::list::<S>))
    .route("/directory/departments", get(directory::departments::<S>))
    .route("/directory/courses", get(directory::courses::<S>))
    .with_state(directory)
}
