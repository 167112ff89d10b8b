//! Handlers for `/directory` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/directory` | Filter via query string (`role`, `search`, `page`, …) |
//! | `GET`  | `/directory/departments` | Department selector options |
//! | `GET`  | `/directory/courses` | Course selector options for the viewer |

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{DateTime, Utc};
use roster_core::{
  Directory,
  classify::Classification,
  course::Course,
  directory::{DirectoryEntry, EmptyState, GroupScope},
  filter::{FilterState, Params},
  id::PersonId,
  policy::VisibleRoles,
  store::DirectoryStore,
};
use serde::Serialize;

use crate::{error::ApiError, viewer::Viewer};

// ─── Listing ─────────────────────────────────────────────────────────────────

/// One row as the viewer is allowed to see it.
#[derive(Debug, Serialize)]
pub struct PersonRow {
  pub id:           PersonId,
  pub username:     String,
  pub full_name:    String,
  pub first_name:   String,
  pub last_name:    String,
  /// Absent when the person's mail-display preference hides it.
  pub email:        Option<String>,
  pub department:   String,
  pub city:         String,
  pub country:      String,
  /// Absent when last access is a hidden field for this viewer.
  pub last_access:  Option<DateTime<Utc>>,
  pub relationship: Classification,
  /// Role shortnames.
  pub roles:        Vec<String>,
}

impl PersonRow {
  fn from_entry(entry: DirectoryEntry, last_access_visible: bool) -> Self {
    let DirectoryEntry { person, relationship, roles, email_visible } = entry;
    Self {
      id: person.id,
      full_name: person.full_name(),
      email: email_visible.then_some(person.email),
      last_access: person.last_access.filter(|_| last_access_visible),
      username: person.username,
      first_name: person.first_name,
      last_name: person.last_name,
      department: person.department,
      city: person.city,
      country: person.country,
      relationship,
      roles: roles.into_iter().map(|r| r.shortname).collect(),
    }
  }
}

#[derive(Debug, Serialize)]
pub struct DirectoryPage {
  pub filter:              FilterState,
  pub role_options:        VisibleRoles,
  pub course:              Course,
  pub group_scope:         GroupScope,
  pub total_count:         u64,
  pub matched_count:       u64,
  pub page_count:          u64,
  pub empty_state:         Option<EmptyState>,
  pub last_access_visible: bool,
  /// The active filter as query pairs, page omitted, for building links.
  pub link_params:         Vec<(&'static str, String)>,
  pub rows:                Vec<PersonRow>,
}

/// `GET /directory?role=…&search=…&page=…`
pub async fn list<S>(
  State(directory): State<Directory<S>>,
  Viewer(viewer): Viewer,
  Query(params): Query<Params>,
) -> Result<Json<DirectoryPage>, ApiError>
where
  S: DirectoryStore + 'static,
{
  let result = directory.list(viewer, &params).await?;
  let last_access_visible = result.view.last_access_visible(directory.settings());

  let total_count = result.total_count;
  let matched_count = result.matched_count;
  let empty_state = result.empty_state();
  let view = result.view;
  let entries = result.rows.collect().await?;

  let page_count = match view.filter.show_all {
    true => u64::from(matched_count > 0),
    false => matched_count.div_ceil(u64::from(view.filter.per_page)),
  };

  Ok(Json(DirectoryPage {
    link_params: view.filter.link_params(None),
    filter: view.filter,
    role_options: view.role_options,
    course: view.course,
    group_scope: view.group_scope,
    total_count,
    matched_count,
    page_count,
    empty_state,
    last_access_visible,
    rows: entries
      .into_iter()
      .map(|e| PersonRow::from_entry(e, last_access_visible))
      .collect(),
  }))
}

// ─── Selector options ────────────────────────────────────────────────────────

/// `GET /directory/departments`
pub async fn departments<S>(
  State(directory): State<Directory<S>>,
  Viewer(_): Viewer,
) -> Result<Json<Vec<String>>, ApiError>
where
  S: DirectoryStore + 'static,
{
  Ok(Json(directory.department_options().await?))
}

/// `GET /directory/courses`
pub async fn courses<S>(
  State(directory): State<Directory<S>>,
  Viewer(viewer): Viewer,
) -> Result<Json<Vec<Course>>, ApiError>
where
  S: DirectoryStore + 'static,
{
  Ok(Json(directory.course_options(viewer).await?))
}
