//! The `DirectoryStore` trait and the row cursor it hands out.
//!
//! The trait is implemented by storage backends (e.g. `roster-store-sqlite`).
//! The directory entry point and the HTTP layer depend on this abstraction,
//! never on a concrete backend.

use std::future::Future;

use crate::{
  course::{Context, Course, CourseGroup},
  id::{CategoryId, CohortId, ContextId, CourseId, GroupId, PersonId, RoleId},
  person::Person,
  query::{CountStage, DirectoryQuery},
  role::{Role, RoleCatalog},
};

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// A lazily produced sequence of people for one page of a directory query.
///
/// Backends fetch rows in batches. A cursor must be closed once the caller is
/// done with it; closing twice is a no-op.
pub trait PersonCursor: Send {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The next person, or `None` when the window is exhausted or the cursor has
  /// been closed.
  fn next(
    &mut self,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + '_;

  /// Release the cursor. Idempotent.
  fn close(&mut self);
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Read access to the host platform's enrolment, role and cohort data.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait DirectoryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
  type Cursor: PersonCursor<Error = Self::Error>;

  // ── Catalog ───────────────────────────────────────────────────────────

  fn role_catalog(
    &self,
  ) -> impl Future<Output = Result<RoleCatalog, Self::Error>> + Send + '_;

  fn get_course(
    &self,
    id: CourseId,
  ) -> impl Future<Output = Result<Option<Course>, Self::Error>> + Send + '_;

  fn course_context(
    &self,
    id: CourseId,
  ) -> impl Future<Output = Result<Option<Context>, Self::Error>> + Send + '_;

  fn category_context(
    &self,
    id: CategoryId,
  ) -> impl Future<Output = Result<Option<Context>, Self::Error>> + Send + '_;

  /// `context` itself followed by its ancestors, nearest first, up to the
  /// system context.
  fn ancestor_contexts(
    &self,
    context: ContextId,
  ) -> impl Future<Output = Result<Vec<ContextId>, Self::Error>> + Send + '_;

  // ── People ────────────────────────────────────────────────────────────
  //
  // `get_person`, `role_assignments` and `enrolled_persons` are the plain
  // reads behind a directory query. Listing goes through `count_people` and
  // `fetch_people` instead; these serve lookups and cross-checks of the
  // combined query against its parts.

  fn get_person(
    &self,
    id: PersonId,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + '_;

  /// Distinct roles assigned to a person in any context, ordered by id.
  fn roles_of_person(
    &self,
    id: PersonId,
  ) -> impl Future<Output = Result<Vec<Role>, Self::Error>> + Send + '_;

  /// Distinct people holding any of `role_ids` in any of `context_ids`.
  fn role_assignments<'a>(
    &'a self,
    role_ids: &'a [RoleId],
    context_ids: &'a [ContextId],
  ) -> impl Future<Output = Result<Vec<PersonId>, Self::Error>> + Send + 'a;

  /// People enrolled in `course`, optionally only members of `group`.
  fn enrolled_persons(
    &self,
    course: CourseId,
    group: Option<GroupId>,
  ) -> impl Future<Output = Result<Vec<PersonId>, Self::Error>> + Send + '_;

  /// Courses in which `person` holds a role assignment. With `within`, only
  /// courses whose context descends from that context.
  fn courses_of_person(
    &self,
    person: PersonId,
    within: Option<ContextId>,
  ) -> impl Future<Output = Result<Vec<Course>, Self::Error>> + Send + '_;

  /// Raw, distinct department values of all people.
  fn departments(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  // ── Groups ────────────────────────────────────────────────────────────

  fn course_groups(
    &self,
    course: CourseId,
  ) -> impl Future<Output = Result<Vec<CourseGroup>, Self::Error>> + Send + '_;

  fn groups_of_person(
    &self,
    course: CourseId,
    person: PersonId,
  ) -> impl Future<Output = Result<Vec<CourseGroup>, Self::Error>> + Send + '_;

  // ── Cohorts ───────────────────────────────────────────────────────────

  fn is_cohort_member(
    &self,
    cohort: CohortId,
    person: PersonId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Authorization ─────────────────────────────────────────────────────

  /// Whether any role assigned to `person` in `context` or one of its
  /// ancestors grants `capability`.
  fn has_capability(
    &self,
    person: PersonId,
    capability: &'static str,
    context: ContextId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Directory execution ───────────────────────────────────────────────

  /// Count distinct people satisfying the predicates of `stage`.
  fn count_people<'a>(
    &'a self,
    query: &'a DirectoryQuery,
    stage: CountStage,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Open a cursor over the matched stage, sorted and windowed.
  fn fetch_people<'a>(
    &'a self,
    query: &'a DirectoryQuery,
  ) -> impl Future<Output = Result<Self::Cursor, Self::Error>> + Send + 'a;
}
