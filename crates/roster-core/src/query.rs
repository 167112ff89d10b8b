//! The directory query plan.
//!
//! [`DirectoryQueryBuilder`] combines the viewer, the active [`FilterState`]
//! and the course scope into a [`DirectoryQuery`]. Backends translate the plan
//! into their own query language; the plan itself performs no I/O.
//!
//! A plan is evaluated in two stages (see [`CountStage`]):
//!
//! 1. **scope**: role assignment in the course context or any ancestor,
//!    enrolment in the course (and group), exact department, the viewer's
//!    cohort restriction, and exclusion of parent-cohort members for viewers
//!    who may not see parents. Counting this stage yields the *total* count.
//! 2. **matched**: scope plus free-text search and name initials. Counting
//!    this stage yields the *matched* count; rows are fetched from it in the
//!    requested order and window.

use serde::Serialize;

use crate::{
  classify::Classification,
  filter::{FilterState, SearchScope, Sort, Window},
  id::{CohortId, ContextId, CourseId, GroupId, RoleId},
  settings::CohortSettings,
};

/// Row restriction derived from the viewer's cohort classification. It is
/// applied on top of the role category: the category narrows by role, this
/// narrows by cohort, and both hold at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "cohorts", rename_all = "snake_case")]
pub enum CohortScope {
  Everyone,
  /// Only members of at least one of these cohorts. An empty list admits
  /// nobody.
  MembersOf(Vec<CohortId>),
}

impl CohortScope {
  /// Parents see teachers; students see teachers and students; everyone else
  /// is unrestricted.
  ///
  /// The parent check runs first so that a viewer in both the parent and the
  /// student cohort gets the narrower scope.
  pub fn for_viewer(viewer: Classification, cohorts: CohortSettings) -> Self {
    let configured = |ids: &[CohortId]| {
      ids.iter().filter_map(|id| id.configured()).collect::<Vec<_>>()
    };

    if viewer.is_parent {
      Self::MembersOf(configured(&[cohorts.teacher]))
    } else if viewer.is_student {
      Self::MembersOf(configured(&[cohorts.teacher, cohorts.student]))
    } else {
      Self::Everyone
    }
  }
}

/// Case-insensitive substring search over the fields named by `scope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchPredicate {
  pub text:  String,
  pub scope: SearchScope,
}

/// Which predicates a count includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountStage {
  /// Role, enrolment, department and cohort scope: the total count.
  Scope,
  /// Scope plus search and initials: the matched count.
  Matched,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryQuery {
  pub course_id:      CourseId,
  pub group:          Option<GroupId>,
  /// Role ids of the active role category.
  pub role_ids:       Vec<RoleId>,
  /// The course context followed by its ancestors.
  pub context_ids:    Vec<ContextId>,
  pub department:     Option<String>,
  pub cohort_scope:   CohortScope,
  /// Members of this cohort are left out entirely. Set to the parent cohort
  /// for student and parent viewers, so counts and pages agree with the rows
  /// those viewers are shown.
  pub exclude_cohort: Option<CohortId>,
  pub search:         Option<SearchPredicate>,
  pub first_initial:  Option<char>,
  pub last_initial:   Option<char>,
  pub sort:           Sort,
  pub window:         Window,
}

impl DirectoryQuery {
  /// True when the scope stage cannot match anybody, so a backend may skip
  /// the round trip.
  pub fn admits_nobody(&self) -> bool {
    self.role_ids.is_empty()
      || self.context_ids.is_empty()
      || matches!(&self.cohort_scope, CohortScope::MembersOf(ids) if ids.is_empty())
  }

  /// Whether the matched stage adds anything beyond the scope stage.
  pub fn narrows_scope(&self) -> bool {
    self.search.is_some()
      || self.first_initial.is_some()
      || self.last_initial.is_some()
  }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

pub struct DirectoryQueryBuilder {
  course_id:    CourseId,
  context_ids:  Vec<ContextId>,
  group:          Option<GroupId>,
  cohort_scope:   CohortScope,
  exclude_cohort: Option<CohortId>,
}

impl DirectoryQueryBuilder {
  /// `context_ids` must list the course context and all of its ancestors,
  /// since role assignments are inherited downward.
  pub fn new(course_id: CourseId, context_ids: Vec<ContextId>) -> Self {
    Self {
      course_id,
      context_ids,
      group: None,
      cohort_scope: CohortScope::Everyone,
      exclude_cohort: None,
    }
  }

  /// Restrict enrolment to one course group.
  pub fn group(mut self, group: Option<GroupId>) -> Self {
    self.group = group;
    self
  }

  pub fn viewer(mut self, viewer: Classification, cohorts: CohortSettings) -> Self {
    self.cohort_scope = CohortScope::for_viewer(viewer, cohorts);
    self.exclude_cohort = match viewer.may_see_parents() {
      true => None,
      false => cohorts.parent.configured(),
    };
    self
  }

  pub fn build(self, filter: &FilterState) -> DirectoryQuery {
    DirectoryQuery {
      course_id:      self.course_id,
      group:          self.group,
      role_ids:       filter.role_ids.clone(),
      context_ids:    self.context_ids,
      department:     filter.department.clone(),
      cohort_scope:   self.cohort_scope,
      exclude_cohort: self.exclude_cohort,
      search:         filter.search.clone().map(|text| SearchPredicate {
        text,
        scope: filter.search_scope,
      }),
      first_initial:  filter.first_initial,
      last_initial:   filter.last_initial,
      sort:           filter.sort,
      window:         filter.window(),
    }
  }
}
