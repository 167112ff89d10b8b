//! [`Directory`]: the entry point that ties policy, filter, query plan and
//! store together for one viewer request.

use std::{collections::HashSet, sync::Arc};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  capability::{ACCESS_ALL_GROUPS, VIEW_HIDDEN_USER_FIELDS, VIEW_PARTICIPANTS},
  classify::{Classification, RelationshipClassifier},
  course::{Context, Course, GroupMode},
  department,
  filter::{FilterState, ParseContext, Params},
  id::{ContextId, GroupId, PersonId},
  person::{MailDisplay, Person},
  policy::{self, VisibleRoles},
  query::{CountStage, DirectoryQueryBuilder},
  role::Role,
  settings::{DirectorySettings, LAST_ACCESS_FIELD},
  store::{DirectoryStore, PersonCursor},
};

// ─── Outcome types ───────────────────────────────────────────────────────────

/// Why a listing has no rows. None of these are errors: the filter state and
/// role options are still returned so the caller can render its selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyState {
  /// Nobody is in scope for the selected role category.
  NothingToDisplay,
  /// People are in scope, but the search or initials matched none of them.
  NoMatches,
  /// The course uses separate groups and the viewer belongs to none.
  NotInGroup,
}

/// Which part of the course enrolment the listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "group", rename_all = "snake_case")]
pub enum GroupScope {
  WholeCourse,
  Group(GroupId),
  NotInGroup,
}

/// Everything resolved about a request before any people query runs.
#[derive(Debug, Clone)]
pub struct DirectoryView {
  pub viewer:          PersonId,
  pub classification:  Classification,
  pub role_options:    VisibleRoles,
  pub course:          Course,
  pub context:         Context,
  pub filter:          FilterState,
  pub group_scope:     GroupScope,
  /// The viewer holds `course:viewhiddenuserfields` in the course.
  pub can_view_hidden: bool,
}

impl DirectoryView {
  pub fn last_access_visible(&self, settings: &DirectorySettings) -> bool {
    self.can_view_hidden || !settings.hides_field(LAST_ACCESS_FIELD)
  }
}

/// One listed person, annotated for the viewer.
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryEntry {
  pub person:        Person,
  pub relationship:  Classification,
  pub roles:         Vec<Role>,
  pub email_visible: bool,
}

pub struct DirectoryResult<S: DirectoryStore> {
  pub view:          DirectoryView,
  pub total_count:   u64,
  pub matched_count: u64,
  empty_state:       Option<EmptyState>,
  pub rows:          DirectoryRows<S>,
}

impl<S: DirectoryStore> DirectoryResult<S> {
  pub fn empty_state(&self) -> Option<EmptyState> { self.empty_state }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// The current page of a listing, produced lazily from a store cursor.
///
/// Rows are deduplicated by person id, parents are withheld from student and
/// parent viewers, and each row is annotated with its cohort relationship,
/// its roles, and whether its email address may be shown.
pub struct DirectoryRows<S: DirectoryStore> {
  store:           Arc<S>,
  cursor:          Option<S::Cursor>,
  classifier:      RelationshipClassifier<S>,
  viewer:          PersonId,
  may_see_parents: bool,
  can_view_hidden: bool,
  site_course:     bool,
  seen:            HashSet<PersonId>,
}

impl<S: DirectoryStore> DirectoryRows<S> {
  pub async fn next(&mut self) -> Result<Option<DirectoryEntry>> {
    loop {
      let next = match self.cursor.as_mut() {
        Some(cursor) => cursor.next().await.map_err(Error::store)?,
        None => return Ok(None),
      };
      let Some(person) = next else {
        self.close();
        return Ok(None);
      };

      if !self.seen.insert(person.id) {
        continue;
      }

      let relationship = self.classifier.classify(person.id).await?;
      if relationship.is_parent && !self.may_see_parents {
        debug!(person = %person.id, "withholding parent row");
        continue;
      }

      let roles = self
        .store
        .roles_of_person(person.id)
        .await
        .map_err(Error::store)?;
      let email_visible = email_visible(
        &person,
        self.viewer,
        self.site_course,
        self.can_view_hidden,
      );

      return Ok(Some(DirectoryEntry {
        person,
        relationship,
        roles,
        email_visible,
      }));
    }
  }

  /// Release the underlying cursor. Safe to call more than once.
  pub fn close(&mut self) {
    if let Some(mut cursor) = self.cursor.take() {
      cursor.close();
    }
  }

  /// Drain the remaining rows. The cursor is closed whether or not draining
  /// succeeds.
  pub async fn collect(mut self) -> Result<Vec<DirectoryEntry>> {
    let mut entries = Vec::new();
    let outcome = loop {
      match self.next().await {
        Ok(Some(entry)) => entries.push(entry),
        Ok(None) => break Ok(entries),
        Err(e) => break Err(e),
      }
    };
    self.close();
    outcome
  }
}

/// Whether `viewer` may see `person`'s email address.
pub fn email_visible(
  person: &Person,
  viewer: PersonId,
  site_course: bool,
  can_view_hidden: bool,
) -> bool {
  can_view_hidden
    || person.id == viewer
    || match person.mail_display {
      MailDisplay::Everyone => true,
      MailDisplay::CourseMembers => !site_course,
      MailDisplay::Hidden => false,
    }
}

// ─── Directory ───────────────────────────────────────────────────────────────

pub struct Directory<S> {
  store:    Arc<S>,
  settings: Arc<DirectorySettings>,
}

impl<S> Clone for Directory<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      settings: Arc::clone(&self.settings),
    }
  }
}

impl<S: DirectoryStore> Directory<S> {
  pub fn new(store: Arc<S>, settings: DirectorySettings) -> Self {
    Self { store, settings: Arc::new(settings) }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn settings(&self) -> &DirectorySettings { &self.settings }

  /// Resolve the viewer, course, role options and filter for a request
  /// without touching the people tables.
  pub async fn open(&self, viewer: PersonId, params: &Params) -> Result<DirectoryView> {
    self.prepare(viewer, params).await.map(|(view, _)| view)
  }

  /// Run a directory request end to end.
  pub async fn list(
    &self,
    viewer: PersonId,
    params: &Params,
  ) -> Result<DirectoryResult<S>> {
    let (view, classifier) = self.prepare(viewer, params).await?;

    let mut rows = DirectoryRows {
      store: Arc::clone(&self.store),
      cursor: None,
      classifier,
      viewer,
      may_see_parents: view.classification.may_see_parents(),
      can_view_hidden: view.can_view_hidden,
      site_course: view.course.is_site,
      seen: HashSet::new(),
    };

    let group = match view.group_scope {
      GroupScope::NotInGroup => {
        debug!(viewer = %viewer, course = %view.course.id, "viewer is in no group");
        return Ok(empty(view, 0, 0, EmptyState::NotInGroup, rows));
      }
      GroupScope::WholeCourse => None,
      GroupScope::Group(group) => Some(group),
    };

    let ancestors = self
      .store
      .ancestor_contexts(view.context.id)
      .await
      .map_err(Error::store)?;
    let query = DirectoryQueryBuilder::new(view.course.id, ancestors)
      .group(group)
      .viewer(view.classification, self.settings.cohorts())
      .build(&view.filter);
    debug!(?query, "directory query plan");

    let total = self
      .store
      .count_people(&query, CountStage::Scope)
      .await
      .map_err(Error::store)?;
    if total == 0 {
      return Ok(empty(view, 0, 0, EmptyState::NothingToDisplay, rows));
    }

    let matched = if query.narrows_scope() {
      self
        .store
        .count_people(&query, CountStage::Matched)
        .await
        .map_err(Error::store)?
    } else {
      total
    };
    debug!(total, matched, "directory counts");
    if matched == 0 {
      return Ok(empty(view, total, 0, EmptyState::NoMatches, rows));
    }

    rows.cursor = Some(
      self
        .store
        .fetch_people(&query)
        .await
        .map_err(Error::store)?,
    );

    info!(
      viewer = %viewer,
      course = %view.course.id,
      role = %view.filter.role,
      page = view.filter.page,
      total,
      matched,
      "directory listed"
    );

    Ok(DirectoryResult {
      view,
      total_count: total,
      matched_count: matched,
      empty_state: None,
      rows,
    })
  }

  /// Department selector options, in homeroom order.
  pub async fn department_options(&self) -> Result<Vec<String>> {
    let raw = self.store.departments().await.map_err(Error::store)?;
    Ok(department::options(raw))
  }

  /// Course selector options: the directory course first, then the viewer's
  /// own courses by full name.
  pub async fn course_options(&self, viewer: PersonId) -> Result<Vec<Course>> {
    let mut options = Vec::new();
    if self.settings.course_id.is_set() {
      let course = self
        .store
        .get_course(self.settings.course_id)
        .await
        .map_err(Error::store)?;
      options.extend(course);
    }

    let within = match self.settings.course_category {
      None => None,
      Some(category) => {
        match self
          .store
          .category_context(category)
          .await
          .map_err(Error::store)?
        {
          Some(context) => Some(context.id),
          None => {
            warn!(%category, "configured course category has no context");
            return Ok(options);
          }
        }
      }
    };

    let mut theirs = self
      .store
      .courses_of_person(viewer, within)
      .await
      .map_err(Error::store)?;
    theirs.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));

    for course in theirs {
      if !course.is_site && !options.iter().any(|o| o.id == course.id) {
        options.push(course);
      }
    }
    Ok(options)
  }

  // ── Internals ─────────────────────────────────────────────────────────

  async fn prepare(
    &self,
    viewer: PersonId,
    params: &Params,
  ) -> Result<(DirectoryView, RelationshipClassifier<S>)> {
    let course_id = FilterState::course_id(params, &self.settings);
    if !course_id.is_set() {
      return Err(Error::Configuration(
        "no directory course has been configured".into(),
      ));
    }

    let course = self
      .store
      .get_course(course_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::CourseNotFound(course_id))?;
    let context = self
      .store
      .course_context(course_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ContextNotFound(course_id))?;

    if !self.capable(viewer, VIEW_PARTICIPANTS, context.id).await? {
      return Err(Error::Unauthorized {
        capability: VIEW_PARTICIPANTS,
        context:    context.id,
      });
    }
    let can_view_hidden = self.capable(viewer, VIEW_HIDDEN_USER_FIELDS, context.id).await?;

    let mut classifier =
      RelationshipClassifier::new(Arc::clone(&self.store), self.settings.cohorts());
    let classification = classifier.classify(viewer).await?;

    let catalog = self.store.role_catalog().await.map_err(Error::store)?;
    let role_options = policy::visible_roles(classification, &catalog)?;

    let mut filter = FilterState::parse(params, ParseContext {
      visible_roles:       &role_options,
      settings:            &self.settings,
      last_access_visible: can_view_hidden
        || !self.settings.hides_field(LAST_ACCESS_FIELD),
    });

    let group_scope = self
      .group_scope(viewer, &course, context.id, filter.group)
      .await?;
    filter.group = match group_scope {
      GroupScope::Group(group) => Some(group),
      _ => None,
    };

    let view = DirectoryView {
      viewer,
      classification,
      role_options,
      course,
      context,
      filter,
      group_scope,
      can_view_hidden,
    };
    Ok((view, classifier))
  }

  /// Decide which group a request covers.
  ///
  /// Visible groups, or the all-groups capability, let the viewer pick any
  /// group or none. Otherwise the viewer is limited to their own groups and
  /// lands in the first of them when the request names none of those.
  async fn group_scope(
    &self,
    viewer: PersonId,
    course: &Course,
    context: ContextId,
    requested: Option<GroupId>,
  ) -> Result<GroupScope> {
    if course.group_mode == GroupMode::None {
      return Ok(GroupScope::WholeCourse);
    }

    let any_group = course.group_mode == GroupMode::Visible
      || self.capable(viewer, ACCESS_ALL_GROUPS, context).await?;
    let allowed = match any_group {
      true => self.store.course_groups(course.id).await,
      false => self.store.groups_of_person(course.id, viewer).await,
    };
    let allowed = allowed.map_err(Error::store)?;

    if let Some(group) = requested.filter(|g| allowed.iter().any(|a| a.id == *g)) {
      return Ok(GroupScope::Group(group));
    }
    if any_group {
      return Ok(GroupScope::WholeCourse);
    }
    Ok(
      allowed
        .first()
        .map_or(GroupScope::NotInGroup, |g| GroupScope::Group(g.id)),
    )
  }

  async fn capable(
    &self,
    viewer: PersonId,
    capability: &'static str,
    context: ContextId,
  ) -> Result<bool> {
    self
      .store
      .has_capability(viewer, capability, context)
      .await
      .map_err(Error::store)
  }
}

fn empty<S: DirectoryStore>(
  view: DirectoryView,
  total: u64,
  matched: u64,
  state: EmptyState,
  rows: DirectoryRows<S>,
) -> DirectoryResult<S> {
  DirectoryResult {
    view,
    total_count: total,
    matched_count: matched,
    empty_state: Some(state),
    rows,
  }
}
