//! [`FilterState`]: the validated filter for one directory request.
//!
//! Built once from the flat query-string map. Parsing is permissive: missing
//! or malformed values silently fall back to their defaults and never error.

use std::collections::HashMap;

use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

use crate::{
  id::{CourseId, GroupId, RoleId},
  policy::VisibleRoles,
  role::RoleCategory,
  settings::DirectorySettings,
};

/// Raw request parameters.
pub type Params = HashMap<String, String>;

// ─── Parameter names ─────────────────────────────────────────────────────────

pub const ROLE: &str = "role";
pub const DEPARTMENT: &str = "department";
pub const SEARCH: &str = "search";
pub const SEARCH_IN: &str = "searchin";
pub const FIRST_INITIAL: &str = "sifirst";
pub const LAST_INITIAL: &str = "silast";
pub const PAGE: &str = "page";
pub const PER_PAGE: &str = "perpage";
pub const COURSE_ID: &str = "courseid";
pub const GROUP: &str = "group";
pub const SORT: &str = "ssort";
pub const SORT_DIR: &str = "sdir";

// ─── Search scope ────────────────────────────────────────────────────────────

/// Which fields the free-text search looks at.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr,
  Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
  /// First and last name joined by a space.
  Name,
  Email,
  Department,
  /// Name, email and department at once.
  #[default]
  Any,
}

impl SearchScope {
  /// Anything other than `name`, `email` or `department` means [`Self::Any`].
  pub fn from_param(raw: &str) -> Self {
    match raw.parse::<Self>() {
      Ok(Self::Any) | Err(_) => Self::Any,
      Ok(scope) => scope,
    }
  }

  /// Query-string value; the "all fields" option is the empty string.
  pub fn as_param(self) -> &'static str {
    match self {
      Self::Name => "name",
      Self::Email => "email",
      Self::Department => "department",
      Self::Any => "",
    }
  }
}

// ─── Sort ────────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SortColumn {
  LastAccess,
  FirstName,
  LastName,
  Email,
  Department,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
  Asc,
  Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sort {
  pub column:    SortColumn,
  pub direction: SortDirection,
}

impl Sort {
  /// Most recently seen first when the viewer may see last access, otherwise
  /// alphabetical by last name.
  pub fn default_for(last_access_visible: bool) -> Self {
    if last_access_visible {
      Self { column: SortColumn::LastAccess, direction: SortDirection::Desc }
    } else {
      Self { column: SortColumn::LastName, direction: SortDirection::Asc }
    }
  }

  fn parse(params: &Params, last_access_visible: bool) -> Self {
    let fallback = Self::default_for(last_access_visible);
    let Some(column) = text(params, SORT).and_then(|s| s.parse::<SortColumn>().ok()) else {
      return fallback;
    };
    if column == SortColumn::LastAccess && !last_access_visible {
      return fallback;
    }
    let direction = text(params, SORT_DIR)
      .and_then(|s| s.parse::<SortDirection>().ok())
      .unwrap_or(match column {
        SortColumn::LastAccess => SortDirection::Desc,
        _ => SortDirection::Asc,
      });
    Self { column, direction }
  }
}

// ─── Paging ──────────────────────────────────────────────────────────────────

/// The slice of matched rows to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
  pub offset: u64,
  pub limit:  u64,
}

// ─── FilterState ─────────────────────────────────────────────────────────────

/// Inputs that depend on the viewer rather than on the request.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
  pub visible_roles:       &'a VisibleRoles,
  pub settings:            &'a DirectorySettings,
  /// Whether the last-access column is visible to the viewer.
  pub last_access_visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterState {
  pub role:          RoleCategory,
  /// Role ids behind [`Self::role`] for this viewer.
  pub role_ids:      Vec<RoleId>,
  pub course_id:     CourseId,
  pub group:         Option<GroupId>,
  /// Exact department match; only ever set for the student category.
  pub department:    Option<String>,
  pub search:        Option<String>,
  pub search_scope:  SearchScope,
  pub first_initial: Option<char>,
  pub last_initial:  Option<char>,
  pub page:          u64,
  pub per_page:      u32,
  /// `per_page` reached the show-all size; paging is disabled.
  pub show_all:      bool,
  pub sort:          Sort,
}

impl FilterState {
  /// The course a request targets, before any other parameter is parsed.
  pub fn course_id(params: &Params, settings: &DirectorySettings) -> CourseId {
    integer(params, COURSE_ID)
      .filter(|id| *id > 0)
      .map(CourseId)
      .unwrap_or(settings.course_id)
  }

  pub fn parse(params: &Params, cx: ParseContext<'_>) -> Self {
    let requested = text(params, ROLE).and_then(|s| s.parse::<RoleCategory>().ok());
    let option = match requested.and_then(|c| cx.visible_roles.get(c)) {
      Some(option) => option,
      None => {
        let first = cx.visible_roles.first();
        if let Some(requested) = requested {
          tracing::debug!(%requested, fallback = %first.category, "role category not allowed");
        }
        first
      }
    };

    let department = match option.category {
      RoleCategory::Student => text(params, DEPARTMENT).map(str::to_owned),
      _ => None,
    };

    let show_all_size = cx.settings.show_all_page_size.max(1);
    let per_page = integer(params, PER_PAGE)
      .map(|n| n.clamp(1, i64::from(show_all_size)) as u32)
      .unwrap_or_else(|| cx.settings.default_page_size.clamp(1, show_all_size));
    let show_all = per_page >= show_all_size;

    let page = if show_all {
      0
    } else {
      integer(params, PAGE).map_or(0, |n| n.max(0) as u64)
    };

    Self {
      role: option.category,
      role_ids: option.role_ids.clone(),
      course_id: Self::course_id(params, cx.settings),
      group: integer(params, GROUP).filter(|id| *id > 0).map(GroupId),
      department,
      search: text(params, SEARCH).map(str::to_owned),
      search_scope: text(params, SEARCH_IN).map_or(SearchScope::Any, SearchScope::from_param),
      first_initial: initial(params, FIRST_INITIAL),
      last_initial: initial(params, LAST_INITIAL),
      page,
      per_page,
      show_all,
      sort: Sort::parse(params, cx.last_access_visible),
    }
  }

  pub fn window(&self) -> Window {
    let limit = u64::from(self.per_page);
    Window { offset: self.page.saturating_mul(limit), limit }
  }

  /// The current filter as query pairs, with the page reset.
  ///
  /// `skip` drops one key, which is what a selector needs when it supplies
  /// that key itself.
  pub fn link_params(&self, skip: Option<&str>) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
      (COURSE_ID, self.course_id.to_string()),
      (ROLE, self.role.to_string()),
    ];
    if let Some(department) = &self.department {
      pairs.push((DEPARTMENT, department.clone()));
    }
    if let Some(search) = &self.search {
      pairs.push((SEARCH, search.clone()));
      pairs.push((SEARCH_IN, self.search_scope.as_param().to_owned()));
    }
    if let Some(c) = self.first_initial {
      pairs.push((FIRST_INITIAL, c.to_string()));
    }
    if let Some(c) = self.last_initial {
      pairs.push((LAST_INITIAL, c.to_string()));
    }
    if let Some(group) = self.group {
      pairs.push((GROUP, group.to_string()));
    }
    pairs.push((PER_PAGE, self.per_page.to_string()));
    pairs.push((SORT, self.sort.column.to_string()));
    pairs.push((SORT_DIR, self.sort.direction.to_string()));

    if let Some(skip) = skip {
      pairs.retain(|(k, _)| *k != skip);
    }
    pairs
  }
}

// ─── Parsing helpers ─────────────────────────────────────────────────────────

/// Non-empty raw value.
fn text<'p>(params: &'p Params, key: &str) -> Option<&'p str> {
  params.get(key).map(String::as_str).filter(|s| !s.is_empty())
}

fn integer(params: &Params, key: &str) -> Option<i64> {
  text(params, key).and_then(|s| s.trim().parse().ok())
}

/// A single letter, upper-cased. Longer values are ignored.
fn initial(params: &Params, key: &str) -> Option<char> {
  let raw = text(params, key)?;
  let mut chars = raw.chars();
  match (chars.next(), chars.next()) {
    (Some(c), None) if c.is_alphabetic() => c.to_uppercase().next(),
    _ => None,
  }
}
