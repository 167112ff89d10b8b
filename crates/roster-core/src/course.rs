//! Courses, course groups and the context tree.

use serde::{Deserialize, Serialize};

use crate::id::{CategoryId, ContextId, CourseId, GroupId};

/// How a course partitions its participants into groups.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
  #[default]
  None,
  /// Participants only see their own groups.
  Separate,
  /// Groups exist but everyone may browse all of them.
  Visible,
}

impl GroupMode {
  pub fn code(self) -> i64 {
    match self {
      Self::None => 0,
      Self::Separate => 1,
      Self::Visible => 2,
    }
  }

  pub fn from_code(code: i64) -> Self {
    match code {
      1 => Self::Separate,
      2 => Self::Visible,
      _ => Self::None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
  pub id:                  CourseId,
  pub full_name:           String,
  pub short_name:          String,
  pub group_mode:          GroupMode,
  pub default_grouping_id: Option<i64>,
  pub category_id:         Option<CategoryId>,
  /// The platform's front-page course, which every account belongs to.
  pub is_site:             bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseGroup {
  pub id:        GroupId,
  pub course_id: CourseId,
  pub name:      String,
}

// ─── Contexts ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextLevel {
  System,
  Category,
  Course,
  User,
}

/// A scope to which role assignments and capabilities attach. Assignments
/// made in a context are inherited by all of its descendants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
  pub id:          ContextId,
  pub parent_id:   Option<ContextId>,
  pub level:       ContextLevel,
  pub instance_id: i64,
}
