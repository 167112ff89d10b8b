//! Process-wide directory configuration.
//!
//! Set by an administrator out of band and read-only while requests run.

use serde::{Deserialize, Serialize};

use crate::id::{CategoryId, CohortId, CourseId};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Large enough to cover any realistic directory in one page.
pub const SHOW_ALL_PAGE_SIZE: u32 = 5000;

/// Field name that hides the last-access column when listed in
/// [`DirectorySettings::hidden_user_fields`].
pub const LAST_ACCESS_FIELD: &str = "lastaccess";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectorySettings {
  /// Course whose enrolments make up the directory.
  pub course_id:          CourseId,
  #[serde(default)]
  pub teacher_cohort:     CohortId,
  #[serde(default)]
  pub student_cohort:     CohortId,
  #[serde(default)]
  pub parent_cohort:      CohortId,
  /// Restricts the course selector to this category's subtree.
  #[serde(default)]
  pub course_category:    Option<CategoryId>,
  #[serde(default = "default_page_size")]
  pub default_page_size:  u32,
  #[serde(default = "show_all_page_size")]
  pub show_all_page_size: u32,
  /// Profile fields hidden from viewers without the hidden-fields capability.
  #[serde(default)]
  pub hidden_user_fields: Vec<String>,
}

fn default_page_size() -> u32 { DEFAULT_PAGE_SIZE }

fn show_all_page_size() -> u32 { SHOW_ALL_PAGE_SIZE }

impl DirectorySettings {
  pub fn new(course_id: CourseId) -> Self {
    Self {
      course_id,
      teacher_cohort: CohortId::default(),
      student_cohort: CohortId::default(),
      parent_cohort: CohortId::default(),
      course_category: None,
      default_page_size: DEFAULT_PAGE_SIZE,
      show_all_page_size: SHOW_ALL_PAGE_SIZE,
      hidden_user_fields: Vec::new(),
    }
  }

  pub fn cohorts(&self) -> CohortSettings {
    CohortSettings {
      teacher: self.teacher_cohort,
      student: self.student_cohort,
      parent:  self.parent_cohort,
    }
  }

  pub fn hides_field(&self, field: &str) -> bool {
    self.hidden_user_fields.iter().any(|f| f == field)
  }
}

/// The three cohorts that classify people as teachers, students or parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CohortSettings {
  pub teacher: CohortId,
  pub student: CohortId,
  pub parent:  CohortId,
}
