//! Cohort-based classification of people as teachers, students or parents.
//!
//! Classification is independent of formal role assignments: a person's
//! cohort memberships decide which rows they may see (as a viewer) and how
//! their own row is treated (as a listed person).

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  id::{CohortId, PersonId},
  settings::CohortSettings,
  store::DirectoryStore,
};

/// Independent cohort flags. A person may be in zero, one or several of the
/// configured cohorts; callers pick their own precedence.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub struct Classification {
  pub is_teacher: bool,
  pub is_student: bool,
  pub is_parent:  bool,
}

/// Which role-option table applies to a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCategory {
  Student,
  Parent,
  /// Teachers, administrators and anybody outside the student and parent
  /// cohorts.
  Staff,
}

impl Classification {
  /// Precedence for role options: the student check runs before the parent
  /// check, so a viewer in both cohorts gets the student table.
  pub fn viewer_category(self) -> ViewerCategory {
    if self.is_student {
      ViewerCategory::Student
    } else if self.is_parent {
      ViewerCategory::Parent
    } else {
      ViewerCategory::Staff
    }
  }

  /// Parent rows are withheld from student and parent viewers.
  pub fn may_see_parents(self) -> bool { !(self.is_student || self.is_parent) }
}

/// Looks up cohort membership through the store, memoising per person id for
/// the lifetime of one request.
pub struct RelationshipClassifier<S> {
  store:   Arc<S>,
  cohorts: CohortSettings,
  cache:   HashMap<PersonId, Classification>,
}

impl<S: DirectoryStore> RelationshipClassifier<S> {
  pub fn new(store: Arc<S>, cohorts: CohortSettings) -> Self {
    Self { store, cohorts, cache: HashMap::new() }
  }

  pub fn cohorts(&self) -> CohortSettings { self.cohorts }

  pub async fn classify(&mut self, person: PersonId) -> Result<Classification> {
    if let Some(known) = self.cache.get(&person) {
      return Ok(*known);
    }

    let classification = Classification {
      is_teacher: self.is_member(self.cohorts.teacher, person).await?,
      is_student: self.is_member(self.cohorts.student, person).await?,
      is_parent:  self.is_member(self.cohorts.parent, person).await?,
    };

    self.cache.insert(person, classification);
    Ok(classification)
  }

  async fn is_member(&self, cohort: CohortId, person: PersonId) -> Result<bool> {
    // An unconfigured cohort classifies nobody.
    let Some(cohort) = cohort.configured() else {
      return Ok(false);
    };
    self
      .store
      .is_cohort_member(cohort, person)
      .await
      .map_err(Error::store)
  }
}
