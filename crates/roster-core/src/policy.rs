//! Role visibility policy: which role categories a viewer may browse, and the
//! role ids behind each of them.

use serde::Serialize;

use crate::{
  Result,
  classify::{Classification, ViewerCategory},
  id::RoleId,
  role::{EDITING_TEACHER, PARENT, RoleCatalog, RoleCategory, STUDENT, TEACHER},
};

/// One selectable entry of the role selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleOption {
  pub category: RoleCategory,
  pub label:    &'static str,
  pub role_ids: Vec<RoleId>,
}

/// The ordered role options available to a viewer. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VisibleRoles(Vec<RoleOption>);

impl VisibleRoles {
  /// The option used when the requested category is absent or not allowed.
  pub fn first(&self) -> &RoleOption { &self.0[0] }

  pub fn get(&self, category: RoleCategory) -> Option<&RoleOption> {
    self.0.iter().find(|o| o.category == category)
  }

  pub fn contains(&self, category: RoleCategory) -> bool {
    self.get(category).is_some()
  }

  pub fn categories(&self) -> impl Iterator<Item = RoleCategory> + '_ {
    self.0.iter().map(|o| o.category)
  }

  pub fn iter(&self) -> impl Iterator<Item = &RoleOption> { self.0.iter() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

/// Build the role options for `viewer`.
///
/// - students may browse everybody, teachers or students;
/// - parents may only browse teachers;
/// - everyone else additionally sees the parent category.
///
/// Fails with [`crate::Error::Configuration`] when a role the table needs is
/// missing from the catalog.
pub fn visible_roles(
  viewer: Classification,
  catalog: &RoleCatalog,
) -> Result<VisibleRoles> {
  let teachers = vec![
    catalog.require(EDITING_TEACHER)?,
    catalog.require(TEACHER)?,
  ];

  let options = match viewer.viewer_category() {
    ViewerCategory::Student => {
      let student = catalog.require(STUDENT)?;
      let mut all = teachers.clone();
      all.push(student);
      vec![
        option(RoleCategory::All, all),
        option(RoleCategory::Teacher, teachers),
        option(RoleCategory::Student, vec![student]),
      ]
    }
    ViewerCategory::Parent => vec![option(RoleCategory::Teacher, teachers)],
    ViewerCategory::Staff => {
      let student = catalog.require(STUDENT)?;
      let parent = catalog.require(PARENT)?;
      let mut all = teachers.clone();
      all.extend([student, parent]);
      vec![
        option(RoleCategory::All, all),
        option(RoleCategory::Teacher, teachers),
        option(RoleCategory::Student, vec![student]),
        option(RoleCategory::Parent, vec![parent]),
      ]
    }
  };

  Ok(VisibleRoles(options))
}

fn option(category: RoleCategory, role_ids: Vec<RoleId>) -> RoleOption {
  RoleOption { category, label: category.label(), role_ids }
}
