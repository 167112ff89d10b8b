//! Roles, the site role catalog, and the directory's coarse role categories.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result, id::RoleId};

/// Shortname of the editing teacher role.
pub const EDITING_TEACHER: &str = "editingteacher";
/// Shortname of the non-editing teacher role.
pub const TEACHER: &str = "teacher";
pub const STUDENT: &str = "student";
pub const PARENT: &str = "parent";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
  pub id:        RoleId,
  pub shortname: String,
  pub name:      String,
}

/// Every role defined on the site, keyed by shortname.
#[derive(Debug, Clone, Default)]
pub struct RoleCatalog {
  by_shortname: BTreeMap<String, RoleId>,
}

impl RoleCatalog {
  pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
    Self {
      by_shortname: roles
        .into_iter()
        .map(|r| (r.shortname, r.id))
        .collect(),
    }
  }

  pub fn get(&self, shortname: &str) -> Option<RoleId> {
    self.by_shortname.get(shortname).copied()
  }

  /// Resolve a role the directory cannot work without.
  pub fn require(&self, shortname: &str) -> Result<RoleId> {
    self.get(shortname).ok_or_else(|| {
      Error::Configuration(format!(
        "role {shortname:?} is not defined in the role catalog"
      ))
    })
  }

  pub fn len(&self) -> usize { self.by_shortname.len() }

  pub fn is_empty(&self) -> bool { self.by_shortname.is_empty() }
}

/// The directory's own filter label, distinct from underlying role ids.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Display,
  EnumString,
  AsRefStr,
  Serialize,
  Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RoleCategory {
  All,
  Teacher,
  Student,
  Parent,
}

impl RoleCategory {
  /// Human-readable label for the role selector.
  pub fn label(self) -> &'static str {
    match self {
      Self::All => "Everybody",
      Self::Teacher => "Teachers",
      Self::Student => "Students",
      Self::Parent => "Parents",
    }
  }
}
