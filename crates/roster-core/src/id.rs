//! Integer identifiers shared with the host platform's relational schema.
//!
//! Each id is a transparent newtype so a role id can never be passed where a
//! context id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
      Serialize, Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl $name {
      pub fn get(self) -> i64 { self.0 }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
      }
    }

    impl From<i64> for $name {
      fn from(v: i64) -> Self { Self(v) }
    }
  };
}

id_type!(
  /// A person in the identity store.
  PersonId
);
id_type!(RoleId);
id_type!(
  /// A node in the context tree (system, category, course or user).
  ContextId
);
id_type!(CourseId);
id_type!(CategoryId);
id_type!(GroupId);
id_type!(
  /// A site-wide cohort. `0` means "not configured".
  CohortId
);

impl CohortId {
  /// `None` when the cohort has not been configured by an administrator.
  pub fn configured(self) -> Option<Self> {
    (self.0 > 0).then_some(self)
  }
}

impl CourseId {
  pub fn is_set(self) -> bool { self.0 > 0 }
}
