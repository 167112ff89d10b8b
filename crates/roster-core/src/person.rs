//! Person: the identity record the directory lists.
//!
//! Owned by the host platform's identity store; the directory only reads it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::PersonId;

/// Who may see a person's email address.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MailDisplay {
  /// Only people allowed to see hidden fields.
  #[default]
  Hidden,
  Everyone,
  /// Anyone sharing a (non-site) course with the person.
  CourseMembers,
}

impl MailDisplay {
  /// The integer stored by the host platform.
  pub fn code(self) -> i64 {
    match self {
      Self::Hidden => 0,
      Self::Everyone => 1,
      Self::CourseMembers => 2,
    }
  }

  /// Unknown codes are treated as [`MailDisplay::Hidden`].
  pub fn from_code(code: i64) -> Self {
    match code {
      1 => Self::Everyone,
      2 => Self::CourseMembers,
      _ => Self::Hidden,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
  pub id:             PersonId,
  pub username:       String,
  pub first_name:     String,
  pub last_name:      String,
  pub middle_name:    Option<String>,
  pub alternate_name: Option<String>,
  pub email:          String,
  /// Free-form department; schools use it for homeroom codes like `6A`.
  pub department:     String,
  pub city:           String,
  pub country:        String,
  pub lang:           String,
  pub timezone:       String,
  pub mail_display:   MailDisplay,
  pub last_access:    Option<DateTime<Utc>>,
  /// Site-specific profile fields.
  #[serde(default)]
  pub extra:          serde_json::Map<String, serde_json::Value>,
}

impl Person {
  /// First and last name joined by a space; this is what name search matches.
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }
}
