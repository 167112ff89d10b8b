//! Encoding and decoding helpers between domain types and the values stored
//! in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with whole seconds and a `Z`
//! suffix, which keeps them fixed-width so `ORDER BY last_access` sorts
//! chronologically. Extra profile fields are stored as a JSON object.

use chrono::{DateTime, SecondsFormat, Utc};
use roster_core::{
  course::{Context, ContextLevel, Course, CourseGroup, GroupMode},
  id::{CategoryId, ContextId, CourseId, GroupId, PersonId},
  person::{MailDisplay, Person},
};

use crate::{Error, Result};

/// Column list matching [`RawPerson::from_row`], for `people p`.
pub const PERSON_COLUMNS: &str = "p.person_id, p.username, p.first_name, \
                                  p.last_name, p.middle_name, \
                                  p.alternate_name, p.email, p.department, \
                                  p.city, p.country, p.lang, p.timezone, \
                                  p.mail_display, p.last_access, p.extra_json";

pub const COURSE_COLUMNS: &str = "c.course_id, c.full_name, c.short_name, \
                                  c.group_mode, c.default_grouping_id, \
                                  c.category_id, c.is_site";

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── ContextLevel ────────────────────────────────────────────────────────────

pub fn encode_level(level: ContextLevel) -> &'static str {
  match level {
    ContextLevel::System => "system",
    ContextLevel::Category => "category",
    ContextLevel::Course => "course",
    ContextLevel::User => "user",
  }
}

pub fn decode_level(s: &str) -> Result<ContextLevel> {
  match s {
    "system" => Ok(ContextLevel::System),
    "category" => Ok(ContextLevel::Category),
    "course" => Ok(ContextLevel::Course),
    "user" => Ok(ContextLevel::User),
    other => Err(Error::UnknownEncoding {
      column: "context level",
      value:  other.to_owned(),
    }),
  }
}

// ─── Extra profile fields ────────────────────────────────────────────────────

pub fn encode_extra(
  extra: &serde_json::Map<String, serde_json::Value>,
) -> Result<String> {
  Ok(serde_json::to_string(extra)?)
}

pub fn decode_extra(s: &str) -> Result<serde_json::Map<String, serde_json::Value>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `people` row.
pub struct RawPerson {
  pub person_id:      i64,
  pub username:       String,
  pub first_name:     String,
  pub last_name:      String,
  pub middle_name:    Option<String>,
  pub alternate_name: Option<String>,
  pub email:          String,
  pub department:     String,
  pub city:           String,
  pub country:        String,
  pub lang:           String,
  pub timezone:       String,
  pub mail_display:   i64,
  pub last_access:    Option<String>,
  pub extra_json:     String,
}

impl RawPerson {
  /// Read a row selected with [`PERSON_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      person_id:      row.get(0)?,
      username:       row.get(1)?,
      first_name:     row.get(2)?,
      last_name:      row.get(3)?,
      middle_name:    row.get(4)?,
      alternate_name: row.get(5)?,
      email:          row.get(6)?,
      department:     row.get(7)?,
      city:           row.get(8)?,
      country:        row.get(9)?,
      lang:           row.get(10)?,
      timezone:       row.get(11)?,
      mail_display:   row.get(12)?,
      last_access:    row.get(13)?,
      extra_json:     row.get(14)?,
    })
  }

  pub fn into_person(self) -> Result<Person> {
    Ok(Person {
      id:             PersonId(self.person_id),
      username:       self.username,
      first_name:     self.first_name,
      last_name:      self.last_name,
      middle_name:    self.middle_name,
      alternate_name: self.alternate_name,
      email:          self.email,
      department:     self.department,
      city:           self.city,
      country:        self.country,
      lang:           self.lang,
      timezone:       self.timezone,
      mail_display:   MailDisplay::from_code(self.mail_display),
      last_access:    self.last_access.as_deref().map(decode_dt).transpose()?,
      extra:          decode_extra(&self.extra_json)?,
    })
  }
}

pub struct RawCourse {
  pub course_id:           i64,
  pub full_name:           String,
  pub short_name:          String,
  pub group_mode:          i64,
  pub default_grouping_id: Option<i64>,
  pub category_id:         Option<i64>,
  pub is_site:             bool,
}

impl RawCourse {
  /// Read a row selected with [`COURSE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      course_id:           row.get(0)?,
      full_name:           row.get(1)?,
      short_name:          row.get(2)?,
      group_mode:          row.get(3)?,
      default_grouping_id: row.get(4)?,
      category_id:         row.get(5)?,
      is_site:             row.get(6)?,
    })
  }

  pub fn into_course(self) -> Course {
    Course {
      id:                  CourseId(self.course_id),
      full_name:           self.full_name,
      short_name:          self.short_name,
      group_mode:          GroupMode::from_code(self.group_mode),
      default_grouping_id: self.default_grouping_id,
      category_id:         self.category_id.map(CategoryId),
      is_site:             self.is_site,
    }
  }
}

pub struct RawContext {
  pub context_id:  i64,
  pub parent_id:   Option<i64>,
  pub level:       String,
  pub instance_id: i64,
}

impl RawContext {
  pub fn into_context(self) -> Result<Context> {
    Ok(Context {
      id:          ContextId(self.context_id),
      parent_id:   self.parent_id.map(ContextId),
      level:       decode_level(&self.level)?,
      instance_id: self.instance_id,
    })
  }
}

pub fn decode_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<CourseGroup> {
  Ok(CourseGroup {
    id:        GroupId(row.get(0)?),
    course_id: CourseId(row.get(1)?),
    name:      row.get(2)?,
  })
}
