//! Translation of a [`DirectoryQuery`] into SQL text and positional
//! parameters.
//!
//! Every predicate is an `EXISTS` sub-select or a plain column test on
//! `people p`, so a person matches at most once and `COUNT(*)` counts distinct
//! people without a `DISTINCT`.
//!
//! Search and initials compare `fold(column) LIKE pattern`, where `fold` is
//! a Unicode lower-casing function registered on every connection and the
//! pattern is folded the same way in Rust. SQLite's own `LIKE` only ignores
//! case for ASCII letters.

use roster_core::{
  filter::{SearchScope, Sort, SortColumn, SortDirection},
  query::{CohortScope, CountStage, DirectoryQuery},
};
use rusqlite::{Connection, functions::FunctionFlags, types::Value};

/// `FROM … WHERE …` for a query stage, with its parameters in order.
#[derive(Debug)]
pub struct PeopleFilter {
  pub clause: String,
  pub params: Vec<Value>,
}

pub fn people_filter(query: &DirectoryQuery, stage: CountStage) -> PeopleFilter {
  let mut conds: Vec<String> = Vec::new();
  let mut params: Vec<Value> = Vec::new();

  // ── Scope ─────────────────────────────────────────────────────────────

  conds.push(format!(
    "EXISTS (SELECT 1 FROM role_assignments ra
             WHERE ra.person_id = p.person_id
               AND ra.role_id IN ({})
               AND ra.context_id IN ({}))",
    placeholders(query.role_ids.len()),
    placeholders(query.context_ids.len()),
  ));
  params.extend(query.role_ids.iter().map(|id| Value::Integer(id.get())));
  params.extend(query.context_ids.iter().map(|id| Value::Integer(id.get())));

  conds.push(
    "EXISTS (SELECT 1 FROM enrolments e
             WHERE e.person_id = p.person_id AND e.course_id = ?)"
      .to_owned(),
  );
  params.push(Value::Integer(query.course_id.get()));

  if let Some(group) = query.group {
    conds.push(
      "EXISTS (SELECT 1 FROM group_members gm
               WHERE gm.person_id = p.person_id AND gm.group_id = ?)"
        .to_owned(),
    );
    params.push(Value::Integer(group.get()));
  }

  if let Some(department) = &query.department {
    conds.push("p.department = ?".to_owned());
    params.push(Value::Text(department.clone()));
  }

  if let CohortScope::MembersOf(cohorts) = &query.cohort_scope {
    conds.push(format!(
      "EXISTS (SELECT 1 FROM cohort_members cm
               WHERE cm.person_id = p.person_id AND cm.cohort_id IN ({}))",
      placeholders(cohorts.len()),
    ));
    params.extend(cohorts.iter().map(|id| Value::Integer(id.get())));
  }

  if let Some(cohort) = query.exclude_cohort {
    conds.push(
      "NOT EXISTS (SELECT 1 FROM cohort_members cx
                   WHERE cx.person_id = p.person_id AND cx.cohort_id = ?)"
        .to_owned(),
    );
    params.push(Value::Integer(cohort.get()));
  }

  // ── Matched ───────────────────────────────────────────────────────────

  if stage == CountStage::Matched {
    if let Some(search) = &query.search {
      let columns: &[&str] = match search.scope {
        SearchScope::Name => &[FULL_NAME],
        SearchScope::Email => &["p.email"],
        SearchScope::Department => &["p.department"],
        SearchScope::Any => &[FULL_NAME, "p.email", "p.department"],
      };
      let pattern = like_contains(&search.text);
      let tests: Vec<String> = columns
        .iter()
        .map(|col| format!("fold({col}) LIKE ? ESCAPE '\\'"))
        .collect();
      conds.push(format!("({})", tests.join(" OR ")));
      params.extend(columns.iter().map(|_| Value::Text(pattern.clone())));
    }

    if let Some(initial) = query.first_initial {
      conds.push("fold(p.first_name) LIKE ? ESCAPE '\\'".to_owned());
      params.push(Value::Text(like_prefix(initial)));
    }
    if let Some(initial) = query.last_initial {
      conds.push("fold(p.last_name) LIKE ? ESCAPE '\\'".to_owned());
      params.push(Value::Text(like_prefix(initial)));
    }
  }

  PeopleFilter {
    clause: format!("FROM people p\nWHERE {}", conds.join("\n  AND ")),
    params,
  }
}

/// What name search matches against.
const FULL_NAME: &str = "(p.first_name || ' ' || p.last_name)";

/// `ORDER BY` for the requested sort. The person id breaks ties so that
/// windows never overlap or skip rows.
pub fn order_by(sort: Sort) -> String {
  let column = match sort.column {
    SortColumn::LastAccess => "p.last_access",
    SortColumn::FirstName => "p.first_name COLLATE NOCASE",
    SortColumn::LastName => "p.last_name COLLATE NOCASE",
    SortColumn::Email => "p.email COLLATE NOCASE",
    SortColumn::Department => "p.department COLLATE NOCASE",
  };
  let direction = match sort.direction {
    SortDirection::Asc => "ASC",
    SortDirection::Desc => "DESC",
  };
  format!("ORDER BY {column} {direction}, p.person_id ASC")
}

// ─── Case folding ────────────────────────────────────────────────────────────

/// Name of the SQL function registered by [`register_functions`].
pub const FOLD: &str = "fold";

/// Unicode lower-casing shared by the SQL function and the bound patterns.
pub fn fold(text: &str) -> String { text.to_lowercase() }

/// Register `fold(text)` on `conn`. `NULL` folds to `NULL`.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    FOLD,
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| {
      let text: Option<String> = ctx.get(0)?;
      Ok(text.map(|t| fold(&t)))
    },
  )
}

/// `n` comma-separated positional placeholders.
pub fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

/// Escape `LIKE` metacharacters so user input only ever matches literally.
fn escape_like(input: &str) -> String {
  input
    .replace('\\', r"\\")
    .replace('%', r"\%")
    .replace('_', r"\_")
}

fn like_contains(text: &str) -> String {
  format!("%{}%", escape_like(&fold(text)))
}

fn like_prefix(initial: char) -> String {
  format!("{}%", escape_like(&fold(&initial.to_string())))
}
