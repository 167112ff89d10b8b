//! [`SqliteStore`]: the SQLite implementation of [`DirectoryStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use rusqlite::types::Value;

use roster_core::{
  course::{Context, ContextLevel, Course, CourseGroup},
  id::{CategoryId, CohortId, ContextId, CourseId, GroupId, PersonId, RoleId},
  person::Person,
  query::{CountStage, DirectoryQuery},
  role::{Role, RoleCatalog},
  store::DirectoryStore,
};
use tracing::debug;

use crate::{
  Result,
  cursor::{DEFAULT_BATCH_SIZE, SqliteCursor},
  encode::{
    COURSE_COLUMNS, PERSON_COLUMNS, RawContext, RawCourse, RawPerson,
    decode_group, encode_dt, encode_extra, encode_level,
  },
  error::Error,
  schema::SCHEMA,
  sql::{order_by, people_filter, placeholders, register_functions},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A directory store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:       tokio_rusqlite::Connection,
  batch_size: u64,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, batch_size: DEFAULT_BATCH_SIZE };
    store.init().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, batch_size: DEFAULT_BATCH_SIZE };
    store.init().await?;
    Ok(store)
  }

  /// Rows fetched per cursor round trip.
  pub fn with_batch_size(mut self, batch_size: u64) -> Self {
    self.batch_size = batch_size.max(1);
    self
  }

  /// Register the SQL functions the directory queries use, then create the
  /// schema.
  async fn init(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        register_functions(conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a single write statement.
  async fn execute(&self, sql: &'static str, params: Vec<Value>) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(sql, rusqlite::params_from_iter(params.iter()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a query returning a single integer column.
  async fn ids(&self, sql: String, params: Vec<Value>) -> Result<Vec<i64>> {
    let ids = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(ids)
  }

  async fn context_at(&self, level: ContextLevel, instance: i64) -> Result<Option<Context>> {
    let level_str = encode_level(level);

    let raw: Option<RawContext> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT context_id, parent_id, level, instance_id
             FROM contexts WHERE level = ?1 AND instance_id = ?2",
            rusqlite::params![level_str, instance],
            |row| {
              Ok(RawContext {
                context_id:  row.get(0)?,
                parent_id:   row.get(1)?,
                level:       row.get(2)?,
                instance_id: row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawContext::into_context).transpose()
  }

  async fn groups(&self, sql: &'static str, params: Vec<Value>) -> Result<Vec<CourseGroup>> {
    let groups = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), decode_group)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(groups)
  }
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Population of the mirrored platform tables. The directory itself never
/// writes; these exist for sync jobs and tests.
impl SqliteStore {
  pub async fn insert_person(&self, person: &Person) -> Result<()> {
    let params = vec![
      Value::Integer(person.id.get()),
      Value::Text(person.username.clone()),
      Value::Text(person.first_name.clone()),
      Value::Text(person.last_name.clone()),
      person.middle_name.clone().map_or(Value::Null, Value::Text),
      person.alternate_name.clone().map_or(Value::Null, Value::Text),
      Value::Text(person.email.clone()),
      Value::Text(person.department.clone()),
      Value::Text(person.city.clone()),
      Value::Text(person.country.clone()),
      Value::Text(person.lang.clone()),
      Value::Text(person.timezone.clone()),
      Value::Integer(person.mail_display.code()),
      person.last_access.map(encode_dt).map_or(Value::Null, Value::Text),
      Value::Text(encode_extra(&person.extra)?),
    ];

    self
      .execute(
        "INSERT INTO people (
           person_id, username, first_name, last_name, middle_name,
           alternate_name, email, department, city, country, lang, timezone,
           mail_display, last_access, extra_json
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params,
      )
      .await
  }

  pub async fn insert_context(&self, context: &Context) -> Result<()> {
    self
      .execute(
        "INSERT INTO contexts (context_id, parent_id, level, instance_id)
         VALUES (?1, ?2, ?3, ?4)",
        vec![
          Value::Integer(context.id.get()),
          context.parent_id.map_or(Value::Null, |p| Value::Integer(p.get())),
          Value::Text(encode_level(context.level).to_owned()),
          Value::Integer(context.instance_id),
        ],
      )
      .await
  }

  pub async fn insert_role(&self, role: &Role) -> Result<()> {
    self
      .execute(
        "INSERT INTO roles (role_id, shortname, name) VALUES (?1, ?2, ?3)",
        vec![
          Value::Integer(role.id.get()),
          Value::Text(role.shortname.clone()),
          Value::Text(role.name.clone()),
        ],
      )
      .await
  }

  pub async fn grant_capability(&self, role: RoleId, capability: &str) -> Result<()> {
    self
      .execute(
        "INSERT OR IGNORE INTO role_capabilities (role_id, capability) VALUES (?1, ?2)",
        vec![Value::Integer(role.get()), Value::Text(capability.to_owned())],
      )
      .await
  }

  pub async fn assign_role(
    &self,
    person: PersonId,
    role: RoleId,
    context: ContextId,
  ) -> Result<()> {
    self
      .execute(
        "INSERT OR IGNORE INTO role_assignments (person_id, role_id, context_id)
         VALUES (?1, ?2, ?3)",
        vec![
          Value::Integer(person.get()),
          Value::Integer(role.get()),
          Value::Integer(context.get()),
        ],
      )
      .await
  }

  pub async fn insert_course(&self, course: &Course) -> Result<()> {
    self
      .execute(
        "INSERT INTO courses (
           course_id, full_name, short_name, group_mode,
           default_grouping_id, category_id, is_site
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        vec![
          Value::Integer(course.id.get()),
          Value::Text(course.full_name.clone()),
          Value::Text(course.short_name.clone()),
          Value::Integer(course.group_mode.code()),
          course.default_grouping_id.map_or(Value::Null, Value::Integer),
          course.category_id.map_or(Value::Null, |c| Value::Integer(c.get())),
          Value::Integer(i64::from(course.is_site)),
        ],
      )
      .await
  }

  pub async fn enrol(&self, course: CourseId, person: PersonId) -> Result<()> {
    self
      .execute(
        "INSERT OR IGNORE INTO enrolments (course_id, person_id) VALUES (?1, ?2)",
        vec![Value::Integer(course.get()), Value::Integer(person.get())],
      )
      .await
  }

  pub async fn insert_group(&self, group: &CourseGroup) -> Result<()> {
    self
      .execute(
        "INSERT INTO course_groups (group_id, course_id, name) VALUES (?1, ?2, ?3)",
        vec![
          Value::Integer(group.id.get()),
          Value::Integer(group.course_id.get()),
          Value::Text(group.name.clone()),
        ],
      )
      .await
  }

  pub async fn add_group_member(&self, group: GroupId, person: PersonId) -> Result<()> {
    self
      .execute(
        "INSERT OR IGNORE INTO group_members (group_id, person_id) VALUES (?1, ?2)",
        vec![Value::Integer(group.get()), Value::Integer(person.get())],
      )
      .await
  }

  pub async fn add_cohort_member(&self, cohort: CohortId, person: PersonId) -> Result<()> {
    self
      .execute(
        "INSERT OR IGNORE INTO cohort_members (cohort_id, person_id) VALUES (?1, ?2)",
        vec![Value::Integer(cohort.get()), Value::Integer(person.get())],
      )
      .await
  }
}

// ─── DirectoryStore impl ─────────────────────────────────────────────────────

impl DirectoryStore for SqliteStore {
  type Cursor = SqliteCursor;
  type Error = Error;

  // ── Catalog ───────────────────────────────────────────────────────────────

  async fn role_catalog(&self) -> Result<RoleCatalog> {
    let roles: Vec<Role> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT role_id, shortname, name FROM roles")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(Role {
              id:        RoleId(row.get(0)?),
              shortname: row.get(1)?,
              name:      row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(RoleCatalog::new(roles))
  }

  async fn get_course(&self, id: CourseId) -> Result<Option<Course>> {
    let raw: Option<RawCourse> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {COURSE_COLUMNS} FROM courses c WHERE c.course_id = ?1"),
            rusqlite::params![id.get()],
            RawCourse::from_row,
          )
          .optional()?)
      })
      .await?;

    Ok(raw.map(RawCourse::into_course))
  }

  async fn course_context(&self, id: CourseId) -> Result<Option<Context>> {
    self.context_at(ContextLevel::Course, id.get()).await
  }

  async fn category_context(&self, id: CategoryId) -> Result<Option<Context>> {
    self.context_at(ContextLevel::Category, id.get()).await
  }

  async fn ancestor_contexts(&self, context: ContextId) -> Result<Vec<ContextId>> {
    let ids = self
      .ids(
        "WITH RECURSIVE chain(context_id, parent_id, depth) AS (
           SELECT context_id, parent_id, 0 FROM contexts WHERE context_id = ?
           UNION ALL
           SELECT c.context_id, c.parent_id, chain.depth + 1
           FROM contexts c JOIN chain ON c.context_id = chain.parent_id
         )
         SELECT context_id FROM chain ORDER BY depth"
          .to_owned(),
        vec![Value::Integer(context.get())],
      )
      .await?;
    Ok(ids.into_iter().map(ContextId).collect())
  }

  // ── People ────────────────────────────────────────────────────────────────

  async fn get_person(&self, id: PersonId) -> Result<Option<Person>> {
    let raw: Option<RawPerson> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PERSON_COLUMNS} FROM people p WHERE p.person_id = ?1"),
            rusqlite::params![id.get()],
            RawPerson::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPerson::into_person).transpose()
  }

  async fn roles_of_person(&self, id: PersonId) -> Result<Vec<Role>> {
    let roles = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT r.role_id, r.shortname, r.name
           FROM role_assignments ra
           JOIN roles r ON r.role_id = ra.role_id
           WHERE ra.person_id = ?1
           ORDER BY r.role_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id.get()], |row| {
            Ok(Role {
              id:        RoleId(row.get(0)?),
              shortname: row.get(1)?,
              name:      row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(roles)
  }

  async fn role_assignments(
    &self,
    role_ids: &[RoleId],
    context_ids: &[ContextId],
  ) -> Result<Vec<PersonId>> {
    if role_ids.is_empty() || context_ids.is_empty() {
      return Ok(Vec::new());
    }

    let sql = format!(
      "SELECT DISTINCT person_id FROM role_assignments
       WHERE role_id IN ({}) AND context_id IN ({})
       ORDER BY person_id",
      placeholders(role_ids.len()),
      placeholders(context_ids.len()),
    );
    let params = role_ids
      .iter()
      .map(|id| id.get())
      .chain(context_ids.iter().map(|id| id.get()))
      .map(Value::Integer)
      .collect();

    let ids = self.ids(sql, params).await?;
    Ok(ids.into_iter().map(PersonId).collect())
  }

  async fn enrolled_persons(
    &self,
    course: CourseId,
    group: Option<GroupId>,
  ) -> Result<Vec<PersonId>> {
    let (sql, params) = match group {
      None => (
        "SELECT person_id FROM enrolments WHERE course_id = ? ORDER BY person_id",
        vec![Value::Integer(course.get())],
      ),
      Some(group) => (
        "SELECT e.person_id FROM enrolments e
         JOIN group_members gm ON gm.person_id = e.person_id AND gm.group_id = ?
         WHERE e.course_id = ?
         ORDER BY e.person_id",
        vec![Value::Integer(group.get()), Value::Integer(course.get())],
      ),
    };

    let ids = self.ids(sql.to_owned(), params).await?;
    Ok(ids.into_iter().map(PersonId).collect())
  }

  async fn courses_of_person(
    &self,
    person: PersonId,
    within: Option<ContextId>,
  ) -> Result<Vec<Course>> {
    let within = within.map(|c| c.get());

    let raws: Vec<RawCourse> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "WITH RECURSIVE subtree(context_id) AS (
             SELECT ?2
             UNION ALL
             SELECT c.context_id FROM contexts c
             JOIN subtree s ON c.parent_id = s.context_id
           )
           SELECT DISTINCT {COURSE_COLUMNS}
           FROM courses c
           JOIN contexts ctx ON ctx.level = 'course' AND ctx.instance_id = c.course_id
           JOIN role_assignments ra ON ra.context_id = ctx.context_id
           WHERE ra.person_id = ?1
             AND (?2 IS NULL OR ctx.context_id IN (SELECT context_id FROM subtree))
           ORDER BY c.full_name, c.course_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![person.get(), within], RawCourse::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawCourse::into_course).collect())
  }

  async fn departments(&self) -> Result<Vec<String>> {
    let departments = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT department FROM people WHERE department <> ''",
        )?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(departments)
  }

  // ── Groups ────────────────────────────────────────────────────────────────

  async fn course_groups(&self, course: CourseId) -> Result<Vec<CourseGroup>> {
    self
      .groups(
        "SELECT group_id, course_id, name FROM course_groups
         WHERE course_id = ?1
         ORDER BY name, group_id",
        vec![Value::Integer(course.get())],
      )
      .await
  }

  async fn groups_of_person(
    &self,
    course: CourseId,
    person: PersonId,
  ) -> Result<Vec<CourseGroup>> {
    self
      .groups(
        "SELECT g.group_id, g.course_id, g.name FROM course_groups g
         JOIN group_members gm ON gm.group_id = g.group_id
         WHERE g.course_id = ?1 AND gm.person_id = ?2
         ORDER BY g.name, g.group_id",
        vec![Value::Integer(course.get()), Value::Integer(person.get())],
      )
      .await
  }

  // ── Cohorts ───────────────────────────────────────────────────────────────

  async fn is_cohort_member(&self, cohort: CohortId, person: PersonId) -> Result<bool> {
    let member = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT EXISTS (
             SELECT 1 FROM cohort_members WHERE cohort_id = ?1 AND person_id = ?2
           )",
          rusqlite::params![cohort.get(), person.get()],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(member)
  }

  // ── Authorization ─────────────────────────────────────────────────────────

  async fn has_capability(
    &self,
    person: PersonId,
    capability: &'static str,
    context: ContextId,
  ) -> Result<bool> {
    let granted = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "WITH RECURSIVE chain(context_id, parent_id) AS (
             SELECT context_id, parent_id FROM contexts WHERE context_id = ?3
             UNION ALL
             SELECT c.context_id, c.parent_id
             FROM contexts c JOIN chain ON c.context_id = chain.parent_id
           )
           SELECT EXISTS (
             SELECT 1 FROM role_assignments ra
             JOIN role_capabilities rc ON rc.role_id = ra.role_id
             WHERE ra.person_id = ?1
               AND rc.capability = ?2
               AND ra.context_id IN (SELECT context_id FROM chain)
           )",
          rusqlite::params![person.get(), capability, context.get()],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(granted)
  }

  // ── Directory execution ───────────────────────────────────────────────────

  async fn count_people(&self, query: &DirectoryQuery, stage: CountStage) -> Result<u64> {
    if query.admits_nobody() {
      return Ok(0);
    }

    let filter = people_filter(query, stage);
    let sql = format!("SELECT COUNT(*) {}", filter.clause);
    let params = filter.params;

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| {
          row.get(0)
        })?)
      })
      .await?;

    debug!(?stage, count, "counted people");
    Ok(count.max(0) as u64)
  }

  async fn fetch_people(&self, query: &DirectoryQuery) -> Result<SqliteCursor> {
    let window = query.window;
    if query.admits_nobody() {
      return Ok(SqliteCursor::new(
        self.conn.clone(),
        String::new(),
        Vec::new(),
        window.offset,
        0,
        self.batch_size,
      ));
    }

    let filter = people_filter(query, CountStage::Matched);
    let sql = format!(
      "SELECT {PERSON_COLUMNS} {} {}",
      filter.clause,
      order_by(query.sort)
    );

    Ok(SqliteCursor::new(
      self.conn.clone(),
      sql,
      filter.params,
      window.offset,
      window.limit,
      self.batch_size,
    ))
  }
}
