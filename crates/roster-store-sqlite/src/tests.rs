//! End-to-end tests for `SqliteStore` and the directory entry point against an
//! in-memory database.

use std::{collections::BTreeSet, sync::Arc};

use chrono::{TimeZone as _, Utc};
use roster_core::{
  Directory, Error as CoreError,
  capability::{ACCESS_ALL_GROUPS, VIEW_HIDDEN_USER_FIELDS, VIEW_PARTICIPANTS},
  course::{Context, ContextLevel, Course, CourseGroup, GroupMode},
  directory::{DirectoryEntry, EmptyState, GroupScope},
  filter::{Params, SortColumn},
  id::{CategoryId, CohortId, ContextId, CourseId, GroupId, PersonId, RoleId},
  person::{MailDisplay, Person},
  role::{EDITING_TEACHER, PARENT, Role, RoleCategory, STUDENT, TEACHER},
  settings::DirectorySettings,
  store::{DirectoryStore, PersonCursor},
};

use crate::SqliteStore;

// ─── Fixture ─────────────────────────────────────────────────────────────────
//
// Context tree:   1 system
//                 ├── 2 category 1
//                 │   ├── 3 course 10 "Homeroom Directory"
//                 │   └── 4 course 11 "Art" (separate groups)
//                 └── 5 course 1 (site front page)

const SYSTEM: ContextId = ContextId(1);
const CATEGORY: ContextId = ContextId(2);
const DIRECTORY_CTX: ContextId = ContextId(3);
const ART_CTX: ContextId = ContextId(4);

const DIRECTORY_COURSE: CourseId = CourseId(10);
const ART_COURSE: CourseId = CourseId(11);
const SITE_COURSE: CourseId = CourseId(1);

const MANAGER_ROLE: RoleId = RoleId(1);
const EDITING_TEACHER_ROLE: RoleId = RoleId(3);
const TEACHER_ROLE: RoleId = RoleId(4);
const STUDENT_ROLE: RoleId = RoleId(5);
const PARENT_ROLE: RoleId = RoleId(9);

const TEACHER_COHORT: CohortId = CohortId(100);
const STUDENT_COHORT: CohortId = CohortId(101);
const PARENT_COHORT: CohortId = CohortId(102);

const T1: PersonId = PersonId(1);
const S1: PersonId = PersonId(2);
const S2: PersonId = PersonId(3);
const P1: PersonId = PersonId(4);

const RED: GroupId = GroupId(20);
const BLUE: GroupId = GroupId(21);

fn person(id: PersonId, first: &str, last: &str, department: &str) -> Person {
  Person {
    id,
    username: format!("{}.{}", first, last).to_lowercase(),
    first_name: first.into(),
    last_name: last.into(),
    middle_name: None,
    alternate_name: None,
    email: format!("{}@school.example", first.to_lowercase()),
    department: department.into(),
    city: "Utrecht".into(),
    country: "NL".into(),
    lang: "en".into(),
    timezone: "Europe/Amsterdam".into(),
    mail_display: MailDisplay::Hidden,
    last_access: Some(Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap()
      + chrono::Duration::minutes(id.get())),
    extra: Default::default(),
  }
}

fn course(id: CourseId, full_name: &str, group_mode: GroupMode, is_site: bool) -> Course {
  Course {
    id,
    full_name: full_name.into(),
    short_name: full_name.to_lowercase(),
    group_mode,
    default_grouping_id: None,
    category_id: (!is_site).then_some(CategoryId(1)),
    is_site,
  }
}

fn context(id: ContextId, parent: Option<ContextId>, level: ContextLevel, instance: i64) -> Context {
  Context { id, parent_id: parent, level, instance_id: instance }
}

fn settings() -> DirectorySettings {
  DirectorySettings {
    teacher_cohort: TEACHER_COHORT,
    student_cohort: STUDENT_COHORT,
    parent_cohort: PARENT_COHORT,
    ..DirectorySettings::new(DIRECTORY_COURSE)
  }
}

/// Enrol `who` in the directory course with `role`, and put them in `cohort`.
async fn member(
  s: &SqliteStore,
  who: &Person,
  role: RoleId,
  cohort: Option<CohortId>,
) {
  s.insert_person(who).await.unwrap();
  s.assign_role(who.id, role, DIRECTORY_CTX).await.unwrap();
  s.enrol(DIRECTORY_COURSE, who.id).await.unwrap();
  if let Some(cohort) = cohort {
    s.add_cohort_member(cohort, who.id).await.unwrap();
  }
}

/// T1 (teacher), S1 John Smith, S2 Jane Doe (students), P1 (parent).
async fn school() -> SqliteStore {
  let s = SqliteStore::open_in_memory().await.expect("in-memory store");

  for ctx in [
    context(SYSTEM, None, ContextLevel::System, 0),
    context(CATEGORY, Some(SYSTEM), ContextLevel::Category, 1),
    context(DIRECTORY_CTX, Some(CATEGORY), ContextLevel::Course, DIRECTORY_COURSE.get()),
    context(ART_CTX, Some(CATEGORY), ContextLevel::Course, ART_COURSE.get()),
    context(ContextId(5), Some(SYSTEM), ContextLevel::Course, SITE_COURSE.get()),
  ] {
    s.insert_context(&ctx).await.unwrap();
  }

  for (id, shortname, name) in [
    (MANAGER_ROLE, "manager", "Manager"),
    (EDITING_TEACHER_ROLE, EDITING_TEACHER, "Teacher"),
    (TEACHER_ROLE, TEACHER, "Non-editing teacher"),
    (STUDENT_ROLE, STUDENT, "Student"),
    (PARENT_ROLE, PARENT, "Parent"),
  ] {
    s.insert_role(&Role { id, shortname: shortname.into(), name: name.into() })
      .await
      .unwrap();
  }

  for role in [MANAGER_ROLE, EDITING_TEACHER_ROLE, TEACHER_ROLE, STUDENT_ROLE, PARENT_ROLE] {
    s.grant_capability(role, VIEW_PARTICIPANTS).await.unwrap();
  }
  for role in [MANAGER_ROLE, EDITING_TEACHER_ROLE] {
    s.grant_capability(role, VIEW_HIDDEN_USER_FIELDS).await.unwrap();
    s.grant_capability(role, ACCESS_ALL_GROUPS).await.unwrap();
  }

  s.insert_course(&course(SITE_COURSE, "School", GroupMode::None, true)).await.unwrap();
  s.insert_course(&course(DIRECTORY_COURSE, "Homeroom Directory", GroupMode::None, false))
    .await
    .unwrap();
  s.insert_course(&course(ART_COURSE, "Art", GroupMode::Separate, false)).await.unwrap();

  let mut teacher = person(T1, "Tess", "Teacher", "Staff");
  teacher.mail_display = MailDisplay::CourseMembers;
  member(&s, &teacher, EDITING_TEACHER_ROLE, Some(TEACHER_COHORT)).await;

  member(&s, &person(S1, "John", "Smith", "6A"), STUDENT_ROLE, Some(STUDENT_COHORT)).await;

  let mut jane = person(S2, "Jane", "Doe", "7E");
  jane.mail_display = MailDisplay::Everyone;
  member(&s, &jane, STUDENT_ROLE, Some(STUDENT_COHORT)).await;

  member(&s, &person(P1, "Paula", "Parent", ""), PARENT_ROLE, Some(PARENT_COHORT)).await;

  s
}

fn directory(store: SqliteStore) -> Directory<SqliteStore> {
  Directory::new(Arc::new(store), settings())
}

fn params(pairs: &[(&str, &str)]) -> Params {
  pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn ids(entries: &[DirectoryEntry]) -> BTreeSet<PersonId> {
  entries.iter().map(|e| e.person.id).collect()
}

/// List and drain one page.
async fn page(
  dir: &Directory<SqliteStore>,
  viewer: PersonId,
  pairs: &[(&str, &str)],
) -> (u64, u64, Option<EmptyState>, Vec<DirectoryEntry>) {
  let result = dir.list(viewer, &params(pairs)).await.unwrap();
  let (total, matched, empty) = (result.total_count, result.matched_count, result.empty_state());
  let rows = result.rows.collect().await.unwrap();
  (total, matched, empty, rows)
}

// ─── Store reads ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_person_round_trips_profile() {
  let s = school().await;
  let mut ada = person(PersonId(50), "Ada", "Lovelace", "9N");
  ada.middle_name = Some("King".into());
  ada.last_access = None;
  ada.extra.insert("pronouns".into(), "she/her".into());
  s.insert_person(&ada).await.unwrap();

  assert_eq!(s.get_person(ada.id).await.unwrap(), Some(ada));
  assert_eq!(s.get_person(PersonId(999)).await.unwrap(), None);
}

#[tokio::test]
async fn ancestor_contexts_walk_to_system() {
  let s = school().await;
  assert_eq!(
    s.ancestor_contexts(DIRECTORY_CTX).await.unwrap(),
    [DIRECTORY_CTX, CATEGORY, SYSTEM]
  );
  assert!(s.ancestor_contexts(ContextId(77)).await.unwrap().is_empty());
}

#[tokio::test]
async fn capabilities_are_inherited_from_ancestor_contexts() {
  let s = school().await;
  let head = person(PersonId(60), "Hank", "Head", "Staff");
  s.insert_person(&head).await.unwrap();
  s.assign_role(head.id, MANAGER_ROLE, SYSTEM).await.unwrap();

  assert!(s.has_capability(head.id, VIEW_HIDDEN_USER_FIELDS, DIRECTORY_CTX).await.unwrap());
  assert!(!s.has_capability(S1, VIEW_HIDDEN_USER_FIELDS, DIRECTORY_CTX).await.unwrap());
  assert!(s.has_capability(S1, VIEW_PARTICIPANTS, DIRECTORY_CTX).await.unwrap());
  assert!(!s.has_capability(S1, VIEW_PARTICIPANTS, ART_CTX).await.unwrap());
}

#[tokio::test]
async fn cohort_membership() {
  let s = school().await;
  assert!(s.is_cohort_member(TEACHER_COHORT, T1).await.unwrap());
  assert!(!s.is_cohort_member(TEACHER_COHORT, S1).await.unwrap());
}

#[tokio::test]
async fn roles_of_person_are_distinct() {
  let s = school().await;
  s.assign_role(T1, EDITING_TEACHER_ROLE, ART_CTX).await.unwrap();
  s.assign_role(T1, TEACHER_ROLE, ART_CTX).await.unwrap();

  let roles: Vec<RoleId> = s.roles_of_person(T1).await.unwrap().into_iter().map(|r| r.id).collect();
  assert_eq!(roles, [EDITING_TEACHER_ROLE, TEACHER_ROLE]);
}

#[tokio::test]
async fn fetched_rows_are_role_assignments_intersected_with_enrolment() {
  let s = school().await;
  // Enrolled elsewhere only: has the role but is not in the course.
  let visitor = person(PersonId(70), "Vic", "Visitor", "8A");
  s.insert_person(&visitor).await.unwrap();
  s.assign_role(visitor.id, STUDENT_ROLE, DIRECTORY_CTX).await.unwrap();

  let roles = [EDITING_TEACHER_ROLE, TEACHER_ROLE, STUDENT_ROLE, PARENT_ROLE];
  let contexts = s.ancestor_contexts(DIRECTORY_CTX).await.unwrap();
  let assigned: BTreeSet<PersonId> =
    s.role_assignments(&roles, &contexts).await.unwrap().into_iter().collect();
  let enrolled: BTreeSet<PersonId> =
    s.enrolled_persons(DIRECTORY_COURSE, None).await.unwrap().into_iter().collect();
  let expected: BTreeSet<PersonId> = assigned.intersection(&enrolled).copied().collect();
  assert!(assigned.contains(&visitor.id));

  let dir = directory(s);
  let (total, _, _, rows) = page(&dir, T1, &[("perpage", "5000")]).await;
  assert_eq!(ids(&rows), expected);
  assert_eq!(total, expected.len() as u64);
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn student_sees_teachers_and_students() {
  let dir = directory(school().await);
  let (total, matched, empty, rows) = page(&dir, S1, &[("role", "all")]).await;

  assert_eq!(ids(&rows), BTreeSet::from([T1, S1, S2]));
  assert_eq!((total, matched), (3, 3));
  assert_eq!(empty, None);
}

#[tokio::test]
async fn parent_sees_only_teachers() {
  let dir = directory(school().await);
  for role in ["teacher", "all"] {
    let (total, _, _, rows) = page(&dir, P1, &[("role", role)]).await;
    assert_eq!(ids(&rows), BTreeSet::from([T1]), "role {role}");
    assert_eq!(total, 1);
  }

  let view = dir.open(P1, &params(&[("role", "all")])).await.unwrap();
  assert_eq!(view.filter.role, RoleCategory::Teacher);
  assert_eq!(view.role_options.len(), 1);
}

#[tokio::test]
async fn name_search_narrows_matched_count_only() {
  let dir = directory(school().await);
  let (total, matched, empty, rows) = page(
    &dir,
    T1,
    &[("role", "student"), ("search", "smith"), ("searchin", "name")],
  )
  .await;

  assert_eq!((total, matched), (2, 1));
  assert_eq!(empty, None);
  assert_eq!(ids(&rows), BTreeSet::from([S1]));
}

#[tokio::test]
async fn search_matches_across_first_and_last_name() {
  let dir = directory(school().await);
  let (_, matched, _, rows) =
    page(&dir, T1, &[("search", "n sm"), ("searchin", "name")]).await;
  assert_eq!(matched, 1);
  assert_eq!(ids(&rows), BTreeSet::from([S1]));
}

#[tokio::test]
async fn search_treats_wildcards_literally() {
  let dir = directory(school().await);
  let (total, matched, empty, _) = page(&dir, T1, &[("search", "%")]).await;
  assert_eq!((total, matched), (4, 0));
  assert_eq!(empty, Some(EmptyState::NoMatches));
}

#[tokio::test]
async fn search_any_field_includes_email_and_department() {
  let dir = directory(school().await);
  let (_, matched, _, rows) = page(&dir, T1, &[("search", "7e")]).await;
  assert_eq!(matched, 1);
  assert_eq!(ids(&rows), BTreeSet::from([S2]));

  let (_, matched, _, rows) = page(&dir, T1, &[("search", "tess@"), ("searchin", "email")]).await;
  assert_eq!(matched, 1);
  assert_eq!(ids(&rows), BTreeSet::from([T1]));
}

#[tokio::test]
async fn initials_filter_by_name_prefix() {
  let dir = directory(school().await);
  let (total, matched, _, rows) = page(&dir, T1, &[("sifirst", "j")]).await;
  assert_eq!((total, matched), (4, 2));
  assert_eq!(ids(&rows), BTreeSet::from([S1, S2]));

  let (_, matched, _, rows) = page(&dir, T1, &[("sifirst", "j"), ("silast", "d")]).await;
  assert_eq!(matched, 1);
  assert_eq!(ids(&rows), BTreeSet::from([S2]));
}

#[tokio::test]
async fn search_and_initials_fold_non_ascii_case() {
  let s = school().await;
  let elodie = person(PersonId(92), "Élodie", "Ünal", "6A");
  member(&s, &elodie, STUDENT_ROLE, Some(STUDENT_COHORT)).await;
  let dir = directory(s);

  for text in ["ünal", "ÜNAL", "élodie ü"] {
    let (_, matched, empty, rows) =
      page(&dir, T1, &[("search", text), ("searchin", "name")]).await;
    assert_eq!((matched, empty), (1, None), "search {text:?}");
    assert_eq!(ids(&rows), BTreeSet::from([elodie.id]));
  }

  for (key, letter) in [("sifirst", "é"), ("sifirst", "É"), ("silast", "ü")] {
    let (_, matched, _, rows) = page(&dir, T1, &[(key, letter)]).await;
    assert_eq!(matched, 1, "{key}={letter}");
    assert_eq!(ids(&rows), BTreeSet::from([elodie.id]));
  }
}

#[tokio::test]
async fn initials_match_lower_case_stored_names() {
  let s = school().await;
  let lower = person(PersonId(93), "élise", "ørsted", "7E");
  member(&s, &lower, STUDENT_ROLE, Some(STUDENT_COHORT)).await;
  let dir = directory(s);

  let (_, matched, _, rows) = page(&dir, T1, &[("sifirst", "É"), ("silast", "Ø")]).await;
  assert_eq!(matched, 1);
  assert_eq!(ids(&rows), BTreeSet::from([lower.id]));
}

#[tokio::test]
async fn pagination_walks_matches_in_order() {
  let dir = directory(school().await);
  let at = |n: &'static str| {
    vec![("role", "student"), ("perpage", "1"), ("ssort", "lastname"), ("page", n)]
  };

  let (total0, matched0, _, page0) = page(&dir, T1, &at("0")).await;
  let (total1, matched1, _, page1) = page(&dir, T1, &at("1")).await;
  let (_, _, _, page2) = page(&dir, T1, &at("2")).await;

  assert_eq!((total0, matched0), (2, 2));
  assert_eq!((total1, matched1), (2, 2));
  assert_eq!(page0.len(), 1);
  assert_eq!(page0[0].person.id, S2); // Doe
  assert_eq!(page1.len(), 1);
  assert_eq!(page1[0].person.id, S1); // Smith
  assert!(page2.is_empty());
}

#[tokio::test]
async fn default_sort_is_most_recent_access_for_teachers() {
  let dir = directory(school().await);
  let (_, _, _, rows) = page(&dir, T1, &[]).await;
  let order: Vec<PersonId> = rows.iter().map(|e| e.person.id).collect();
  // last_access grows with id in the fixture.
  assert_eq!(order, [P1, S2, S1, T1]);
}

#[tokio::test]
async fn unknown_role_falls_back_to_first_allowed() {
  let dir = directory(school().await);
  let view = dir.open(T1, &params(&[("role", "wizard")])).await.unwrap();
  assert_eq!(view.filter.role, RoleCategory::All);

  let view = dir.open(S1, &params(&[("role", "parent")])).await.unwrap();
  assert_eq!(view.filter.role, RoleCategory::All);
  assert!(!view.role_options.contains(RoleCategory::Parent));
}

// ─── Properties ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn matched_never_exceeds_total() {
  let dir = directory(school().await);
  let inputs: [&[(&str, &str)]; 6] = [
    &[],
    &[("search", "a")],
    &[("search", "zzz")],
    &[("role", "student"), ("department", "6A")],
    &[("sifirst", "T"), ("silast", "T")],
    &[("role", "teacher"), ("search", "school.example"), ("searchin", "email")],
  ];
  for viewer in [T1, S1, P1] {
    for input in inputs {
      let result = dir.list(viewer, &params(input)).await.unwrap();
      assert!(
        result.matched_count <= result.total_count,
        "viewer {viewer} input {input:?}"
      );
      result.rows.collect().await.unwrap();
    }
  }
}

#[tokio::test]
async fn department_filter_only_applies_to_students() {
  let dir = directory(school().await);

  let (total, _, _, rows) = page(&dir, T1, &[("role", "student"), ("department", "6A")]).await;
  assert_eq!(total, 1);
  assert_eq!(ids(&rows), BTreeSet::from([S1]));

  let (total, _, _, _) = page(&dir, T1, &[("role", "all"), ("department", "6A")]).await;
  assert_eq!(total, 4);
}

#[tokio::test]
async fn parent_never_sees_people_outside_teacher_cohort() {
  let s = school().await;
  // Holds a teacher role but was never put in the teacher cohort.
  member(&s, &person(PersonId(80), "Una", "Uncohorted", "Staff"), EDITING_TEACHER_ROLE, None)
    .await;
  let dir = directory(s);

  let (total, _, _, rows) = page(&dir, P1, &[("perpage", "5000")]).await;
  assert_eq!(total, 1);
  assert_eq!(ids(&rows), BTreeSet::from([T1]));

  // Staff are unrestricted.
  let (_, _, _, rows) = page(&dir, T1, &[("role", "teacher")]).await;
  assert_eq!(ids(&rows), BTreeSet::from([T1, PersonId(80)]));
}

#[tokio::test]
async fn student_never_sees_people_outside_teacher_and_student_cohorts() {
  let s = school().await;
  member(&s, &person(PersonId(81), "Xavier", "Outsider", "6A"), STUDENT_ROLE, None).await;
  let dir = directory(s);

  let (_, _, _, rows) = page(&dir, S1, &[("perpage", "5000")]).await;
  assert!(!ids(&rows).contains(&PersonId(81)));
  assert_eq!(ids(&rows), BTreeSet::from([T1, S1, S2]));
}

#[tokio::test]
async fn unconfigured_teacher_cohort_leaves_parents_nothing() {
  let dir = Directory::new(
    Arc::new(school().await),
    DirectorySettings { teacher_cohort: CohortId(0), ..settings() },
  );
  let (total, matched, empty, rows) = page(&dir, P1, &[]).await;
  assert_eq!((total, matched), (0, 0));
  assert_eq!(empty, Some(EmptyState::NothingToDisplay));
  assert!(rows.is_empty());
}

#[tokio::test]
async fn parent_rows_hidden_from_students() {
  let s = school().await;
  // A teacher who is also a parent at the school.
  let both = person(PersonId(90), "Pat", "Both", "Staff");
  member(&s, &both, TEACHER_ROLE, Some(TEACHER_COHORT)).await;
  s.add_cohort_member(PARENT_COHORT, both.id).await.unwrap();
  let dir = directory(s);

  // Counts and the page agree with the rows actually shown.
  let (total, matched, _, rows) = page(&dir, S1, &[("role", "teacher")]).await;
  assert_eq!((total, matched), (1, 1));
  assert_eq!(ids(&rows), BTreeSet::from([T1]));

  let (total, _, _, rows) =
    page(&dir, S1, &[("role", "teacher"), ("perpage", "1"), ("ssort", "lastname")]).await;
  assert_eq!(total, 1);
  assert_eq!(ids(&rows), BTreeSet::from([T1]));

  let (_, _, _, rows) = page(&dir, T1, &[("role", "teacher")]).await;
  let pat = rows.iter().find(|e| e.person.id == both.id).unwrap();
  assert!(pat.relationship.is_teacher && pat.relationship.is_parent);
}

#[tokio::test]
async fn ancestor_role_assignments_count() {
  let s = school().await;
  let coach = person(PersonId(91), "Cora", "Coach", "Staff");
  s.insert_person(&coach).await.unwrap();
  s.assign_role(coach.id, TEACHER_ROLE, CATEGORY).await.unwrap();
  s.enrol(DIRECTORY_COURSE, coach.id).await.unwrap();
  let dir = directory(s);

  let (total, _, _, rows) = page(&dir, T1, &[("role", "teacher")]).await;
  assert_eq!(total, 2);
  assert!(ids(&rows).contains(&coach.id));
}

#[tokio::test]
async fn rows_are_annotated_for_the_viewer() {
  let dir = directory(school().await);
  let (_, _, _, rows) = page(&dir, S1, &[]).await;
  let by_id = |id: PersonId| rows.iter().find(|e| e.person.id == id).unwrap();

  // Course members may see the teacher's address; Jane shares hers with all.
  assert!(by_id(T1).email_visible);
  assert!(by_id(S2).email_visible);
  // Own row.
  assert!(by_id(S1).email_visible);
  assert!(by_id(T1).relationship.is_teacher);
  assert_eq!(by_id(S2).roles.iter().map(|r| r.id).collect::<Vec<_>>(), [STUDENT_ROLE]);

  let s3 = person(PersonId(92), "Sam", "Silent", "6A");
  let s = school().await;
  member(&s, &s3, STUDENT_ROLE, Some(STUDENT_COHORT)).await;
  let dir = directory(s);
  let (_, _, _, rows) = page(&dir, S1, &[]).await;
  assert!(!rows.iter().find(|e| e.person.id == s3.id).unwrap().email_visible);
}

#[tokio::test]
async fn hidden_last_access_changes_default_sort_for_students() {
  let dir = Directory::new(
    Arc::new(school().await),
    DirectorySettings { hidden_user_fields: vec!["lastaccess".into()], ..settings() },
  );
  let student = dir.open(S1, &params(&[("ssort", "lastaccess")])).await.unwrap();
  assert_eq!(student.filter.sort.column, SortColumn::LastName);
  assert!(!student.last_access_visible(dir.settings()));

  // The hidden-fields capability lifts the restriction.
  let teacher = dir.open(T1, &params(&[])).await.unwrap();
  assert_eq!(teacher.filter.sort.column, SortColumn::LastAccess);
}

// ─── Failures ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn viewer_without_capability_is_rejected() {
  let s = school().await;
  let stranger = person(PersonId(99), "Sly", "Stranger", "");
  s.insert_person(&stranger).await.unwrap();
  let dir = directory(s);

  let err = dir.list(stranger.id, &params(&[])).await.err().unwrap();
  assert!(matches!(
    err,
    CoreError::Unauthorized { capability: VIEW_PARTICIPANTS, context: DIRECTORY_CTX }
  ));
}

#[tokio::test]
async fn missing_course_is_not_found() {
  let dir = directory(school().await);
  let err = dir.list(T1, &params(&[("courseid", "999")])).await.err().unwrap();
  assert!(matches!(err, CoreError::CourseNotFound(CourseId(999))));
}

#[tokio::test]
async fn unset_directory_course_is_configuration_error() {
  let dir = Directory::new(Arc::new(school().await), DirectorySettings::new(CourseId(0)));
  let err = dir.list(T1, &params(&[])).await.err().unwrap();
  assert!(matches!(err, CoreError::Configuration(_)));
}

#[tokio::test]
async fn missing_parent_role_is_configuration_error_for_staff() {
  let s = SqliteStore::open_in_memory().await.unwrap();
  s.insert_context(&context(SYSTEM, None, ContextLevel::System, 0)).await.unwrap();
  s.insert_context(&context(DIRECTORY_CTX, Some(SYSTEM), ContextLevel::Course, 10))
    .await
    .unwrap();
  for (id, shortname) in [(EDITING_TEACHER_ROLE, EDITING_TEACHER), (TEACHER_ROLE, TEACHER), (STUDENT_ROLE, STUDENT)] {
    s.insert_role(&Role { id, shortname: shortname.into(), name: shortname.into() })
      .await
      .unwrap();
  }
  s.grant_capability(EDITING_TEACHER_ROLE, VIEW_PARTICIPANTS).await.unwrap();
  s.insert_course(&course(DIRECTORY_COURSE, "Directory", GroupMode::None, false))
    .await
    .unwrap();
  member(&s, &person(T1, "Tess", "Teacher", ""), EDITING_TEACHER_ROLE, Some(TEACHER_COHORT))
    .await;

  let err = directory(s).list(T1, &params(&[])).await.err().unwrap();
  assert!(matches!(err, CoreError::Configuration(msg) if msg.contains("parent")));
}

// ─── Empty states ────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_course_is_nothing_to_display() {
  let s = school().await;
  let head = person(PersonId(61), "Hank", "Head", "Staff");
  s.insert_person(&head).await.unwrap();
  s.assign_role(head.id, MANAGER_ROLE, SYSTEM).await.unwrap();
  let dir = directory(s);

  let art = ART_COURSE.to_string();
  let (total, matched, empty, rows) = page(&dir, head.id, &[("courseid", art.as_str())]).await;
  assert_eq!((total, matched), (0, 0));
  assert_eq!(empty, Some(EmptyState::NothingToDisplay));
  assert!(rows.is_empty());
}

// ─── Groups ──────────────────────────────────────────────────────────────────

async fn art_class(s: &SqliteStore) {
  for (id, name) in [(RED, "Red"), (BLUE, "Blue")] {
    s.insert_group(&CourseGroup { id, course_id: ART_COURSE, name: name.into() })
      .await
      .unwrap();
  }
  for (who, role, group) in [
    (T1, EDITING_TEACHER_ROLE, None),
    (S1, STUDENT_ROLE, Some(RED)),
    (S2, STUDENT_ROLE, Some(BLUE)),
    (P1, PARENT_ROLE, None),
  ] {
    s.assign_role(who, role, ART_CTX).await.unwrap();
    s.enrol(ART_COURSE, who).await.unwrap();
    if let Some(group) = group {
      s.add_group_member(group, who).await.unwrap();
    }
  }
}

#[tokio::test]
async fn separate_groups_confine_students_to_their_group() {
  let s = school().await;
  art_class(&s).await;
  let dir = directory(s);
  let art = ART_COURSE.to_string();
  let blue = BLUE.to_string();

  let result = dir
    .list(S1, &params(&[("courseid", art.as_str()), ("group", blue.as_str())]))
    .await
    .unwrap();
  assert_eq!(result.view.group_scope, GroupScope::Group(RED));
  assert_eq!(result.view.filter.group, Some(RED));
  assert_eq!(ids(&result.rows.collect().await.unwrap()), BTreeSet::from([S1]));
}

#[tokio::test]
async fn all_groups_capability_sees_whole_course_or_chosen_group() {
  let s = school().await;
  art_class(&s).await;
  let dir = directory(s);
  let art = ART_COURSE.to_string();
  let blue = BLUE.to_string();

  let (total, _, _, _) = page(&dir, T1, &[("courseid", art.as_str())]).await;
  assert_eq!(total, 4);

  let (_, _, _, rows) =
    page(&dir, T1, &[("courseid", art.as_str()), ("group", blue.as_str())]).await;
  assert_eq!(ids(&rows), BTreeSet::from([S2]));
}

#[tokio::test]
async fn viewer_outside_every_group_gets_not_in_group() {
  let s = school().await;
  art_class(&s).await;
  let dir = directory(s);

  let art = ART_COURSE.to_string();
  let (total, _, empty, rows) = page(&dir, P1, &[("courseid", art.as_str())]).await;
  assert_eq!(total, 0);
  assert_eq!(empty, Some(EmptyState::NotInGroup));
  assert!(rows.is_empty());
}

// ─── Selector options ────────────────────────────────────────────────────────

#[tokio::test]
async fn department_options_in_homeroom_order() {
  let s = school().await;
  member(&s, &person(PersonId(93), "Lee", "Later", "6L"), STUDENT_ROLE, None).await;
  let dir = directory(s);
  assert_eq!(dir.department_options().await.unwrap(), ["6L", "6A", "7E"]);
}

#[tokio::test]
async fn course_options_lead_with_directory_course() {
  let s = school().await;
  art_class(&s).await;
  s.assign_role(S1, STUDENT_ROLE, ContextId(5)).await.unwrap();
  let dir = directory(s);

  let courses: Vec<CourseId> =
    dir.course_options(S1).await.unwrap().into_iter().map(|c| c.id).collect();
  assert_eq!(courses, [DIRECTORY_COURSE, ART_COURSE]);

  // A category without a context leaves only the directory course.
  let restricted = Directory::new(
    Arc::clone(dir.store()),
    DirectorySettings { course_category: Some(CategoryId(42)), ..settings() },
  );
  let courses: Vec<CourseId> =
    restricted.course_options(S1).await.unwrap().into_iter().map(|c| c.id).collect();
  assert_eq!(courses, [DIRECTORY_COURSE]);
}

#[tokio::test]
async fn course_options_limited_to_category_subtree() {
  let s = school().await;
  art_class(&s).await;
  let dir = Directory::new(
    Arc::new(s),
    DirectorySettings { course_category: Some(CategoryId(1)), ..settings() },
  );
  let courses: Vec<CourseId> =
    dir.course_options(S1).await.unwrap().into_iter().map(|c| c.id).collect();
  assert_eq!(courses, [DIRECTORY_COURSE, ART_COURSE]);
}

// ─── Cursor ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn small_batches_yield_every_row_once() {
  let s = school().await.with_batch_size(1);
  let dir = directory(s);
  let (total, _, _, rows) = page(&dir, T1, &[("perpage", "5000")]).await;
  assert_eq!(rows.len() as u64, total);
  assert_eq!(ids(&rows).len(), rows.len());
}

#[tokio::test]
async fn closed_rows_yield_nothing() {
  let dir = directory(school().await);
  let mut result = dir.list(T1, &params(&[])).await.unwrap();
  assert!(result.rows.next().await.unwrap().is_some());
  result.rows.close();
  result.rows.close();
  assert!(result.rows.next().await.unwrap().is_none());
}

#[tokio::test]
async fn raw_cursor_close_is_idempotent() {
  let s = school().await.with_batch_size(2);
  let view = directory(s.clone()).open(T1, &params(&[])).await.unwrap();
  let contexts = s.ancestor_contexts(view.context.id).await.unwrap();
  let query = roster_core::query::DirectoryQueryBuilder::new(DIRECTORY_COURSE, contexts)
    .build(&view.filter);

  let mut cursor = s.fetch_people(&query).await.unwrap();
  let mut seen = 0;
  while cursor.next().await.unwrap().is_some() {
    seen += 1;
  }
  assert_eq!(seen, 4);
  cursor.close();
  cursor.close();
  assert!(cursor.next().await.unwrap().is_none());
}
