//! SQL schema for the Roster SQLite store.
//!
//! Integer ids are the host platform's own, so rows can be copied across
//! without remapping.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS people (
    person_id      INTEGER PRIMARY KEY,
    username       TEXT NOT NULL UNIQUE,
    first_name     TEXT NOT NULL DEFAULT '',
    last_name      TEXT NOT NULL DEFAULT '',
    middle_name    TEXT,
    alternate_name TEXT,
    email          TEXT NOT NULL DEFAULT '',
    department     TEXT NOT NULL DEFAULT '',   -- homeroom code, e.g. '6A'
    city           TEXT NOT NULL DEFAULT '',
    country        TEXT NOT NULL DEFAULT '',
    lang           TEXT NOT NULL DEFAULT '',
    timezone       TEXT NOT NULL DEFAULT '',
    mail_display   INTEGER NOT NULL DEFAULT 0, -- 0 hidden | 1 everyone | 2 course members
    last_access    TEXT,                       -- RFC 3339 UTC, whole seconds; NULL = never
    extra_json     TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS contexts (
    context_id  INTEGER PRIMARY KEY,
    parent_id   INTEGER REFERENCES contexts(context_id),
    level       TEXT NOT NULL,   -- 'system' | 'category' | 'course' | 'user'
    instance_id INTEGER NOT NULL,
    UNIQUE (level, instance_id)
);

CREATE TABLE IF NOT EXISTS roles (
    role_id   INTEGER PRIMARY KEY,
    shortname TEXT NOT NULL UNIQUE,
    name      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS role_assignments (
    person_id  INTEGER NOT NULL REFERENCES people(person_id),
    role_id    INTEGER NOT NULL REFERENCES roles(role_id),
    context_id INTEGER NOT NULL REFERENCES contexts(context_id),
    PRIMARY KEY (person_id, role_id, context_id)
);

CREATE TABLE IF NOT EXISTS role_capabilities (
    role_id    INTEGER NOT NULL REFERENCES roles(role_id),
    capability TEXT NOT NULL,
    PRIMARY KEY (role_id, capability)
);

CREATE TABLE IF NOT EXISTS courses (
    course_id           INTEGER PRIMARY KEY,
    full_name           TEXT NOT NULL,
    short_name          TEXT NOT NULL,
    group_mode          INTEGER NOT NULL DEFAULT 0, -- 0 none | 1 separate | 2 visible
    default_grouping_id INTEGER,
    category_id         INTEGER,
    is_site             INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS enrolments (
    course_id INTEGER NOT NULL REFERENCES courses(course_id),
    person_id INTEGER NOT NULL REFERENCES people(person_id),
    PRIMARY KEY (course_id, person_id)
);

CREATE TABLE IF NOT EXISTS course_groups (
    group_id  INTEGER PRIMARY KEY,
    course_id INTEGER NOT NULL REFERENCES courses(course_id),
    name      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS group_members (
    group_id  INTEGER NOT NULL REFERENCES course_groups(group_id),
    person_id INTEGER NOT NULL REFERENCES people(person_id),
    PRIMARY KEY (group_id, person_id)
);

-- Cohorts are site-wide; only membership matters to the directory.
CREATE TABLE IF NOT EXISTS cohort_members (
    cohort_id INTEGER NOT NULL,
    person_id INTEGER NOT NULL REFERENCES people(person_id),
    PRIMARY KEY (cohort_id, person_id)
);

CREATE INDEX IF NOT EXISTS role_assignments_context_idx ON role_assignments(context_id, role_id);
CREATE INDEX IF NOT EXISTS enrolments_person_idx        ON enrolments(person_id);
CREATE INDEX IF NOT EXISTS group_members_person_idx     ON group_members(person_id);
CREATE INDEX IF NOT EXISTS cohort_members_person_idx    ON cohort_members(person_id);
CREATE INDEX IF NOT EXISTS contexts_parent_idx          ON contexts(parent_id);
CREATE INDEX IF NOT EXISTS people_last_name_idx         ON people(last_name);

PRAGMA user_version = 1;
";
