//! SQLite backend for the Roster people directory.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The schema mirrors the host platform's
//! enrolment, role and cohort tables closely enough that a sync job can fill
//! it row for row.

mod cursor;
mod encode;
mod schema;
mod sql;
mod store;

pub mod error;

pub use cursor::SqliteCursor;
pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
