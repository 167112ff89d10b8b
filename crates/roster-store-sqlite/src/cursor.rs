//! [`SqliteCursor`]: a batched, lazily filled [`PersonCursor`].

use std::{collections::VecDeque, sync::Arc};

use roster_core::{person::Person, store::PersonCursor};
use rusqlite::types::Value;
use tracing::warn;

use crate::{Error, Result, encode::RawPerson};

/// Rows fetched per round trip unless the store says otherwise.
pub const DEFAULT_BATCH_SIZE: u64 = 200;

/// Walks one window of a sorted people query, fetching `batch_size` rows at
/// a time with `LIMIT … OFFSET …`.
pub struct SqliteCursor {
  conn:       tokio_rusqlite::Connection,
  /// A complete `SELECT … ORDER BY …` without `LIMIT`.
  sql:        Arc<str>,
  params:     Arc<Vec<Value>>,
  position:   u64,
  end:        u64,
  batch_size: u64,
  buffer:     VecDeque<Person>,
  exhausted:  bool,
  closed:     bool,
}

impl SqliteCursor {
  pub(crate) fn new(
    conn: tokio_rusqlite::Connection,
    sql: String,
    params: Vec<Value>,
    offset: u64,
    limit: u64,
    batch_size: u64,
  ) -> Self {
    Self {
      conn,
      sql: sql.into(),
      params: Arc::new(params),
      position: offset,
      end: offset.saturating_add(limit),
      batch_size: batch_size.max(1),
      buffer: VecDeque::new(),
      exhausted: limit == 0,
      closed: false,
    }
  }

  async fn fill(&mut self) -> Result<()> {
    let take = (self.end - self.position).min(self.batch_size);
    if take == 0 {
      self.exhausted = true;
      return Ok(());
    }

    let sql = format!("{} LIMIT ? OFFSET ?", self.sql);
    let mut params = self.params.as_ref().clone();
    params.push(Value::Integer(to_sql_int(take)));
    params.push(Value::Integer(to_sql_int(self.position)));

    let raws: Vec<RawPerson> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawPerson::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let fetched = raws.len() as u64;
    self.position += fetched;
    if fetched < take {
      self.exhausted = true;
    }

    for raw in raws {
      self.buffer.push_back(raw.into_person()?);
    }
    Ok(())
  }
}

impl PersonCursor for SqliteCursor {
  type Error = Error;

  async fn next(&mut self) -> Result<Option<Person>> {
    if self.closed {
      return Ok(None);
    }
    if self.buffer.is_empty() && !self.exhausted {
      self.fill().await?;
    }
    Ok(self.buffer.pop_front())
  }

  fn close(&mut self) {
    self.closed = true;
    self.buffer.clear();
  }
}

impl Drop for SqliteCursor {
  fn drop(&mut self) {
    if !self.closed {
      warn!(position = self.position, "person cursor dropped without close");
    }
  }
}

/// SQLite integers are signed; windows beyond `i64::MAX` are clamped.
fn to_sql_int(n: u64) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }
