//! [`SqliteHistoryStore`] — the SQLite implementation of [`HistoryStore`].

use std::{path::Path, sync::Arc};

use tracing::debug;
use trek_core::{record::MigrationRecord, store::HistoryStore};

use crate::{
  Error, Result,
  encode::{RECORD_COLUMNS, RawRecord, encode_dt, encode_result, encode_status},
  schema::{DEFAULT_TABLE, history_schema, quote_identifier, validate_table_name},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Migration history kept in one table of a SQLite database.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteHistoryStore {
  conn:  tokio_rusqlite::Connection,
  table: Arc<str>,
}

impl SqliteHistoryStore {
  /// Open (or create) the database at `path` and make sure `table` exists.
  pub async fn open(path: impl AsRef<Path>, table: &str) -> Result<Self> {
    validate_table_name(table)?;
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, table).await
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory(table: &str) -> Result<Self> {
    validate_table_name(table)?;
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, table).await
  }

  /// Open `path` using the default history table.
  pub async fn open_default(path: impl AsRef<Path>) -> Result<Self> {
    Self::open(path, DEFAULT_TABLE).await
  }

  pub fn table(&self) -> &str { &self.table }

  /// The underlying connection, for running commands against the same
  /// database (see [`crate::SqliteCommandRunner::from_connection`]).
  pub fn connection(&self) -> tokio_rusqlite::Connection { self.conn.clone() }

  async fn init(conn: tokio_rusqlite::Connection, table: &str) -> Result<Self> {
    let store = Self { conn, table: Arc::from(table) };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let schema = history_schema(&self.table);
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&schema)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── HistoryStore impl ───────────────────────────────────────────────────────

impl HistoryStore for SqliteHistoryStore {
  type Error = Error;

  async fn find_all(&self) -> Result<Vec<MigrationRecord>> {
    let sql = format!(
      "SELECT {RECORD_COLUMNS} FROM {} ORDER BY rowid",
      quote_identifier(&self.table)
    );

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn save(&self, record: &MigrationRecord) -> Result<()> {
    let sql = format!(
      "INSERT INTO {} ({RECORD_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
       ON CONFLICT(version) DO UPDATE SET
         description     = excluded.description,
         author          = excluded.author,
         started         = excluded.started,
         finished        = excluded.finished,
         status          = excluded.status,
         failure_message = excluded.failure_message,
         result          = excluded.result",
      quote_identifier(&self.table)
    );

    let version         = record.version.to_string();
    let description     = record.description.clone();
    let author          = record.author.clone();
    let started         = record.started.map(encode_dt);
    let finished        = record.finished.map(encode_dt);
    let status          = encode_status(record.status);
    let failure_message = record.failure_message.clone();
    let result          = record.result.as_ref().map(encode_result).transpose()?;

    debug!(version = %version, status = %status, table = %self.table, "upserting history record");

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &sql,
          rusqlite::params![
            version,
            description,
            author,
            started,
            finished,
            status,
            failure_message,
            result,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
