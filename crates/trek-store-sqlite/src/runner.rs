//! [`SqliteCommandRunner`] — runs command documents against a SQLite
//! database.
//!
//! Supported commands, recognised by their first matching key:
//!
//! | command                                     | response                      |
//! |---------------------------------------------|-------------------------------|
//! | `{ execute: sql, params: [..] }`            | `{ ok: 1, changes: n }`       |
//! | `{ script: sql }`                           | `{ ok: 1 }`                   |
//! | `{ insert: table, documents: [{col: v}] }`  | `{ ok: 1, inserted: n }`      |
//!
//! Inserts run in a single transaction.

use std::path::Path;

use rusqlite::{params_from_iter, types::Value as SqlValue};
use tracing::debug;
use trek_core::{
  document::{Document, Value},
  store::CommandRunner,
};

use crate::{
  Error, Result,
  encode::encode_param,
  schema::quote_identifier,
};

#[derive(Debug)]
enum Command {
  Execute { sql: String, params: Vec<SqlValue> },
  Script(String),
  Insert { table: String, rows: Vec<Vec<(String, SqlValue)>> },
}

impl Command {
  fn name(&self) -> &'static str {
    match self {
      Self::Execute { .. } => "execute",
      Self::Script(_) => "script",
      Self::Insert { .. } => "insert",
    }
  }

  fn parse(command: &Document) -> Result<Self> {
    if let Some(sql) = command.get("execute") {
      let sql = string_field("execute", sql)?;
      let params = match command.get("params") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(values)) => values.iter().map(encode_param).collect::<Result<_>>()?,
        Some(_) => return Err(invalid("execute", "params must be an array")),
      };
      return Ok(Self::Execute { sql, params });
    }

    if let Some(sql) = command.get("script") {
      return Ok(Self::Script(string_field("script", sql)?));
    }

    if let Some(table) = command.get("insert") {
      let table = string_field("insert", table)?;
      let documents = command
        .get("documents")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("insert", "documents must be an array"))?;
      if documents.is_empty() {
        return Err(invalid("insert", "documents must not be empty"));
      }

      let rows = documents
        .iter()
        .map(|doc| {
          let doc = doc
            .as_document()
            .ok_or_else(|| invalid("insert", "every document must be a map"))?;
          if doc.is_empty() {
            return Err(invalid("insert", "documents must have at least one field"));
          }
          doc
            .iter()
            .map(|(column, value)| Ok((column.clone(), encode_param(value)?)))
            .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

      return Ok(Self::Insert { table, rows });
    }

    let name = command.keys().next().map(String::as_str).unwrap_or_default();
    Err(Error::UnknownCommand(name.to_owned()))
  }
}

fn invalid(command: &'static str, reason: impl Into<String>) -> Error {
  Error::InvalidCommand { command, reason: reason.into() }
}

fn string_field(command: &'static str, value: &Value) -> Result<String> {
  value
    .as_str()
    .map(str::to_owned)
    .ok_or_else(|| invalid(command, format!("{command} must be a string")))
}

fn insert_sql(table: &str, columns: &[&str]) -> String {
  let names = columns.iter().map(|c| quote_identifier(c)).collect::<Vec<_>>().join(", ");
  let placeholders = (1..=columns.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");
  format!("INSERT INTO {} ({names}) VALUES ({placeholders})", quote_identifier(table))
}

fn ok(extra: Option<(&str, i64)>) -> Document {
  let mut response = Document::from([("ok".to_owned(), Value::Int(1))]);
  if let Some((key, n)) = extra {
    response.insert(key.to_owned(), Value::Int(n));
  }
  response
}

// ─── Runner ──────────────────────────────────────────────────────────────────

/// Runs migration commands against one SQLite database.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteCommandRunner {
  conn: tokio_rusqlite::Connection,
}

impl SqliteCommandRunner {
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Ok(Self { conn })
  }

  /// Open an in-memory database; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Ok(Self { conn })
  }

  /// Share an existing connection, e.g. the one backing a history store.
  pub fn from_connection(conn: tokio_rusqlite::Connection) -> Self { Self { conn } }

  pub fn connection(&self) -> tokio_rusqlite::Connection { self.conn.clone() }

  async fn run(&self, command: Command) -> Result<Document> {
    let response = self
      .conn
      .call(move |conn| {
        let response = match command {
          Command::Execute { sql, params } => {
            let changes = conn.execute(&sql, params_from_iter(params))?;
            ok(Some(("changes", changes as i64)))
          }
          Command::Script(sql) => {
            conn.execute_batch(&sql)?;
            ok(None)
          }
          Command::Insert { table, rows } => {
            let tx = conn.transaction()?;
            let inserted = rows.len();
            for row in rows {
              let (columns, values): (Vec<String>, Vec<SqlValue>) = row.into_iter().unzip();
              let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
              tx.execute(&insert_sql(&table, &columns), params_from_iter(values))?;
            }
            tx.commit()?;
            ok(Some(("inserted", inserted as i64)))
          }
        };
        Ok(response)
      })
      .await?;
    Ok(response)
  }
}

impl CommandRunner for SqliteCommandRunner {
  type Error = Error;

  async fn run_command(&self, command: Document) -> Result<Document> {
    let command = Command::parse(&command)?;
    debug!(command = command.name(), "running command");
    self.run(command).await
  }
}
