//! Encoding and decoding helpers between Trek types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with millisecond precision.
//! Statuses are stored as their variant name. Command results are stored as
//! compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use trek_core::{
  document::{Document, Value},
  record::{MigrationRecord, MigrationStatus},
  version::Version,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── MigrationStatus ─────────────────────────────────────────────────────────

pub fn encode_status(status: MigrationStatus) -> String { status.as_ref().to_owned() }

pub fn decode_status(s: &str) -> Result<MigrationStatus> {
  s.parse().map_err(|_| Error::InvalidStatus(s.to_owned()))
}

// ─── Result document ─────────────────────────────────────────────────────────

pub fn encode_result(result: &Document) -> Result<String> {
  Ok(serde_json::to_string(result)?)
}

pub fn decode_result(s: &str) -> Result<Document> { Ok(serde_json::from_str(s)?) }

// ─── Command parameters ──────────────────────────────────────────────────────

/// Bind a document value as an SQL parameter. Booleans become 0/1; arrays
/// and nested documents are stored as JSON text.
pub fn encode_param(value: &Value) -> Result<SqlValue> {
  Ok(match value {
    Value::Null => SqlValue::Null,
    Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
    Value::Int(i) => SqlValue::Integer(*i),
    Value::Float(f) => SqlValue::Real(*f),
    Value::String(s) => SqlValue::Text(s.clone()),
    Value::DateTime(dt) => SqlValue::Text(encode_dt(*dt)),
    Value::Array(_) | Value::Document(_) => SqlValue::Text(serde_json::to_string(value)?),
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a history table row.
pub struct RawRecord {
  pub version:         String,
  pub description:     String,
  pub author:          String,
  pub started:         Option<String>,
  pub finished:        Option<String>,
  pub status:          String,
  pub failure_message: Option<String>,
  pub result:          Option<String>,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      version:         row.get(0)?,
      description:     row.get(1)?,
      author:          row.get(2)?,
      started:         row.get(3)?,
      finished:        row.get(4)?,
      status:          row.get(5)?,
      failure_message: row.get(6)?,
      result:          row.get(7)?,
    })
  }

  pub fn into_record(self) -> Result<MigrationRecord> {
    let version =
      Version::parse(&self.version).map_err(|_| Error::InvalidVersion(self.version.clone()))?;
    let started = self.started.as_deref().map(decode_dt).transpose()?;
    let finished = self.finished.as_deref().map(decode_dt).transpose()?;
    let status = decode_status(&self.status)?;
    let result = self.result.as_deref().map(decode_result).transpose()?;

    Ok(MigrationRecord::from_history(
      version,
      self.description,
      self.author,
      started,
      finished,
      status,
      self.failure_message,
      result,
    ))
  }
}

/// Column list matching [`RawRecord::from_row`].
pub const RECORD_COLUMNS: &str =
  "version, description, author, started, finished, status, failure_message, result";

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn status_round_trips_through_variant_name() {
    for status in [
      MigrationStatus::Pending,
      MigrationStatus::Running,
      MigrationStatus::Successful,
      MigrationStatus::Failed,
    ] {
      assert_eq!(decode_status(&encode_status(status)).unwrap(), status);
    }
    assert!(matches!(decode_status("Done"), Err(Error::InvalidStatus(_))));
  }

  #[test]
  fn params() {
    let dt = Utc.with_ymd_and_hms(1956, 3, 19, 0, 0, 0).unwrap();
    assert_eq!(encode_param(&Value::Bool(true)).unwrap(), SqlValue::Integer(1));
    assert_eq!(
      encode_param(&Value::DateTime(dt)).unwrap(),
      SqlValue::Text("1956-03-19T00:00:00.000Z".into())
    );
    assert_eq!(
      encode_param(&Value::Array(vec![Value::Int(1), Value::from("a")])).unwrap(),
      SqlValue::Text(r#"[1,"a"]"#.into())
    );
  }
}
