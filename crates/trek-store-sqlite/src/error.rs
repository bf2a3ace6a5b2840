//! Error type for `trek-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] trek_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("invalid version {0:?} in history table")]
  InvalidVersion(String),

  #[error("invalid status {0:?} in history table")]
  InvalidStatus(String),

  #[error("invalid table name {0:?}: {1}")]
  InvalidTableName(String, &'static str),

  /// The command document matched none of `execute`, `script` or `insert`.
  #[error("no such command: '{0}'")]
  UnknownCommand(String),

  #[error("invalid {command} command: {reason}")]
  InvalidCommand {
    command: &'static str,
    reason:  String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
