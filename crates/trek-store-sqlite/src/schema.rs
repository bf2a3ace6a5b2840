//! SQL schema for the migration history table.
//!
//! The table name is configurable, so the DDL is a template rather than a
//! constant. Callers must validate the name with [`validate_table_name`]
//! first.

use crate::{Error, Result};

/// Table used when none is configured.
pub const DEFAULT_TABLE: &str = trek_core::DEFAULT_HISTORY_TABLE;

/// Idempotent DDL for a history table called `table`.
pub fn history_schema(table: &str) -> String {
  format!(
    "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS \"{table}\" (
    version         TEXT PRIMARY KEY,
    description     TEXT NOT NULL,
    author          TEXT NOT NULL,
    started         TEXT,            -- RFC 3339 UTC
    finished        TEXT,            -- RFC 3339 UTC
    status          TEXT NOT NULL,   -- 'Pending' | 'Running' | 'Successful' | 'Failed'
    failure_message TEXT,
    result          TEXT             -- JSON response of the command runner
);
"
  )
}

/// Accept plain SQL identifiers only: a letter or underscore followed by
/// letters, digits and underscores.
pub fn validate_table_name(table: &str) -> Result<()> {
  let invalid = |reason| Err(Error::InvalidTableName(table.to_owned(), reason));

  let mut chars = table.chars();
  match chars.next() {
    None => return invalid("must not be empty"),
    Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
      return invalid("must start with a letter or underscore");
    }
    Some(_) => {}
  }
  if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
    return invalid("may only contain letters, digits and underscores");
  }
  if table.to_ascii_lowercase().starts_with("sqlite_") {
    return invalid("names starting with sqlite_ are reserved");
  }
  Ok(())
}

/// Quote an arbitrary identifier for use in generated SQL.
pub fn quote_identifier(name: &str) -> String {
  format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn table_names() {
    assert!(validate_table_name("_schema_version").is_ok());
    assert!(validate_table_name("history2").is_ok());
    assert!(validate_table_name("").is_err());
    assert!(validate_table_name("2history").is_err());
    assert!(validate_table_name("x; DROP TABLE people").is_err());
    assert!(validate_table_name("sqlite_master").is_err());
  }

  #[test]
  fn quoting_doubles_quotes() {
    assert_eq!(quote_identifier("people"), "\"people\"");
    assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
  }
}
