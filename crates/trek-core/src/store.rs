//! The collaborator traits the engine drives.
//!
//! [`HistoryStore`] persists [`MigrationRecord`]s; [`CommandRunner`] executes
//! a command document against the target store. Backends live in other
//! crates (e.g. `trek-store-sqlite`); the engine only depends on these
//! abstractions.

use std::future::Future;

use crate::{document::Document, record::MigrationRecord};

// ─── History ─────────────────────────────────────────────────────────────────

/// Name of the table or collection holding the migration history unless
/// configured otherwise.
pub const DEFAULT_HISTORY_TABLE: &str = "_schema_version";

/// Durable, version-keyed storage of migration records.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait HistoryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Every record ever saved, in no particular order.
  fn find_all(
    &self,
  ) -> impl Future<Output = Result<Vec<MigrationRecord>, Self::Error>> + Send + '_;

  /// The successful record with the highest version, if any.
  fn find_last_successful(
    &self,
  ) -> impl Future<Output = Result<Option<MigrationRecord>, Self::Error>> + Send + '_
  {
    async move {
      Ok(
        self
          .find_all()
          .await?
          .into_iter()
          .filter(MigrationRecord::is_successful)
          .max_by(|a, b| a.version.cmp(&b.version)),
      )
    }
  }

  /// Insert or overwrite the record stored under `record.version`.
  fn save<'a>(
    &'a self,
    record: &'a MigrationRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Target store ────────────────────────────────────────────────────────────

/// Runs one command document against the store being migrated.
///
/// The call is awaited to completion; any timeout policy belongs to the
/// implementation.
pub trait CommandRunner: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Execute `command` and return the store's response document.
  fn run_command(
    &self,
    command: Document,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;
}
