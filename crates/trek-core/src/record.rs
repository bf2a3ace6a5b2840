//! Migration records — the persisted outcome of the latest attempt at each
//! version.
//!
//! Records are keyed by version and overwritten on every attempt (upsert, not
//! append). They change only through [`MigrationRecord::running`],
//! [`MigrationRecord::successful`] and [`MigrationRecord::failed`], each of
//! which consumes the record and returns the next one.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  Error, Result,
  definition::MigrationDefinition,
  document::Document,
  version::Version,
};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Persisted as the variant name (`"Pending"`, `"Running"`, ...).
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
pub enum MigrationStatus {
  Pending,
  Running,
  Successful,
  Failed,
}

impl MigrationStatus {
  /// A successful migration is never attempted again.
  pub fn is_terminal(self) -> bool { matches!(self, Self::Successful) }

  /// Whether a migration in this status is picked up by the next run.
  pub fn is_runnable(self) -> bool { matches!(self, Self::Pending | Self::Failed) }
}

// ─── Record ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
  pub version:         Version,
  pub description:     String,
  pub author:          String,
  pub started:         Option<DateTime<Utc>>,
  pub finished:        Option<DateTime<Utc>>,
  pub status:          MigrationStatus,
  pub failure_message: Option<String>,
  /// The target store's response to a successful command.
  pub result:          Option<Document>,
  /// The definition to execute. Attached during reconciliation; never
  /// persisted.
  #[serde(skip)]
  command:             Option<Arc<MigrationDefinition>>,
}

impl MigrationRecord {
  /// A never-attempted record for `definition`, with the definition attached.
  pub fn pending(definition: Arc<MigrationDefinition>) -> Self {
    Self {
      version:         definition.version().clone(),
      description:     definition.description().to_owned(),
      author:          definition.author().to_owned(),
      started:         None,
      finished:        None,
      status:          MigrationStatus::Pending,
      failure_message: None,
      result:          None,
      command:         Some(definition),
    }
  }

  /// Rehydrate a record loaded from a history store. No command is attached.
  #[allow(clippy::too_many_arguments)]
  pub fn from_history(
    version: Version,
    description: String,
    author: String,
    started: Option<DateTime<Utc>>,
    finished: Option<DateTime<Utc>>,
    status: MigrationStatus,
    failure_message: Option<String>,
    result: Option<Document>,
  ) -> Self {
    Self {
      version,
      description,
      author,
      started,
      finished,
      status,
      failure_message,
      result,
      command: None,
    }
  }

  /// Attach the definition that will be executed for this record.
  pub fn assign(mut self, definition: Arc<MigrationDefinition>) -> Self {
    self.command = Some(definition);
    self
  }

  /// The attached definition.
  ///
  /// Asking before one was assigned is a programming error and yields
  /// [`Error::MissingCommand`].
  pub fn command(&self) -> Result<&MigrationDefinition> {
    self
      .command
      .as_deref()
      .ok_or_else(|| Error::MissingCommand(self.version.clone()))
  }

  pub fn has_command(&self) -> bool { self.command.is_some() }

  // ── Transitions ───────────────────────────────────────────────────────

  pub fn running(self) -> Self {
    Self {
      started: Some(Utc::now()),
      finished: None,
      status: MigrationStatus::Running,
      failure_message: None,
      result: None,
      ..self
    }
  }

  pub fn successful(self, result: Document) -> Self {
    Self {
      finished: Some(Utc::now()),
      status: MigrationStatus::Successful,
      failure_message: None,
      result: Some(result),
      ..self
    }
  }

  pub fn failed(self, message: impl Into<String>) -> Self {
    Self {
      finished: None,
      status: MigrationStatus::Failed,
      failure_message: Some(message.into()),
      result: None,
      ..self
    }
  }

  // ── Reporting ─────────────────────────────────────────────────────────

  pub fn is_pending(&self) -> bool { self.status == MigrationStatus::Pending }

  pub fn is_running(&self) -> bool { self.status == MigrationStatus::Running }

  pub fn is_successful(&self) -> bool { self.status == MigrationStatus::Successful }

  pub fn is_failed(&self) -> bool { self.status == MigrationStatus::Failed }

  /// Wall-clock time the last successful attempt took.
  pub fn duration(&self) -> Option<Duration> {
    match (self.status, self.started, self.finished) {
      (MigrationStatus::Successful, Some(started), Some(finished)) => {
        Some(finished - started)
      }
      _ => None,
    }
  }

  /// Bracketed status tags, e.g.
  /// `[ Failed ] [ 2014-12-05 09:11:01 ] [ ERROR: boom ]`.
  pub fn tags(&self) -> String {
    let mut tags = vec![format!("[ {} ]", self.status)];

    if matches!(self.status, MigrationStatus::Successful | MigrationStatus::Failed)
      && let Some(started) = self.started
    {
      tags.push(format!(
        "[ {} ]",
        started.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
      ));
    }

    if let Some(duration) = self.duration() {
      tags.push(format!("[ {} seconds ]", duration.num_seconds()));
    }

    if let (MigrationStatus::Failed, Some(message)) =
      (self.status, self.failure_message.as_deref())
    {
      tags.push(format!("[ ERROR: {message} ]"));
    }

    tags.join(" ")
  }
}
