//! [`MigrationsState`] — the merged view of declared migrations and history.
//!
//! Never persisted; rebuilt by [`crate::reconcile::reconcile`] whenever it is
//! needed.

use std::collections::BTreeMap;

use crate::{record::MigrationRecord, version::Version};

/// Shown in place of a version when there is none.
pub const NO_VERSION: &str = "N/A";

#[derive(Debug, Clone, Default)]
pub struct MigrationsState {
  migrations: BTreeMap<Version, MigrationRecord>,
}

impl MigrationsState {
  pub fn new(records: impl IntoIterator<Item = MigrationRecord>) -> Self {
    Self {
      migrations: records
        .into_iter()
        .map(|r| (r.version.clone(), r))
        .collect(),
    }
  }

  /// The version of the highest successful migration, or `"N/A"`.
  pub fn current_version(&self) -> String {
    self
      .last_successful()
      .map(|m| m.version.to_string())
      .unwrap_or_else(|| NO_VERSION.to_owned())
  }

  pub fn last_successful(&self) -> Option<&MigrationRecord> {
    self.migrations.values().rev().find(|m| m.is_successful())
  }

  /// Every known migration, declared or historical, ascending by version.
  pub fn migrations(&self) -> Vec<&MigrationRecord> {
    self.migrations.values().collect()
  }

  pub fn get(&self, version: &Version) -> Option<&MigrationRecord> {
    self.migrations.get(version)
  }

  pub fn len(&self) -> usize { self.migrations.len() }

  pub fn is_empty(&self) -> bool { self.migrations.is_empty() }

  /// Pending and previously failed migrations that still have a declared
  /// command, ascending.
  pub fn pending(&self) -> Pending<'_> {
    Pending {
      migrations: self
        .migrations
        .values()
        .filter(|m| m.status.is_runnable() && m.has_command())
        .collect(),
    }
  }

  pub fn failed(&self) -> Vec<&MigrationRecord> {
    self.migrations.values().filter(|m| m.is_failed()).collect()
  }

  pub fn applied(&self) -> Vec<&MigrationRecord> {
    self.migrations.values().filter(|m| m.is_successful()).collect()
  }

  /// Migrations left `Running` by an attempt that never finished.
  pub fn running(&self) -> Vec<&MigrationRecord> {
    self.migrations.values().filter(|m| m.is_running()).collect()
  }

  /// Unfinished history entries whose definition is no longer declared.
  /// They cannot be run and are excluded from [`Self::pending`].
  pub fn orphaned(&self) -> Vec<&MigrationRecord> {
    self
      .migrations
      .values()
      .filter(|m| !m.has_command() && !m.is_successful())
      .collect()
  }
}

// ─── Pending view ────────────────────────────────────────────────────────────

/// The migrations the next run will attempt, ascending by version.
#[derive(Debug, Clone)]
pub struct Pending<'a> {
  migrations: Vec<&'a MigrationRecord>,
}

impl<'a> Pending<'a> {
  pub fn has_pending(&self) -> bool { !self.migrations.is_empty() }

  pub fn len(&self) -> usize { self.migrations.len() }

  pub fn is_empty(&self) -> bool { self.migrations.is_empty() }

  pub fn next_version(&self) -> String {
    self
      .migrations
      .first()
      .map(|m| m.version.to_string())
      .unwrap_or_else(|| NO_VERSION.to_owned())
  }

  pub fn last_version(&self) -> String {
    self
      .migrations
      .last()
      .map(|m| m.version.to_string())
      .unwrap_or_else(|| NO_VERSION.to_owned())
  }

  pub fn migrations(&self) -> &[&'a MigrationRecord] { &self.migrations }

  /// Owned copies, ready to be handed to the executor.
  pub fn to_records(&self) -> Vec<MigrationRecord> {
    self.migrations.iter().map(|m| (*m).clone()).collect()
  }
}
