//! Reconciliation: merging declared definitions with persisted history.

use std::{collections::HashMap, sync::Arc};

use crate::{
  Error, Result,
  definition::MigrationDefinition,
  record::MigrationRecord,
  state::MigrationsState,
  version::Version,
};

/// Merge `definitions` with `history` into a [`MigrationsState`].
///
/// - A version declared more than once fails with
///   [`Error::DuplicateVersion`], naming the first such version in
///   declaration order.
/// - A declared definition with a matching history record reuses that record
///   (status, timing, result) and gets the definition attached.
/// - A declared definition without history becomes a fresh `Pending` record.
/// - History records that are no longer declared are kept, with no command.
///
/// Pure; performs no I/O.
pub fn reconcile(
  definitions: &[Arc<MigrationDefinition>],
  history: Vec<MigrationRecord>,
) -> Result<MigrationsState> {
  check_duplicates(definitions)?;

  let mut merged: HashMap<Version, MigrationRecord> = history
    .into_iter()
    .map(|r| (r.version.clone(), r))
    .collect();

  for definition in definitions {
    let record = match merged.remove(definition.version()) {
      Some(existing) => existing.assign(Arc::clone(definition)),
      None => MigrationRecord::pending(Arc::clone(definition)),
    };
    merged.insert(record.version.clone(), record);
  }

  Ok(MigrationsState::new(merged.into_values()))
}

fn check_duplicates(definitions: &[Arc<MigrationDefinition>]) -> Result<()> {
  let mut counts: HashMap<&Version, usize> = HashMap::new();
  for definition in definitions {
    *counts.entry(definition.version()).or_default() += 1;
  }

  match definitions.iter().find(|d| counts[d.version()] > 1) {
    Some(duplicate) => Err(Error::DuplicateVersion(duplicate.version().clone())),
    None => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::{
    document::{Document, Value},
    record::MigrationStatus,
    state::NO_VERSION,
  };

  fn def(version: &str, description: &str) -> Arc<MigrationDefinition> {
    let mut cmd = Document::new();
    cmd.insert("ping".into(), Value::Int(1));
    Arc::new(
      MigrationDefinition::builder(version, description)
        .command(cmd)
        .build()
        .unwrap(),
    )
  }

  fn history(version: &str, status: MigrationStatus) -> MigrationRecord {
    MigrationRecord::from_history(
      Version::parse(version).unwrap(),
      format!("historical {version}"),
      "Homer Simpson".into(),
      Some(Utc::now()),
      None,
      status,
      (status == MigrationStatus::Failed).then(|| "Something went horribly wrong!".into()),
      None,
    )
  }

  fn versions(records: &[&MigrationRecord]) -> Vec<String> {
    records.iter().map(|m| m.version.to_string()).collect()
  }

  #[test]
  fn empty_history_makes_everything_pending_in_order() {
    let defs = [def("1.0.10", "c"), def("1.0.2", "a"), def("1.0.9", "b")];
    let state = reconcile(&defs, vec![]).unwrap();

    assert_eq!(versions(state.pending().migrations()), ["1.0.2", "1.0.9", "1.0.10"]);
    assert_eq!(state.current_version(), NO_VERSION);
    assert!(state.migrations().iter().all(|m| m.has_command()));
  }

  #[test]
  fn duplicate_versions_are_rejected() {
    let defs = [def("1.0.0", "a"), def("1.0.1", "b"), def("1.0.1", "c"), def("1.0.0", "d")];
    let err = reconcile(&defs, vec![]).unwrap_err();
    assert!(
      matches!(&err, Error::DuplicateVersion(v) if v.as_str() == "1.0.0"),
      "unexpected error: {err}"
    );
    assert_eq!(err.to_string(), "migration [ 1.0.0 ] has duplicate commands");
  }

  #[test]
  fn history_status_is_kept_and_command_attached() {
    let defs = [def("1.0.0", "a"), def("1.0.1", "b"), def("1.0.2", "c")];
    let state = reconcile(&defs, vec![
      history("1.0.0", MigrationStatus::Successful),
      history("1.0.1", MigrationStatus::Failed),
    ])
    .unwrap();

    let v101 = state.get(&Version::parse("1.0.1").unwrap()).unwrap();
    assert!(v101.is_failed());
    assert_eq!(v101.author, "Homer Simpson");
    assert!(v101.has_command());

    assert_eq!(versions(state.pending().migrations()), ["1.0.1", "1.0.2"]);
    assert_eq!(state.current_version(), "1.0.0");
  }

  #[test]
  fn undeclared_history_is_kept_but_not_runnable() {
    let defs = [def("2.0.0", "new")];
    let state = reconcile(&defs, vec![
      history("1.0.0", MigrationStatus::Successful),
      history("1.5.0", MigrationStatus::Failed),
    ])
    .unwrap();

    assert_eq!(versions(&state.migrations()), ["1.0.0", "1.5.0", "2.0.0"]);
    assert_eq!(versions(state.pending().migrations()), ["2.0.0"]);
    assert_eq!(versions(&state.orphaned()), ["1.5.0"]);
    assert_eq!(versions(&state.failed()), ["1.5.0"]);
  }
}
