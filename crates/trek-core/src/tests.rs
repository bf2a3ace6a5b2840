//! Engine tests: reconciliation, execution and persistence against the
//! in-memory history store and a scripted command runner.

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use serde_json::json;
use thiserror::Error;

use crate::{
  Error, Trek,
  definition::MigrationDefinition,
  document::{Document, Value, document_from_json},
  executor::Executor,
  interpolate::Interpolator,
  memory::MemoryHistoryStore,
  record::{MigrationRecord, MigrationStatus},
  store::{CommandRunner, HistoryStore},
  version::Version,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("{0}")]
struct CommandFailed(String);

/// Records every command; fails any command carrying a `fail` key with that
/// key's message.
#[derive(Default)]
struct ScriptedRunner {
  calls: Mutex<Vec<Document>>,
}

impl ScriptedRunner {
  fn calls(&self) -> Vec<Document> { self.calls.lock().unwrap().clone() }
}

impl CommandRunner for ScriptedRunner {
  type Error = CommandFailed;

  async fn run_command(&self, command: Document) -> Result<Document, CommandFailed> {
    self.calls.lock().unwrap().push(command.clone());
    if let Some(message) = command.get("fail").and_then(Value::as_str) {
      return Err(CommandFailed(message.to_owned()));
    }
    Ok(doc(json!({ "ok": 1 })))
  }
}

fn doc(json: serde_json::Value) -> Document { document_from_json(json).unwrap() }

fn def(version: &str, description: &str) -> Arc<MigrationDefinition> {
  def_with(version, description, json!({ "ping": version }))
}

fn def_with(
  version: &str,
  description: &str,
  command: serde_json::Value,
) -> Arc<MigrationDefinition> {
  Arc::new(
    MigrationDefinition::builder(version, description)
      .command(doc(command))
      .build()
      .unwrap(),
  )
}

fn v(s: &str) -> Version { Version::parse(s).unwrap() }

fn historical(version: &str, status: MigrationStatus) -> MigrationRecord {
  let started = Utc.with_ymd_and_hms(2014, 12, 4, 22, 0, 0).unwrap();
  MigrationRecord::from_history(
    v(version),
    format!("historical {version}"),
    "Marge Simpson".into(),
    Some(started),
    (status == MigrationStatus::Successful).then_some(started),
    status,
    (status == MigrationStatus::Failed).then(|| "Something went horribly wrong!".into()),
    None,
  )
}

fn trek(history: MemoryHistoryStore) -> Trek<MemoryHistoryStore, ScriptedRunner> {
  Trek::new(history, ScriptedRunner::default())
}

fn versions(records: &[&MigrationRecord]) -> Vec<String> {
  records.iter().map(|m| m.version.to_string()).collect()
}

fn save_log(store: &MemoryHistoryStore) -> Vec<(String, MigrationStatus)> {
  store
    .saves()
    .into_iter()
    .map(|r| (r.version.to_string(), r.status))
    .collect()
}

// ─── Happy path ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn applies_everything_in_order_and_saves_twice_per_migration() {
  let t = trek(MemoryHistoryStore::new());
  let defs = [def("2.0.0", "seed data"), def("1.0.0", "create index")];

  let outcome = t.migrate(&defs).await.unwrap();

  assert_eq!(outcome.applied, 2);
  assert_eq!(save_log(t.history()), [
    ("1.0.0".to_owned(), MigrationStatus::Running),
    ("1.0.0".to_owned(), MigrationStatus::Successful),
    ("2.0.0".to_owned(), MigrationStatus::Running),
    ("2.0.0".to_owned(), MigrationStatus::Successful),
  ]);

  let calls = t.runner().calls();
  assert_eq!(calls, [doc(json!({ "ping": "1.0.0" })), doc(json!({ "ping": "2.0.0" }))]);

  let state = &outcome.state;
  assert_eq!(state.current_version(), "2.0.0");
  assert_eq!(versions(&state.applied()), ["1.0.0", "2.0.0"]);
  assert!(state.failed().is_empty());
  assert!(!state.pending().has_pending());

  let stored = t.history().get(&v("1.0.0")).unwrap();
  assert_eq!(stored.result, Some(doc(json!({ "ok": 1 }))));
  assert!(stored.started.is_some() && stored.finished.is_some());
}

#[tokio::test]
async fn second_run_is_a_no_op() {
  let t = trek(MemoryHistoryStore::new());
  let defs = [def("1.0.0", "a"), def("1.1.0", "b")];

  let first = t.migrate(&defs).await.unwrap();
  let saves_after_first = t.history().saves().len();

  let second = t.migrate(&defs).await.unwrap();

  assert_eq!(second.applied, 0);
  assert_eq!(t.history().saves().len(), saves_after_first);
  assert_eq!(t.runner().calls().len(), 2);
  assert_eq!(second.state.current_version(), first.state.current_version());
  assert_eq!(versions(&second.state.applied()), versions(&first.state.applied()));
  for (a, b) in first.state.migrations().iter().zip(second.state.migrations()) {
    assert_eq!(a.status, b.status);
    assert_eq!(a.started, b.started);
    assert_eq!(a.finished, b.finished);
  }
}

#[tokio::test]
async fn nothing_declared_is_a_no_op() {
  let t = trek(MemoryHistoryStore::with_records([historical(
    "1.0.0",
    MigrationStatus::Successful,
  )]));
  let outcome = t.migrate(&[]).await.unwrap();
  assert_eq!(outcome.applied, 0);
  assert_eq!(outcome.state.current_version(), "1.0.0");
  assert!(t.history().saves().is_empty());
}

// ─── Failures and retries ────────────────────────────────────────────────────

#[tokio::test]
async fn retries_failed_migration_and_stops_at_next_failure() {
  let t = trek(MemoryHistoryStore::with_records([
    historical("1.0.0", MigrationStatus::Successful),
    historical("1.0.1", MigrationStatus::Failed),
  ]));
  let defs = [
    def("1.0.0", "applied"),
    def("1.0.1", "failed last time"),
    def_with("1.0.2", "always fails", json!({ "fail": "no such command: 'rubbish'" })),
  ];

  let state = t.status(&defs).await.unwrap();
  assert_eq!(versions(state.pending().migrations()), ["1.0.1", "1.0.2"]);

  let err = t.migrate(&defs).await.unwrap_err();
  match &err {
    Error::MigrationFailed { version, applied, source } => {
      assert_eq!(version.as_str(), "1.0.2");
      assert_eq!(*applied, 1);
      assert_eq!(source.to_string(), "no such command: 'rubbish'");
    }
    other => panic!("unexpected error: {other}"),
  }

  let v101 = t.history().get(&v("1.0.1")).unwrap();
  assert_eq!(v101.status, MigrationStatus::Successful);
  assert!(v101.failure_message.is_none());

  let v102 = t.history().get(&v("1.0.2")).unwrap();
  assert_eq!(v102.status, MigrationStatus::Failed);
  assert_eq!(v102.failure_message.as_deref(), Some("no such command: 'rubbish'"));
  assert!(v102.finished.is_none());

  let state = t.status(&defs).await.unwrap();
  assert_eq!(state.current_version(), "1.0.1");
  assert_eq!(versions(&state.failed()), ["1.0.2"]);
}

#[tokio::test]
async fn later_migrations_are_untouched_after_a_failure() {
  let t = trek(MemoryHistoryStore::new());
  let defs = [
    def("1.0.0", "ok"),
    def_with("1.1.0", "boom", json!({ "fail": "boom" })),
    def("1.2.0", "never reached"),
  ];

  assert!(t.migrate(&defs).await.is_err());

  assert_eq!(save_log(t.history()), [
    ("1.0.0".to_owned(), MigrationStatus::Running),
    ("1.0.0".to_owned(), MigrationStatus::Successful),
    ("1.1.0".to_owned(), MigrationStatus::Running),
    ("1.1.0".to_owned(), MigrationStatus::Failed),
  ]);
  assert!(t.history().get(&v("1.2.0")).is_none());

  let state = t.status(&defs).await.unwrap();
  assert!(state.get(&v("1.2.0")).unwrap().is_pending());
  assert_eq!(versions(state.pending().migrations()), ["1.1.0", "1.2.0"]);
}

#[tokio::test]
async fn interpolation_failure_is_recorded_without_running_the_command() {
  let t = trek(MemoryHistoryStore::new());
  let defs = [def_with(
    "1.0.0",
    "bad date",
    json!({ "insert": "people", "documents": [ { "born": { "$date": "not-a-date" } } ] }),
  )];

  let err = t.migrate(&defs).await.unwrap_err();
  assert!(matches!(err, Error::MigrationFailed { applied: 0, .. }));
  assert!(t.runner().calls().is_empty());

  let record = t.history().get(&v("1.0.0")).unwrap();
  assert_eq!(record.status, MigrationStatus::Failed);
  assert!(record.failure_message.unwrap().contains("[ not-a-date ]"));
}

#[tokio::test]
async fn failing_generated_payload_is_recorded() {
  let t = trek(MemoryHistoryStore::new());
  let defs = [Arc::new(
    MigrationDefinition::builder("1.0.0", "generated")
      .generated(|| Err("could not build command".into()))
      .build()
      .unwrap(),
  )];

  assert!(t.migrate(&defs).await.is_err());
  let record = t.history().get(&v("1.0.0")).unwrap();
  assert_eq!(record.failure_message.as_deref(), Some("could not build command"));
  assert!(t.runner().calls().is_empty());
}

// ─── Structural errors ───────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_versions_abort_before_any_side_effect() {
  let t = trek(MemoryHistoryStore::new());
  let defs = [def("1.0.0", "a"), def("1.0.0", "b")];

  let err = t.migrate(&defs).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateVersion(ref v) if v.as_str() == "1.0.0"));
  assert!(t.history().saves().is_empty());
  assert!(t.runner().calls().is_empty());
}

#[tokio::test]
async fn stale_running_record_aborts_migrate_but_not_status() {
  let t = trek(MemoryHistoryStore::with_records([historical(
    "1.0.0",
    MigrationStatus::Running,
  )]));
  let defs = [def("1.0.0", "in flight"), def("1.1.0", "next")];

  let err = t.migrate(&defs).await.unwrap_err();
  assert!(matches!(err, Error::StaleRunning(ref v) if v.as_str() == "1.0.0"));
  assert!(t.runner().calls().is_empty());

  let state = t.status(&defs).await.unwrap();
  assert_eq!(versions(&state.running()), ["1.0.0"]);
  assert_eq!(versions(state.pending().migrations()), ["1.1.0"]);
}

#[tokio::test]
async fn executor_rejects_records_without_a_command() {
  let history = MemoryHistoryStore::new();
  let runner = ScriptedRunner::default();
  let interpolator = Interpolator::default();

  let orphan = historical("1.0.0", MigrationStatus::Failed);
  let err = Executor::new(&history, &runner, &interpolator)
    .execute(vec![orphan])
    .await
    .unwrap_err();

  assert!(matches!(err, Error::MissingCommand(_)));
  assert!(history.saves().is_empty());
}

// ─── Payloads ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn commands_are_interpolated_before_running() {
  let t = trek(MemoryHistoryStore::new());
  let defs = [def_with(
    "1.0.0",
    "seed",
    json!({ "insert": "people", "documents": [ { "born": { "$date": "1956-03-19" } } ] }),
  )];

  t.migrate(&defs).await.unwrap();

  let calls = t.runner().calls();
  let born = calls[0]["documents"].as_array().unwrap()[0].get("born").unwrap();
  assert_eq!(born, &Value::DateTime(Utc.with_ymd_and_hms(1956, 3, 19, 0, 0, 0).unwrap()));
}

#[tokio::test]
async fn generated_payloads_go_through_the_runner() {
  let t = trek(MemoryHistoryStore::new());
  let defs = [Arc::new(
    MigrationDefinition::builder("1.0.0", "generated")
      .author("code")
      .generated(|| Ok(doc(json!({ "ping": "generated" }))))
      .build()
      .unwrap(),
  )];

  let outcome = t.migrate(&defs).await.unwrap();
  assert_eq!(outcome.applied, 1);
  assert_eq!(t.runner().calls(), [doc(json!({ "ping": "generated" }))]);
  assert_eq!(t.history().get(&v("1.0.0")).unwrap().author, "code");
}

// ─── History store defaults ──────────────────────────────────────────────────

#[tokio::test]
async fn find_last_successful_uses_version_order() {
  let store = MemoryHistoryStore::with_records([
    historical("1.0.9", MigrationStatus::Successful),
    historical("1.0.10", MigrationStatus::Successful),
    historical("1.1.0", MigrationStatus::Failed),
  ]);
  let last = store.find_last_successful().await.unwrap().unwrap();
  assert_eq!(last.version.as_str(), "1.0.10");

  let empty = MemoryHistoryStore::new();
  assert!(empty.find_last_successful().await.unwrap().is_none());
}
