//! [`MemoryHistoryStore`] — an in-process [`HistoryStore`].
//!
//! Useful for tests and dry runs. Besides the current records it keeps a log
//! of every record passed to [`HistoryStore::save`], in call order.

use std::{
  collections::BTreeMap,
  convert::Infallible,
  sync::{Mutex, MutexGuard},
};

use crate::{record::MigrationRecord, store::HistoryStore, version::Version};

#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
  inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
  records: BTreeMap<Version, MigrationRecord>,
  saves:   Vec<MigrationRecord>,
}

impl MemoryHistoryStore {
  pub fn new() -> Self { Self::default() }

  /// Seed the store with existing history. Seeding is not logged as a save.
  pub fn with_records(records: impl IntoIterator<Item = MigrationRecord>) -> Self {
    let store = Self::new();
    {
      let mut inner = store.lock();
      for record in records {
        inner.records.insert(record.version.clone(), record);
      }
    }
    store
  }

  /// Every record passed to `save`, oldest first.
  pub fn saves(&self) -> Vec<MigrationRecord> { self.lock().saves.clone() }

  pub fn get(&self, version: &Version) -> Option<MigrationRecord> {
    self.lock().records.get(version).cloned()
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    // A poisoned lock only means another test thread panicked mid-save; the
    // map itself is still consistent.
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl HistoryStore for MemoryHistoryStore {
  type Error = Infallible;

  async fn find_all(&self) -> Result<Vec<MigrationRecord>, Infallible> {
    Ok(self.lock().records.values().cloned().collect())
  }

  async fn save(&self, record: &MigrationRecord) -> Result<(), Infallible> {
    let mut inner = self.lock();
    inner.records.insert(record.version.clone(), record.clone());
    inner.saves.push(record.clone());
    Ok(())
  }
}
