//! Sequential execution of pending migrations.
//!
//! Per migration, in ascending version order:
//!
//! 1. persist the record as `Running`;
//! 2. materialise and interpolate its command, then hand it to the
//!    [`CommandRunner`];
//! 3. persist `Successful` with the runner's response, or `Failed` with the
//!    error message, in which case the run stops.
//!
//! Exactly two saves happen for every attempted migration. Migrations after a
//! failure are not touched.

use tracing::{debug, info, warn};

use crate::{
  BoxError, Error, Result,
  document::Document,
  interpolate::Interpolator,
  record::MigrationRecord,
  store::{CommandRunner, HistoryStore},
};

pub struct Executor<'a, H, R> {
  history:      &'a H,
  runner:       &'a R,
  interpolator: &'a Interpolator,
}

impl<'a, H, R> Executor<'a, H, R>
where
  H: HistoryStore,
  R: CommandRunner,
{
  pub fn new(history: &'a H, runner: &'a R, interpolator: &'a Interpolator) -> Self {
    Self { history, runner, interpolator }
  }

  /// Apply `pending` (expected ascending, as produced by
  /// [`crate::state::MigrationsState::pending`]) and return how many
  /// succeeded.
  ///
  /// The first failure is persisted and returned as
  /// [`Error::MigrationFailed`]; migrations that already succeeded in this
  /// run stay `Successful`.
  pub async fn execute(&self, pending: Vec<MigrationRecord>) -> Result<usize> {
    let mut applied = 0;

    for record in pending {
      // Checked before anything is persisted: a record without a command is
      // a caller bug, not a migration failure.
      record.command()?;

      info!(version = %record.version, "       {} : {}", record.version, record.description);

      let running = record.running();
      self.save(&running).await?;

      match self.apply(&running).await {
        Ok(result) => {
          let successful = running.successful(result);
          self.save(&successful).await?;
          applied += 1;
        }
        Err(source) => {
          warn!(version = %running.version, error = %source, "migration failed");
          let version = running.version.clone();
          let failed = running.failed(source.to_string());
          self.save(&failed).await?;
          return Err(Error::MigrationFailed { version, applied, source });
        }
      }
    }

    Ok(applied)
  }

  async fn apply(&self, record: &MigrationRecord) -> Result<Document, BoxError> {
    let raw = record.command()?.payload().materialize()?;
    let command = self.interpolator.interpolated(raw)?;
    Ok(self.runner.run_command(command).await?)
  }

  async fn save(&self, record: &MigrationRecord) -> Result<()> {
    debug!(version = %record.version, status = %record.status, "saving migration record");
    self.history.save(record).await.map_err(Error::history)
  }
}
