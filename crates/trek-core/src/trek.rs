//! [`Trek`] — the entry point that reports on and applies migrations.

use std::sync::Arc;

use tracing::debug;

use crate::{
  Error, Result,
  definition::MigrationDefinition,
  executor::Executor,
  interpolate::Interpolator,
  reconcile::reconcile,
  state::MigrationsState,
  store::{CommandRunner, HistoryStore},
};

/// What a successful [`Trek::migrate`] did.
#[derive(Debug)]
pub struct MigrationOutcome {
  /// Migrations applied by this run.
  pub applied: usize,
  /// State re-read from the history store after the run.
  pub state:   MigrationsState,
}

/// Ties a [`HistoryStore`] and a [`CommandRunner`] together.
///
/// Not safe to run concurrently against the same history: callers must make
/// sure only one process migrates a given store at a time.
pub struct Trek<H, R> {
  history:      H,
  runner:       R,
  interpolator: Interpolator,
}

impl<H, R> Trek<H, R>
where
  H: HistoryStore,
  R: CommandRunner,
{
  pub fn new(history: H, runner: R) -> Self {
    Self { history, runner, interpolator: Interpolator::default() }
  }

  /// Replace the default (`$date`) interpolator.
  pub fn with_interpolator(mut self, interpolator: Interpolator) -> Self {
    self.interpolator = interpolator;
    self
  }

  pub fn history(&self) -> &H { &self.history }

  pub fn runner(&self) -> &R { &self.runner }

  /// Reconcile `definitions` with the stored history without applying
  /// anything.
  pub async fn status(
    &self,
    definitions: &[Arc<MigrationDefinition>],
  ) -> Result<MigrationsState> {
    let history = self.history.find_all().await.map_err(Error::history)?;
    reconcile(definitions, history)
  }

  /// Apply every pending migration in ascending version order.
  ///
  /// Fails before any side effect on duplicate versions or when a previous
  /// attempt was left `Running`. A failing migration is recorded as
  /// `Failed`, stops the run, and is reported as
  /// [`Error::MigrationFailed`].
  pub async fn migrate(
    &self,
    definitions: &[Arc<MigrationDefinition>],
  ) -> Result<MigrationOutcome> {
    let state = self.status(definitions).await?;

    if let Some(stale) = state.running().first() {
      return Err(Error::StaleRunning(stale.version.clone()));
    }

    let pending = state.pending();
    if !pending.has_pending() {
      debug!("no migrations to apply");
      return Ok(MigrationOutcome { applied: 0, state });
    }

    debug!(
      current = %state.current_version(),
      "applying [ {} ] -> [ {} ]",
      pending.next_version(),
      pending.last_version(),
    );

    let records = pending.to_records();
    let applied = Executor::new(&self.history, &self.runner, &self.interpolator)
      .execute(records)
      .await?;

    let state = self.status(definitions).await?;
    Ok(MigrationOutcome { applied, state })
  }
}
