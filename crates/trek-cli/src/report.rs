//! Human-readable progress report, written through `tracing` at `INFO`.

use std::time::Duration;

use tracing::info;
use trek_core::state::{MigrationsState, Pending};

pub fn header() { info!("DATABASE MIGRATIONS"); }

pub fn nothing_to_apply() { info!("   No migrations to apply."); }

pub fn context(database: &str, table: &str, action: &str, current_version: &str) {
  info!("       Database : [ {database} ]");
  info!(" Schema Version : [ {table} ]");
  info!("         Action : [ {action} ]");
  info!("Current Version : [ {current_version} ]");
}

/// Printed before the engine logs each migration as it is applied.
pub fn applying(pending: &Pending<'_>) {
  info!(
    "       Applying : [ {} ] -> [ {} ]",
    pending.next_version(),
    pending.last_version()
  );
  info!("     Migrations :");
}

pub fn migrations(state: &MigrationsState) {
  info!("     Migrations :");
  for migration in state.migrations() {
    info!("       {} : {}", migration.version, migration.description);
    info!("          Tags: {}", migration.tags());
  }
}

pub fn summary(applied: usize, elapsed: Duration) {
  info!(
    ">>> [ {applied} ] migrations applied in [ {} seconds ] <<<",
    elapsed.as_secs()
  );
}
