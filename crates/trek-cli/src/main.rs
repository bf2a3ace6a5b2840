//! `trek` — apply or report on versioned migrations for a SQLite database.
//!
//! # Usage
//!
//! ```
//! trek --database app.db --migrations migrations.yml migrate
//! trek --config ~/.config/trek/trek.toml status
//! ```
//!
//! Settings come from the optional TOML config file, then `TREK_*`
//! environment variables, then command-line flags.

mod report;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Instant,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{error, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;
use trek_core::{
  DEFAULT_HISTORY_TABLE, Error as TrekError, Trek,
  definition::MigrationDefinition,
  loader::{self, LoaderConfig},
};
use trek_store_sqlite::{SqliteCommandRunner, SqliteHistoryStore};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "trek", version, about = "Versioned migrations for SQLite")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "trek.toml")]
  config: PathBuf,

  /// SQLite database to migrate.
  #[arg(short, long, value_name = "PATH")]
  database: Option<PathBuf>,

  /// Migrations file (YAML or JSON).
  #[arg(short, long, value_name = "FILE")]
  migrations: Option<String>,

  /// Table holding the migration history.
  #[arg(long, value_name = "NAME")]
  history_table: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
  /// Apply every pending migration.
  Migrate,
  /// Report the state of every migration without applying anything.
  Status,
}

impl Command {
  fn action(self) -> &'static str {
    match self {
      Self::Migrate => "migrate",
      Self::Status => "status",
    }
  }
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Settings read from `trek.toml` and `TREK_*` variables.
#[derive(Deserialize, Debug)]
struct CliConfig {
  #[serde(default = "default_database")]
  database:      PathBuf,
  #[serde(default = "default_migrations")]
  migrations:    String,
  #[serde(default = "default_history_table")]
  history_table: String,
  /// Extra directories searched for relative migrations files.
  #[serde(default)]
  search_paths:  Vec<PathBuf>,
}

fn default_database() -> PathBuf { PathBuf::from("trek.db") }

fn default_migrations() -> String { "migrations.yml".to_owned() }

fn default_history_table() -> String { DEFAULT_HISTORY_TABLE.to_owned() }

fn load_config(cli: &Cli) -> anyhow::Result<CliConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(expand_tilde(&cli.config)).required(false))
    .add_source(
      config::Environment::with_prefix("TREK")
        .try_parsing(true)
        .list_separator(":")
        .with_list_parse_key("search_paths"),
    )
    .build()
    .context("failed to read config file")?;

  let mut cfg: CliConfig = settings
    .try_deserialize()
    .context("failed to deserialise CliConfig")?;

  // Flags override everything else.
  if let Some(database) = &cli.database {
    cfg.database = database.clone();
  }
  if let Some(migrations) = &cli.migrations {
    cfg.migrations = migrations.clone();
  }
  if let Some(table) = &cli.history_table {
    cfg.history_table = table.clone();
  }

  cfg.database = expand_tilde(&cfg.database);
  cfg.search_paths = cfg.search_paths.iter().map(|p| expand_tilde(p)).collect();
  Ok(cfg)
}

/// A migrations file may name its own history table, but only when nothing
/// other than the default was configured.
fn history_table(configured: &str, from_file: Option<&str>) -> String {
  match from_file {
    Some(name) if configured.eq_ignore_ascii_case(DEFAULT_HISTORY_TABLE) => name.to_owned(),
    _ => configured.to_owned(),
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = load_config(&cli)?;

  report::header();

  let file = loader::load(&cfg.migrations, &LoaderConfig {
    search_paths: cfg.search_paths.clone(),
  })
  .with_context(|| format!("failed to load migrations from {:?}", cfg.migrations))?;

  let table = history_table(&cfg.history_table, file.history_table.as_deref());

  let history = SqliteHistoryStore::open(&cfg.database, &table)
    .await
    .with_context(|| format!("failed to open database at {:?}", cfg.database))?;
  let runner = SqliteCommandRunner::from_connection(history.connection());
  let trek = Trek::new(history, runner);

  let database = cfg.database.display().to_string();
  match cli.command {
    Command::Migrate => migrate(&trek, &file.definitions, &database, &table).await,
    Command::Status => status(&trek, &file.definitions, &database, &table).await,
  }
}

type SqliteTrek = Trek<SqliteHistoryStore, SqliteCommandRunner>;

async fn migrate(
  trek: &SqliteTrek,
  definitions: &[Arc<MigrationDefinition>],
  database: &str,
  table: &str,
) -> anyhow::Result<()> {
  let state = trek
    .status(definitions)
    .await
    .context("failed to read migration history")?;

  // A stale `Running` record is not pending, but must still reach the
  // engine so it is reported as an error.
  let stale = !state.running().is_empty();
  let pending = state.pending();
  if !stale && (definitions.is_empty() || !pending.has_pending()) {
    report::nothing_to_apply();
    return Ok(());
  }

  report::context(database, table, Command::Migrate.action(), &state.current_version());
  if pending.has_pending() {
    report::applying(&pending);
  }

  let start = Instant::now();
  let result = trek.migrate(definitions).await;

  let applied = match &result {
    Ok(outcome) => outcome.applied,
    Err(TrekError::MigrationFailed { applied, .. }) => *applied,
    Err(_) => 0,
  };
  if let Err(e) = &result {
    error!(error = %e, "Error applying migration(s)");
  }
  report::summary(applied, start.elapsed());

  result.context("migration failed")?;
  Ok(())
}

async fn status(
  trek: &SqliteTrek,
  definitions: &[Arc<MigrationDefinition>],
  database: &str,
  table: &str,
) -> anyhow::Result<()> {
  let state = match trek.status(definitions).await {
    Ok(state) => state,
    Err(e) => {
      error!(error = %e, "Error in commands and cannot provide status");
      return Err(e).context("failed to read migration status");
    }
  };

  report::context(database, table, Command::Status.action(), &state.current_version());
  report::migrations(&state);
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
