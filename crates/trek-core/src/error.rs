//! Error types for `trek-core`.

use thiserror::Error;

use crate::{interpolate::InterpolationError, version::Version};

/// Boxed error used where a collaborator's own error type crosses into the
/// engine (history stores, command runners, generated payloads).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("migration [ {0} ] has duplicate commands")]
  DuplicateVersion(Version),

  #[error("invalid migration {field} {value:?}: {reason}")]
  InvalidIdentifier {
    field:  &'static str,
    value:  String,
    reason: String,
  },

  #[error(transparent)]
  Interpolation(#[from] InterpolationError),

  /// The single wrapping error for a failed step. `applied` counts the
  /// migrations that succeeded earlier in the same run.
  #[error("migration [ {version} ] failed: {source}")]
  MigrationFailed {
    version: Version,
    applied: usize,
    #[source]
    source:  BoxError,
  },

  #[error("no command attached to migration [ {0} ]")]
  MissingCommand(Version),

  /// A previous run persisted `Running` and never reached a terminal
  /// status; the command may or may not have completed.
  #[error("migration [ {0} ] is still marked as running from a previous attempt")]
  StaleRunning(Version),

  #[error("history store error: {0}")]
  History(#[source] BoxError),

  #[error("could not find migrations file [ {0} ] in any search path")]
  MigrationsFileNotFound(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("migrations file error: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub(crate) fn invalid(
    field: &'static str,
    value: impl Into<String>,
    reason: impl Into<String>,
  ) -> Self {
    Self::InvalidIdentifier { field, value: value.into(), reason: reason.into() }
  }

  pub(crate) fn history<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::History(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
