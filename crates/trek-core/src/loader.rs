//! Loading declared migrations from a YAML or JSON file.
//!
//! ```yaml
//! schemaVersionCollection: _schema_version   # optional
//! migrations:
//!   - version: 1.0.0
//!     description: create people table
//!     author: Homer Simpson                   # optional
//!     command:
//!       script: CREATE TABLE people (name TEXT, born TEXT);
//! ```
//!
//! JSON is accepted as well, being a subset of YAML.

use std::{
  fs,
  path::{Path, PathBuf},
  sync::Arc,
};

use serde::Deserialize;
use tracing::debug;

use crate::{
  Error, Result,
  definition::MigrationDefinition,
  document::Document,
};

/// Where to look for migrations files given by relative path.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
  /// Directories tried in order after the path itself.
  pub search_paths: Vec<PathBuf>,
}

/// The parsed contents of a migrations file.
#[derive(Debug, Clone, Default)]
pub struct MigrationsFile {
  /// History table/collection name requested by the file, if any.
  pub history_table: Option<String>,
  pub definitions:   Vec<Arc<MigrationDefinition>>,
}

impl MigrationsFile {
  pub fn has_migrations(&self) -> bool { !self.definitions.is_empty() }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMigrationsFile {
  #[serde(default)]
  schema_version_collection: Option<String>,
  #[serde(default)]
  migrations:                Option<Vec<RawMigration>>,
}

#[derive(Deserialize)]
struct RawMigration {
  #[serde(default, deserialize_with = "string_like")]
  version:     Option<String>,
  #[serde(default)]
  description: Option<String>,
  #[serde(default)]
  author:      Option<String>,
  #[serde(default)]
  command:     Option<Document>,
}

/// Accept `version: 1.0.0` as well as `version: "1.0.0"`; YAML happily
/// turns `version: 1` into a number.
fn string_like<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  Ok(Option::<serde_yaml::Value>::deserialize(deserializer)?.and_then(|v| match v {
    serde_yaml::Value::String(s) => Some(s),
    serde_yaml::Value::Number(n) => Some(n.to_string()),
    _ => None,
  }))
}

/// Find `source` on disk: first as given, then under each configured search
/// path.
pub fn resolve(source: &str, config: &LoaderConfig) -> Result<PathBuf> {
  let direct = Path::new(source);
  if direct.is_file() {
    return Ok(direct.to_path_buf());
  }
  if direct.is_relative() {
    for dir in &config.search_paths {
      let candidate = dir.join(direct);
      if candidate.is_file() {
        return Ok(candidate);
      }
    }
  }
  Err(Error::MigrationsFileNotFound(source.to_owned()))
}

/// Resolve and parse a migrations file.
pub fn load(source: &str, config: &LoaderConfig) -> Result<MigrationsFile> {
  let path = resolve(source, config)?;
  debug!(path = %path.display(), "loading migrations file");
  let text = fs::read_to_string(&path)?;
  parse(&text)
}

/// Parse migrations file contents. Every entry is validated through
/// [`MigrationDefinition::builder`].
pub fn parse(text: &str) -> Result<MigrationsFile> {
  if text.trim().is_empty() {
    return Ok(MigrationsFile::default());
  }

  let raw: RawMigrationsFile = serde_yaml::from_str(text)?;

  let definitions = raw
    .migrations
    .unwrap_or_default()
    .into_iter()
    .map(|m| {
      let mut builder = MigrationDefinition::builder(
        m.version.unwrap_or_default(),
        m.description.unwrap_or_default(),
      );
      if let Some(author) = m.author {
        builder = builder.author(author);
      }
      if let Some(command) = m.command {
        builder = builder.command(command);
      }
      builder.build().map(Arc::new)
    })
    .collect::<Result<Vec<_>>>()?;

  Ok(MigrationsFile {
    history_table: raw.schema_version_collection.filter(|s| !s.trim().is_empty()),
    definitions,
  })
}
