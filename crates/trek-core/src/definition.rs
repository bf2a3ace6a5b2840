//! Declared migrations.
//!
//! A [`MigrationDefinition`] is what a migrations file or application code
//! says *should* be applied. It is validated once, when it is built, and is
//! immutable afterwards.

use std::{fmt, sync::Arc};

use crate::{
  BoxError, Error, Result,
  document::Document,
  version::Version,
};

/// Author recorded when a definition does not name one.
pub const DEFAULT_AUTHOR: &str = "trek";

/// Produces a command document at execution time.
pub type GenerateFn = Arc<dyn Fn() -> Result<Document, BoxError> + Send + Sync>;

/// What a migration runs. Both variants end up as a [`Document`] handed to
/// the same [`CommandRunner`](crate::store::CommandRunner).
#[derive(Clone)]
pub enum Payload {
  /// A literal command, usually read from a migrations file.
  Document(Document),
  /// A command computed by application code when the migration runs.
  Generated(GenerateFn),
}

impl Payload {
  /// Produce the raw (not yet interpolated) command document.
  pub fn materialize(&self) -> Result<Document, BoxError> {
    match self {
      Self::Document(doc) => Ok(doc.clone()),
      Self::Generated(f) => f(),
    }
  }
}

impl fmt::Debug for Payload {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Document(doc) => f.debug_tuple("Document").field(doc).finish(),
      Self::Generated(_) => f.write_str("Generated(..)"),
    }
  }
}

#[derive(Debug, Clone)]
pub struct MigrationDefinition {
  version:     Version,
  description: String,
  author:      String,
  payload:     Payload,
}

impl MigrationDefinition {
  /// Start building a definition. Nothing is validated until
  /// [`MigrationDefinitionBuilder::build`].
  pub fn builder(
    version: impl Into<String>,
    description: impl Into<String>,
  ) -> MigrationDefinitionBuilder {
    MigrationDefinitionBuilder {
      version:     version.into(),
      description: description.into(),
      author:      None,
      payload:     None,
    }
  }

  pub fn version(&self) -> &Version { &self.version }

  pub fn description(&self) -> &str { &self.description }

  pub fn author(&self) -> &str { &self.author }

  pub fn payload(&self) -> &Payload { &self.payload }
}

#[derive(Debug)]
pub struct MigrationDefinitionBuilder {
  version:     String,
  description: String,
  author:      Option<String>,
  payload:     Option<Payload>,
}

impl MigrationDefinitionBuilder {
  pub fn author(mut self, author: impl Into<String>) -> Self {
    self.author = Some(author.into());
    self
  }

  /// Run a literal command document.
  pub fn command(mut self, command: Document) -> Self {
    self.payload = Some(Payload::Document(command));
    self
  }

  /// Compute the command document when the migration runs.
  pub fn generated<F>(mut self, f: F) -> Self
  where
    F: Fn() -> Result<Document, BoxError> + Send + Sync + 'static,
  {
    self.payload = Some(Payload::Generated(Arc::new(f)));
    self
  }

  pub fn build(self) -> Result<MigrationDefinition> {
    let version = Version::parse(self.version.trim())
      .map_err(|e| Error::invalid("version", &self.version, e.reason))?;

    let description = self.description.trim();
    if description.is_empty() {
      return Err(Error::invalid(
        "description",
        &self.description,
        "must not be empty",
      ));
    }

    let Some(payload) = self.payload else {
      return Err(Error::invalid(
        "command",
        version.as_str(),
        "a migration requires a command",
      ));
    };

    let author = self
      .author
      .map(|a| a.trim().to_owned())
      .filter(|a| !a.is_empty())
      .unwrap_or_else(|| DEFAULT_AUTHOR.to_owned());

    Ok(MigrationDefinition {
      version,
      description: description.to_owned(),
      author,
      payload,
    })
  }
}
