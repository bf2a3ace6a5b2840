//! Core types and engine for Trek, a versioned migration runner.
//!
//! Declared [`MigrationDefinition`](definition::MigrationDefinition)s are
//! reconciled against the persisted history in a
//! [`HistoryStore`](store::HistoryStore), and whatever is still pending is run
//! in ascending version order through a
//! [`CommandRunner`](store::CommandRunner), recording the outcome of every
//! attempt.
//!
//! This crate is free of database dependencies; backends implement the
//! traits in [`store`].

pub mod definition;
pub mod document;
pub mod error;
pub mod executor;
pub mod interpolate;
pub mod loader;
pub mod memory;
pub mod reconcile;
pub mod record;
pub mod state;
pub mod store;
pub mod trek;
pub mod version;

pub use error::{BoxError, Error, Result};
pub use store::DEFAULT_HISTORY_TABLE;
pub use trek::{MigrationOutcome, Trek};

#[cfg(test)]
mod tests;
