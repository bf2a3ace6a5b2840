//! SQLite backend for Trek.
//!
//! [`SqliteHistoryStore`] keeps the migration history in a table of its own;
//! [`SqliteCommandRunner`] runs command documents against the database being
//! migrated. Both wrap [`tokio_rusqlite`] so all database access runs on a
//! dedicated thread without blocking the async runtime.

mod encode;
mod runner;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use runner::SqliteCommandRunner;
pub use store::SqliteHistoryStore;
