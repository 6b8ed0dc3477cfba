//! SQLite backend for two-factor records.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on the connections'
//! dedicated threads without blocking the caller, and buffers record
//! mutations until a call to
//! [`UserDataSource::save`](twofa_core::source::UserDataSource::save)
//! flushes them.

mod encode;
mod schema;
mod source;

pub mod autosave;
pub mod config;
pub mod error;
pub mod pool;

pub use autosave::{AutosaveHandle, spawn_autosave};
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use schema::{INDEX, SCHEMA_VERSION, TABLE};
pub use source::SqliteUserDataSource;
