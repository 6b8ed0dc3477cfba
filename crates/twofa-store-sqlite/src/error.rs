//! Error type for `twofa-store-sqlite`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] twofa_core::Error),

  /// The store could not be opened or configured.
  #[error("connection error: {0}")]
  Connection(#[source] tokio_rusqlite::Error),

  #[error("timed out after {0:?} waiting for a pooled connection")]
  PoolTimeout(Duration),

  #[error("connection pool is closed")]
  PoolClosed,

  /// Schema bootstrap failed; the data source is unusable.
  #[error("schema error: {0}")]
  Schema(#[source] tokio_rusqlite::Error),

  /// A lookup or flush statement failed. Statements already applied in the
  /// same flush remain applied.
  #[error("query error: {0}")]
  Query(#[from] tokio_rusqlite::Error),

  #[error("stored address {value:?} is not an IP address: {source}")]
  Address {
    value:  String,
    source: std::net::AddrParseError,
  },
}

impl Error {
  pub fn is_threading_violation(&self) -> bool {
    matches!(self, Self::Core(twofa_core::Error::ThreadingViolation { .. }))
  }

  /// Whether the failure came from reaching the store rather than from a
  /// statement, so retrying later may succeed.
  pub fn is_connection(&self) -> bool {
    matches!(self, Self::Connection(_) | Self::PoolTimeout(_) | Self::PoolClosed)
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
