//! Error types for `twofa-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A blocking operation was invoked from the primary scheduling context.
  #[error("blocking operation `{operation}` invoked from the primary scheduling context")]
  ThreadingViolation { operation: &'static str },

  #[error("malformed identity {0:?}: expected 32 hexadecimal characters")]
  MalformedIdentity(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
