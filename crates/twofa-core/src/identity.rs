//! Storage form of a player identity.
//!
//! Identities are stored as 32 lowercase hexadecimal characters: the
//! hyphenated UUID form with its separators stripped.

use uuid::Uuid;

use crate::{Error, Result};

/// Length of the stored identity key.
pub const IDENTITY_HEX_LEN: usize = 32;

pub fn encode_identity(id: Uuid) -> String { id.simple().to_string() }

/// Parse the stored hex form back into a [`Uuid`].
///
/// Only the exact 32-character form produced by [`encode_identity`] is
/// accepted (either case); hyphenated or braced input is rejected.
pub fn decode_identity(s: &str) -> Result<Uuid> {
  if s.len() != IDENTITY_HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
    return Err(Error::MalformedIdentity(s.to_owned()));
  }
  Uuid::try_parse(s).map_err(|_| Error::MalformedIdentity(s.to_owned()))
}
