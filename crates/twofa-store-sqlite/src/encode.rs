//! Encoding and decoding helpers between record types and the plain values
//! stored in SQLite columns.
//!
//! Identities are stored in their 32-character hex form, addresses in their
//! textual form, and the lock flag as an integer bit.

use std::{net::IpAddr, sync::Weak};

use twofa_core::{
  buffer::StagedRow,
  identity::{decode_identity, encode_identity},
  record::{AuthRecord, DirtyObserver, RecordState},
};

use crate::{Error, Result};

// ─── IpAddr ──────────────────────────────────────────────────────────────────

pub fn encode_address(address: Option<IpAddr>) -> Option<String> { address.map(|a| a.to_string()) }

pub fn decode_address(s: &str) -> Result<IpAddr> {
  s.parse().map_err(|source| Error::Address {
    value: s.to_owned(),
    source,
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Values read directly from a `two_factor` row.
pub struct RawRecord {
  pub identity: String,
  pub address:  Option<String>,
  pub secret:   Option<String>,
  pub locked:   bool,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      identity: row.get(0)?,
      address:  row.get(1)?,
      secret:   row.get(2)?,
      locked:   row.get(3)?,
    })
  }

  pub fn into_record(self, observer: Weak<dyn DirtyObserver>) -> Result<AuthRecord> {
    let identity = decode_identity(&self.identity)?;
    let last_address = self
      .address
      .as_deref()
      .filter(|s| !s.is_empty())
      .map(decode_address)
      .transpose()?;

    let state = RecordState {
      last_address,
      secret: self.secret,
      locked: self.locked,
    };

    Ok(AuthRecord::new(identity, state, observer))
  }
}

/// Parameter values for one upsert.
pub struct EncodedRow {
  pub identity: String,
  pub address:  Option<String>,
  pub secret:   Option<String>,
  pub locked:   bool,
}

impl From<StagedRow> for EncodedRow {
  fn from(row: StagedRow) -> Self {
    Self {
      identity: encode_identity(row.identity),
      address:  encode_address(row.state.last_address),
      secret:   row.state.secret,
      locked:   row.state.locked,
    }
  }
}
